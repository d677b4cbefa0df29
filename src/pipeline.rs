//! Orchestration facade.
//!
//! [`FacePipeline`] owns the detector backend and both encoders as a unit:
//! constructed together, torn down together via [`FacePipeline::close`].
//! All operations are synchronous; batch processing is strictly sequential
//! with cooperative cancellation between images. No internal caching, no
//! retries — every call re-runs inference.

use crate::cluster::{cluster_embeddings, DEFAULT_CLUSTER_THRESHOLD};
use crate::crop::{aligned_crop, padded_crop, FaceCrop};
use crate::detector::{load_backend, DetectorBackend, DetectorConfig, DetectorError};
use crate::encoder::identity::IdentityEncoder;
use crate::encoder::universal::UniversalEncoder;
use crate::encoder::EncoderError;
use crate::pose::estimate_pose;
use crate::postprocess::RawDetection;
use crate::quality::{sharpness, QualityPolicy};
use crate::similarity::{cosine, SimilarityError};
use crate::style::StyleClassifier;
use crate::types::{Embedding, FaceBox, FaceDetection, ImageFaceResults, Pose, StyleKind};
use image::RgbImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("encoder: {0}")]
    Encoder(#[from] EncoderError),
}

/// Crop handling options.
#[derive(Debug, Clone)]
pub struct CropConfig {
    /// Box expansion as a fraction of the larger box dimension.
    pub pad_ratio: f32,
    /// Canonical storage size for face crops; `None` keeps native size.
    pub storage_size: Option<u32>,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            pad_ratio: 0.25,
            storage_size: Some(256),
        }
    }
}

/// Full pipeline configuration, supplied at construction. No runtime
/// reconfiguration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    pub identity_model_path: PathBuf,
    pub universal_model_path: PathBuf,
    pub crop: CropConfig,
    pub cluster_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            identity_model_path: PathBuf::new(),
            universal_model_path: PathBuf::new(),
            crop: CropConfig::default(),
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

/// A ranked similarity match from [`FacePipeline::find_similar_faces`].
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    /// Index into the candidate slice.
    pub index: usize,
    pub similarity: f32,
}

/// Face detection / embedding / clustering engine.
///
/// Owns one exclusive inference session per component; methods take
/// `&mut self` accordingly. Parallelism across images belongs to the
/// caller (independent pipeline instances).
pub struct FacePipeline {
    detector: Box<dyn DetectorBackend>,
    identity: IdentityEncoder,
    universal: UniversalEncoder,
    style: Option<Box<dyn StyleClassifier>>,
    config: PipelineConfig,
    quality_policy: QualityPolicy,
}

impl FacePipeline {
    /// Construct the pipeline, loading all model sessions. This is the only
    /// hard-failure point: missing weights or a total device-bind failure
    /// surface here; everything downstream is contained per image/face.
    pub fn new(
        config: PipelineConfig,
        style: Option<Box<dyn StyleClassifier>>,
    ) -> Result<Self, PipelineError> {
        let detector = load_backend(&config.detector)?;
        let identity = IdentityEncoder::load(&config.identity_model_path, config.detector.device)?;
        let universal =
            UniversalEncoder::load(&config.universal_model_path, config.detector.device)?;

        tracing::info!(
            backend = ?config.detector.kind,
            styled = style.is_some(),
            "face pipeline ready"
        );

        Ok(Self {
            quality_policy: QualityPolicy::for_backend(config.detector.kind),
            detector,
            identity,
            universal,
            style,
            config,
        })
    }

    /// Process one library image: detect, crop, embed, and score every face.
    ///
    /// Never panics and never fails outright: decode or inference errors for
    /// the image are logged and recorded in the result's `error` field;
    /// per-face failures leave that face with null embeddings.
    pub fn process_image(&mut self, path: &Path) -> ImageFaceResults {
        let start = Instant::now();

        let image = match image::open(path) {
            Ok(decoded) => decoded.to_rgb8(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "image decode failed");
                return ImageFaceResults {
                    path: path.to_path_buf(),
                    width: 0,
                    height: 0,
                    style: StyleKind::Mixed,
                    faces: Vec::new(),
                    duration: start.elapsed(),
                    error: Some(format!("decode: {err}")),
                };
            }
        };

        let style = match &mut self.style {
            Some(classifier) => classifier.classify(&image),
            None => StyleKind::Mixed,
        };

        let mut error = None;
        let detections = match self.detector.detect(&image) {
            Ok(dets) => dets,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "detection failed; empty result");
                error = Some(format!("detect: {err}"));
                Vec::new()
            }
        };

        let mut faces = Vec::new();
        for det in &detections {
            if let Some(face) = self.process_face(&image, det, style, path) {
                faces.push(face);
            }
        }

        let duration = start.elapsed();
        tracing::info!(
            path = %path.display(),
            faces = faces.len(),
            ?style,
            ms = duration.as_millis() as u64,
            "image processed"
        );

        ImageFaceResults {
            path: path.to_path_buf(),
            width: image.width(),
            height: image.height(),
            style,
            faces,
            duration,
            error,
        }
    }

    /// Crop, embed, and score a single detection. `None` only when the
    /// usable crop is below the minimum face size; embedding failures keep
    /// the face with null embeddings.
    fn process_face(
        &mut self,
        image: &RgbImage,
        det: &RawDetection,
        style: StyleKind,
        path: &Path,
    ) -> Option<FaceDetection> {
        let crop = match padded_crop(
            image,
            det,
            self.config.crop.pad_ratio,
            self.config.crop.storage_size,
            self.config.detector.min_face_size,
        ) {
            Some(crop) => crop,
            None => {
                tracing::debug!(path = %path.display(), "face dropped: crop below minimum size");
                return None;
            }
        };

        let pose = det
            .landmarks
            .as_ref()
            .map(|lm| estimate_pose(lm, det.width(), det.height()))
            .unwrap_or_default();

        let identity_embedding = self.embed_identity(image, det, &crop, path);
        let universal_embedding = match self.universal.embed(&crop.image) {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "universal embedding failed");
                None
            }
        };

        let bbox = detection_box(det);
        let pose_for_quality: Option<&Pose> = det.landmarks.as_ref().map(|_| &pose);
        let quality = self.quality_policy.quality(
            det.confidence,
            bbox.width,
            bbox.height,
            pose_for_quality,
        );
        let sharpness = sharpness(&crop.image);

        let mut crop_png = Vec::new();
        if let Err(err) = crop
            .image
            .write_to(&mut Cursor::new(&mut crop_png), image::ImageFormat::Png)
        {
            tracing::warn!(path = %path.display(), error = %err, "crop encode failed");
            crop_png.clear();
        }

        Some(FaceDetection {
            bbox,
            crop_bbox: crop.bbox,
            confidence: det.confidence,
            landmarks: det.landmarks,
            pose,
            backend: self.detector.kind(),
            style,
            crop_width: crop.image.width(),
            crop_height: crop.image.height(),
            crop_png,
            identity_embedding,
            universal_embedding,
            quality,
            sharpness,
        })
    }

    /// Identity embedding with landmark alignment when available.
    fn embed_identity(
        &mut self,
        image: &RgbImage,
        det: &RawDetection,
        crop: &FaceCrop,
        path: &Path,
    ) -> Option<Embedding> {
        let input = match &det.landmarks {
            Some(landmarks) => aligned_crop(image, landmarks),
            None => crop.image.clone(),
        };
        match self.identity.embed(&input) {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "identity embedding failed");
                None
            }
        }
    }

    /// Process images sequentially, reporting `(current, total, path)` after
    /// each one. Cancellation is cooperative: checked before each image, and
    /// the partial results already produced are returned.
    pub fn process_batch(
        &mut self,
        paths: &[PathBuf],
        mut progress: impl FnMut(usize, usize, &Path),
        cancel: &AtomicBool,
    ) -> Vec<ImageFaceResults> {
        let total = paths.len();
        let mut results = Vec::with_capacity(total);

        for (i, path) in paths.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(processed = i, total, "batch cancelled");
                break;
            }
            results.push(self.process_image(path));
            progress(i + 1, total, path);
        }

        results
    }

    /// Rank candidates by similarity to the query, keeping those at or above
    /// `threshold`, truncated to `max_results`.
    pub fn find_similar_faces(
        &self,
        query: &Embedding,
        candidates: &[Embedding],
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<FaceMatch>, SimilarityError> {
        rank_matches(query, candidates, threshold, max_results)
    }

    /// Group embeddings into same-identity clusters of candidate indices.
    /// `threshold` overrides the construction-time cluster threshold for
    /// this call; `None` uses the configured value.
    pub fn cluster_faces(
        &self,
        embeddings: &[Embedding],
        threshold: Option<f32>,
    ) -> Result<Vec<Vec<usize>>, SimilarityError> {
        let threshold = threshold.unwrap_or(self.config.cluster_threshold);
        cluster_embeddings(embeddings, threshold)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Explicit teardown. Consumes the pipeline so no operation can run
    /// after the sessions are released.
    pub fn close(self) {
        tracing::info!("face pipeline closed; inference sessions released");
        drop(self);
    }
}

/// Integerize a detection into a pixel-space box. Detections arrive already
/// clamped to image bounds, so corners are non-negative.
fn detection_box(det: &RawDetection) -> FaceBox {
    let x = det.x1.round().max(0.0) as u32;
    let y = det.y1.round().max(0.0) as u32;
    FaceBox {
        x,
        y,
        width: (det.x2.round().max(0.0) as u32).saturating_sub(x),
        height: (det.y2.round().max(0.0) as u32).saturating_sub(y),
    }
}

/// Similarity ranking shared by the facade and direct callers.
pub fn rank_matches(
    query: &Embedding,
    candidates: &[Embedding],
    threshold: f32,
    max_results: usize,
) -> Result<Vec<FaceMatch>, SimilarityError> {
    let mut matches = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let similarity = cosine(query, candidate)?;
        if similarity >= threshold {
            matches.push(FaceMatch { index, similarity });
        }
    }

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(max_results);
    Ok(matches)
}
