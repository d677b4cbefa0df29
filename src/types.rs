//! Core data model shared across the detection/embedding pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identity-encoder embedding width.
pub const IDENTITY_DIM: usize = 512;
/// Universal (style-robust) encoder embedding width.
pub const UNIVERSAL_DIM: usize = 1280;

/// Tolerance for the unit-norm invariant on produced embeddings.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Face bounding box in integer source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Heuristic head pose in degrees, derived from 5-point landmarks.
///
/// This is a rough trigonometric approximation with no camera intrinsics;
/// suitable as a quality-scoring signal, not a head-pose measurement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pose {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Which detector backend produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Named-tensor family: score/bbox/kps outputs per stride.
    Scrfd,
    /// Single-tensor grid family: one `[1, N, 6]` / `[1, 6, N]` output.
    YoloFace,
}

/// Art style of a source image, as reported by the style classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleKind {
    Realistic,
    Anime,
    ThreeD,
    Mixed,
}

/// Fixed-length embedding vector.
///
/// Invariant: after every production step the L2 norm is ≈ 1.0
/// (within [`NORM_TOLERANCE`]), except the degenerate all-zero vector,
/// which passes through unchanged and must be treated as invalid by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn l2_norm(&self) -> f32 {
        self.values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Divide every component by the L2 norm. A zero vector is left unchanged.
    pub fn l2_normalize(&mut self) {
        let norm = self.l2_norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }
}

/// One detected face with everything the pipeline derived for it.
///
/// Immutable once produced; owned by the per-image result until handed to
/// the external persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Tight detection box in source-image space, clamped to image bounds.
    pub bbox: FaceBox,
    /// Padded square region the stored crop was cut from, in source-image
    /// space. Larger than `bbox` and may overlap neighbouring faces' crops.
    pub crop_bbox: FaceBox,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// Five-point landmarks [left_eye, right_eye, nose, left_mouth,
    /// right_mouth] in source-image space, when the backend provides them.
    pub landmarks: Option<[(f32, f32); 5]>,
    pub pose: Pose,
    pub backend: BackendKind,
    pub style: StyleKind,
    /// PNG-encoded padded face crop.
    pub crop_png: Vec<u8>,
    pub crop_width: u32,
    pub crop_height: u32,
    /// 512-D identity embedding; `None` when embedding failed for this face.
    pub identity_embedding: Option<Embedding>,
    /// 1280-D style-robust embedding; `None` when embedding failed.
    pub universal_embedding: Option<Embedding>,
    pub quality: f32,
    pub sharpness: f32,
}

/// Per-image processing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFaceResults {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub style: StyleKind,
    /// Detection order is preserved: NMS selection order.
    pub faces: Vec<FaceDetection>,
    pub duration: Duration,
    /// Set when a per-image failure was contained (decode error, inference
    /// error). Faces detected before the failure are still present.
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit() {
        let mut e = Embedding::new(vec![3.0, 4.0]);
        e.l2_normalize();
        assert!((e.values[0] - 0.6).abs() < 1e-6);
        assert!((e.values[1] - 0.8).abs() < 1e-6);
        assert!((e.l2_norm() - 1.0).abs() < NORM_TOLERANCE);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let mut e = Embedding::new(vec![0.0, 0.0, 0.0]);
        e.l2_normalize();
        assert_eq!(e.values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_results_serde_roundtrip() {
        let results = ImageFaceResults {
            path: PathBuf::from("library/img_0001.png"),
            width: 1024,
            height: 1024,
            style: StyleKind::Anime,
            faces: vec![FaceDetection {
                bbox: FaceBox { x: 10, y: 20, width: 100, height: 120 },
                crop_bbox: FaceBox { x: 0, y: 0, width: 150, height: 150 },
                confidence: 0.93,
                landmarks: Some([(30.0, 50.0), (80.0, 50.0), (55.0, 80.0), (38.0, 105.0), (72.0, 105.0)]),
                pose: Pose { yaw: 4.0, pitch: -2.0, roll: 0.5 },
                backend: BackendKind::Scrfd,
                style: StyleKind::Anime,
                crop_png: vec![0x89, 0x50, 0x4e, 0x47],
                crop_width: 256,
                crop_height: 256,
                identity_embedding: Some(Embedding::new(vec![1.0, 0.0])),
                universal_embedding: None,
                quality: 0.9,
                sharpness: 0.4,
            }],
            duration: Duration::from_millis(240),
            error: None,
        };

        let json = serde_json::to_string(&results).unwrap();
        let back: ImageFaceResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back.faces.len(), 1);
        assert_eq!(back.style, StyleKind::Anime);
        assert_eq!(back.faces[0].bbox, results.faces[0].bbox);
        assert!(back.faces[0].universal_embedding.is_none());
    }

    #[test]
    fn test_style_tag_serialization() {
        assert_eq!(serde_json::to_string(&StyleKind::ThreeD).unwrap(), "\"three_d\"");
        assert_eq!(serde_json::to_string(&BackendKind::YoloFace).unwrap(), "\"yolo_face\"");
    }
}
