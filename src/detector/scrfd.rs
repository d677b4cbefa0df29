//! SCRFD-family detector: named-tensor outputs.
//!
//! The model emits nine tensors (score/bbox/kps for strides 8, 16, 32, two
//! anchors per grid cell) and decodes anchor-free distance offsets. Output
//! ordering is discovered by tensor name at load time, with a positional
//! fallback for exports that use generic numeric names.

use super::{DetectorBackend, DetectorConfig, DetectorError};
use crate::postprocess::{clamp_and_filter, nms, RawDetection};
use crate::preprocess::{letterbox_tensor, ChannelOrder, Letterbox, TensorLayout};
use crate::session::build_session;
use crate::types::BackendKind;
use image::RgbImage;
use ort::session::Session;
use ort::value::TensorRef;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;
const SCRFD_INTRA_THREADS: usize = 2;

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

pub struct ScrfdDetector {
    session: Session,
    config: DetectorConfig,
    layout: TensorLayout,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    pub fn load(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let session = build_session(&config.model_path, config.device, SCRFD_INTRA_THREADS)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        if output_names.len() < 9 {
            return Err(DetectorError::BadOutputLayout(format!(
                "SCRFD model requires 9 outputs (3 strides x score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            layout: TensorLayout {
                size: config.input_size,
                mean: [SCRFD_MEAN; 3],
                std: [SCRFD_STD; 3],
                order: ChannelOrder::Bgr,
            },
            config: config.clone(),
            stride_indices,
        })
    }
}

impl DetectorBackend for ScrfdDetector {
    fn kind(&self) -> BackendKind {
        BackendKind::Scrfd
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        let (input, letterbox) = letterbox_tensor(image, &self.layout);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            candidates.extend(decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                self.config.input_size as usize,
                &letterbox,
                self.config.confidence_threshold,
            ));
        }

        // Clamp to image bounds before suppression: boxes that overlap only
        // once pulled in-bounds must still suppress each other.
        let candidates =
            clamp_and_filter(candidates, image.width(), image.height(), self.config.min_face_size);
        let kept = nms(candidates, self.config.nms_threshold);
        tracing::debug!(faces = kept.len(), "SCRFD detection complete");
        Ok(kept)
    }
}

/// Discover output ordering by tensor name ("score_8", "bbox_16", "kps_32",
/// ...), falling back to the standard positional ordering
/// ([0-2]=scores, [3-5]=bboxes, [6-8]=kps) for generically-named exports.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let mut named = [(0, 0, 0); 3];
    for (i, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride), find("kps", stride)) {
            (Some(s), Some(b), Some(k)) => named[i] = (s, b, k),
            _ => {
                tracing::info!(
                    ?names,
                    "SCRFD output names not recognized, using positional mapping"
                );
                return [(0, 3, 6), (1, 4, 7), (2, 5, 8)];
            }
        }
    }
    named
}

/// Decode one stride level: anchor-free distance offsets around grid centers,
/// mapped back through the letterbox into original-image space.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<RawDetection> {
    let grid = input_size / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        // bbox offsets are distances [left, top, right, bottom] in stride units
        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = letterbox.to_original(
            anchor_cx - bboxes[off] * stride as f32,
            anchor_cy - bboxes[off + 1] * stride as f32,
        );
        let (x2, y2) = letterbox.to_original(
            anchor_cx + bboxes[off + 2] * stride as f32,
            anchor_cy + bboxes[off + 3] * stride as f32,
        );

        let kps_off = idx * 10;
        let landmarks = if kps_off + 9 < kps.len() {
            let mut points = [(0.0f32, 0.0f32); 5];
            for (i, point) in points.iter_mut().enumerate() {
                *point = letterbox.to_original(
                    anchor_cx + kps[kps_off + i * 2] * stride as f32,
                    anchor_cy + kps[kps_off + i * 2 + 1] * stride as f32,
                );
            }
            Some(points)
        } else {
            None
        };

        detections.push(RawDetection { x1, y1, x2, y2, confidence: score, landmarks });
    }

    detections
}
