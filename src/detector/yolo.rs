//! YOLO-face-family detector: single grid-output tensor.
//!
//! The model emits one tensor carrying six attributes per candidate:
//! (cx, cy, w, h, confidence, class). Exporters disagree on orientation —
//! `[1, N, 6]` (candidate-major) vs `[1, 6, N]` (attribute-major) — so the
//! layout is inferred by comparing dimension sizes. This family carries no
//! landmark channels.

use super::{DetectorBackend, DetectorConfig, DetectorError};
use crate::postprocess::{clamp_and_filter, nms, RawDetection};
use crate::preprocess::{letterbox_tensor, ChannelOrder, Letterbox, TensorLayout};
use crate::session::build_session;
use crate::types::BackendKind;
use image::RgbImage;
use ort::session::Session;
use ort::value::TensorRef;

const YOLO_ATTRS: i64 = 6;
const YOLO_INTRA_THREADS: usize = 2;

/// Inferred orientation of the single output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    /// `[1, N, 6]` — attributes contiguous per candidate.
    CandidateMajor,
    /// `[1, 6, N]` — candidates contiguous per attribute.
    AttributeMajor,
}

pub struct YoloFaceDetector {
    session: Session,
    config: DetectorConfig,
    layout: TensorLayout,
}

impl YoloFaceDetector {
    pub fn load(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let session = build_session(&config.model_path, config.device, YOLO_INTRA_THREADS)?;
        Ok(Self {
            session,
            layout: TensorLayout {
                size: config.input_size,
                // YOLO exports expect [0, 1] RGB
                mean: [0.0; 3],
                std: [255.0; 3],
                order: ChannelOrder::Rgb,
            },
            config: config.clone(),
        })
    }
}

impl DetectorBackend for YoloFaceDetector {
    fn kind(&self) -> BackendKind {
        BackendKind::YoloFace
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        let (input, letterbox) = letterbox_tensor(image, &self.layout);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("grid output: {e}")))?;

        let candidates =
            decode_grid_output(shape, data, &letterbox, self.config.confidence_threshold)?;

        // Clamp to image bounds before suppression: boxes that overlap only
        // once pulled in-bounds must still suppress each other.
        let candidates =
            clamp_and_filter(candidates, image.width(), image.height(), self.config.min_face_size);
        let kept = nms(candidates, self.config.nms_threshold);
        tracing::debug!(faces = kept.len(), "YOLO-face detection complete");
        Ok(kept)
    }
}

/// Infer the tensor orientation from its shape. The attribute axis is the
/// one whose size is 6; a square `[1, 6, 6]` tensor defaults to
/// candidate-major.
fn infer_orientation(shape: &[i64]) -> Result<(Orientation, usize), DetectorError> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(DetectorError::BadOutputLayout(format!(
            "expected [1, N, 6] or [1, 6, N], got {shape:?}"
        )));
    }
    match (shape[1], shape[2]) {
        (n, YOLO_ATTRS) => Ok((Orientation::CandidateMajor, n as usize)),
        (YOLO_ATTRS, n) => Ok((Orientation::AttributeMajor, n as usize)),
        _ => Err(DetectorError::BadOutputLayout(format!(
            "neither dimension is {YOLO_ATTRS}: {shape:?}"
        ))),
    }
}

fn decode_grid_output(
    shape: &[i64],
    data: &[f32],
    letterbox: &Letterbox,
    threshold: f32,
) -> Result<Vec<RawDetection>, DetectorError> {
    let (orientation, count) = infer_orientation(shape)?;

    let attr = |i: usize, a: usize| -> f32 {
        match orientation {
            Orientation::CandidateMajor => data[i * YOLO_ATTRS as usize + a],
            Orientation::AttributeMajor => data[a * count + i],
        }
    };

    let mut detections = Vec::new();
    for i in 0..count {
        let confidence = attr(i, 4);
        if confidence <= threshold {
            continue;
        }

        let cx = attr(i, 0);
        let cy = attr(i, 1);
        let w = attr(i, 2);
        let h = attr(i, 3);
        // attribute 5 is the class logit; single face class, unused

        let (x1, y1) = letterbox.to_original(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_original(cx + w / 2.0, cy + h / 2.0);

        detections.push(RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
            landmarks: None,
        });
    }

    Ok(detections)
}
