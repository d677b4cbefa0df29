//! Detector backends.
//!
//! Two structurally distinct output-parsing families share one contract:
//! the named-tensor family ([`scrfd`]) and the single-tensor grid family
//! ([`yolo`]). Both decode into [`RawDetection`]s in original-image space
//! and run through the shared postprocessing in [`crate::postprocess`].

use crate::postprocess::RawDetection;
use crate::session::{ComputeDevice, SessionError};
use crate::types::BackendKind;
use image::RgbImage;
use std::path::PathBuf;
use thiserror::Error;

pub mod scrfd;
pub mod yolo;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("session: {0}")]
    Session(#[from] SessionError),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("unexpected output tensor layout: {0}")]
    BadOutputLayout(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Per-backend detection configuration, supplied at construction.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub kind: BackendKind,
    pub model_path: PathBuf,
    pub device: ComputeDevice,
    /// Square model input size in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    /// Boxes smaller than this in either dimension are discarded.
    pub min_face_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Scrfd,
            model_path: PathBuf::new(),
            device: ComputeDevice::Cpu,
            input_size: 640,
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            min_face_size: 10,
        }
    }
}

/// Shared detector contract. `&mut self` because each backend exclusively
/// owns its inference session.
pub trait DetectorBackend {
    fn kind(&self) -> BackendKind;

    /// Detect faces, returning suppressed, clamped detections in
    /// original-image coordinates, ordered confidence-descending.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError>;
}

/// Construct the backend named by `config.kind`.
pub fn load_backend(config: &DetectorConfig) -> Result<Box<dyn DetectorBackend>, DetectorError> {
    match config.kind {
        BackendKind::Scrfd => Ok(Box::new(scrfd::ScrfdDetector::load(config)?)),
        BackendKind::YoloFace => Ok(Box::new(yolo::YoloFaceDetector::load(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_thresholds() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.input_size, 640);
        assert!((cfg.confidence_threshold - 0.5).abs() < 1e-6);
        assert!((cfg.nms_threshold - 0.4).abs() < 1e-6);
        assert_eq!(cfg.min_face_size, 10);
    }

    #[test]
    fn test_load_backend_missing_model() {
        let cfg = DetectorConfig {
            model_path: PathBuf::from("/nonexistent/det.onnx"),
            ..DetectorConfig::default()
        };
        assert!(matches!(
            load_backend(&cfg),
            Err(DetectorError::Session(SessionError::ModelNotFound(_)))
        ));
    }
}
