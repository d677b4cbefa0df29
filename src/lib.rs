//! atelier-faces — face detection, multi-modal embedding, and identity
//! clustering for an AI-artwork image library.
//!
//! Coordinates pretrained ONNX detector and encoder models (via ONNX
//! Runtime), classical postprocessing (NMS, landmark pose heuristics,
//! crop/quality scoring), and style-aware greedy clustering that groups
//! detected faces into same-person identities across art styles.
//!
//! The entry point is [`pipeline::FacePipeline`]; persistence, UI, library
//! scanning, and the style classifier's internals are external
//! collaborators.

pub mod cluster;
pub mod crop;
pub mod detector;
pub mod encoder;
pub mod pipeline;
pub mod pose;
pub mod postprocess;
pub mod preprocess;
pub mod quality;
pub mod session;
pub mod similarity;
pub mod style;
pub mod types;

pub use pipeline::{FaceMatch, FacePipeline, PipelineConfig, PipelineError};
pub use session::ComputeDevice;
pub use style::StyleClassifier;
pub use types::{
    BackendKind, Embedding, FaceBox, FaceDetection, ImageFaceResults, Pose, StyleKind,
};
