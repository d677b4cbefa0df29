//! ONNX Runtime session construction with device selection.
//!
//! Every inference-bearing component (each detector backend, each encoder)
//! owns an exclusive session built through [`build_session`]. A requested
//! accelerator that fails to bind degrades gracefully to CPU; only a total
//! failure to bind any device surfaces as a hard error at construction time.

use ort::ep::{CUDA as CUDAExecutionProvider, CoreML as CoreMLExecutionProvider};
use ort::session::Session;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Compute device requested for an inference session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Cuda,
    CoreMl,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Build a session on the requested device, falling back to CPU if the
/// accelerator fails to bind. The fallback is logged and non-fatal.
pub fn build_session(
    model_path: &Path,
    device: ComputeDevice,
    intra_threads: usize,
) -> Result<Session, SessionError> {
    if !model_path.exists() {
        return Err(SessionError::ModelNotFound(
            model_path.to_string_lossy().into_owned(),
        ));
    }

    if device != ComputeDevice::Cpu {
        match build_on_device(model_path, device, intra_threads) {
            Ok(session) => {
                tracing::info!(path = %model_path.display(), ?device, "session bound to accelerator");
                return Ok(session);
            }
            Err(err) => {
                tracing::warn!(
                    path = %model_path.display(),
                    ?device,
                    error = %err,
                    "accelerator failed to bind; falling back to CPU"
                );
            }
        }
    }

    let session = Session::builder()?
        .with_intra_threads(intra_threads)
        .map_err(ort::Error::from)?
        .commit_from_file(model_path)?;

    tracing::info!(
        path = %model_path.display(),
        inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
        outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
        "session loaded on CPU"
    );

    Ok(session)
}

fn build_on_device(
    model_path: &Path,
    device: ComputeDevice,
    intra_threads: usize,
) -> Result<Session, ort::Error> {
    let provider = match device {
        ComputeDevice::Cuda => CUDAExecutionProvider::default().build().error_on_failure(),
        ComputeDevice::CoreMl => CoreMLExecutionProvider::default().build().error_on_failure(),
        ComputeDevice::Cpu => unreachable!("CPU path handled by caller"),
    };

    Session::builder()?
        .with_execution_providers([provider])?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_model_is_hard_error() {
        let path = PathBuf::from("/nonexistent/model.onnx");
        let err = build_session(&path, ComputeDevice::Cpu, 2).unwrap_err();
        assert!(matches!(err, SessionError::ModelNotFound(_)));
    }

    #[test]
    fn test_device_default_is_cpu() {
        assert_eq!(ComputeDevice::default(), ComputeDevice::Cpu);
    }
}
