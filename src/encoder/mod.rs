//! Embedding encoders.
//!
//! Shared contract: a face crop (or whole image) in, a fixed-length
//! unit-norm vector out. Two encoders with different strengths:
//! [`identity`] (512-D, strong identity signal, degrades on stylized art)
//! and [`universal`] (1280-D, weaker identity signal, style-robust).

use crate::session::SessionError;
use crate::types::Embedding;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

pub mod identity;
pub mod universal;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("session: {0}")]
    Session(#[from] SessionError),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("expected {expected}-dim embedding, got {got}")]
    UnexpectedDim { expected: usize, got: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Run one inference call, validate the output width, and L2-normalize.
///
/// A zero output vector is passed through unchanged; callers treat it as
/// invalid.
pub(crate) fn run_embedding(
    session: &mut Session,
    input: &Array4<f32>,
    expected_dim: usize,
) -> Result<Embedding, EncoderError> {
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

    let (_, raw) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

    if raw.len() != expected_dim {
        return Err(EncoderError::UnexpectedDim {
            expected: expected_dim,
            got: raw.len(),
        });
    }

    let mut embedding = Embedding::new(raw.to_vec());
    embedding.l2_normalize();
    Ok(embedding)
}
