//! 512-D identity encoder (ArcFace family).
//!
//! Strong same-person signal on realistic faces; degrades on stylized art,
//! which is why the pipeline blends it with the universal encoder. Expects
//! an aligned 112x112 crop; pixels map to [-1, 1] in BGR order.

use super::{run_embedding, EncoderError};
use crate::preprocess::{resize_tensor, ChannelOrder, TensorLayout};
use crate::session::{build_session, ComputeDevice};
use crate::types::{Embedding, IDENTITY_DIM};
use image::RgbImage;
use ort::session::Session;
use std::path::Path;

const IDENTITY_INPUT_SIZE: u32 = 112;
const IDENTITY_MEAN: f32 = 127.5;
// Symmetric normalization, not 128.0
const IDENTITY_STD: f32 = 127.5;
const IDENTITY_INTRA_THREADS: usize = 2;

const LAYOUT: TensorLayout = TensorLayout {
    size: IDENTITY_INPUT_SIZE,
    mean: [IDENTITY_MEAN; 3],
    std: [IDENTITY_STD; 3],
    order: ChannelOrder::Bgr,
};

#[derive(Debug)]
pub struct IdentityEncoder {
    session: Session,
}

impl IdentityEncoder {
    pub fn load(model_path: &Path, device: ComputeDevice) -> Result<Self, EncoderError> {
        let session = build_session(model_path, device, IDENTITY_INTRA_THREADS)?;
        Ok(Self { session })
    }

    /// Embed a face crop into a unit-norm 512-D identity vector.
    ///
    /// The crop should be landmark-aligned when landmarks are available;
    /// an unaligned padded crop still embeds, with reduced fidelity.
    pub fn embed(&mut self, crop: &RgbImage) -> Result<Embedding, EncoderError> {
        let input = resize_tensor(crop, &LAYOUT);
        run_embedding(&mut self.session, &input, IDENTITY_DIM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(LAYOUT.size, 112);
        assert_eq!(LAYOUT.order, ChannelOrder::Bgr);
        // 127.5 mean and std map [0, 255] onto [-1, 1]
        assert!(((255.0 - LAYOUT.mean[0]) / LAYOUT.std[0] - 1.0).abs() < 1e-6);
        assert!(((0.0 - LAYOUT.mean[0]) / LAYOUT.std[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_shape() {
        let crop = RgbImage::from_pixel(200, 180, image::Rgb([120, 90, 60]));
        let tensor = resize_tensor(&crop, &LAYOUT);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_missing_model_is_session_error() {
        let err = IdentityEncoder::load(Path::new("/nonexistent/arcface.onnx"), ComputeDevice::Cpu)
            .unwrap_err();
        assert!(matches!(err, EncoderError::Session(_)));
    }
}
