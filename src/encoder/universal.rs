//! 1280-D universal (style-robust) encoder.
//!
//! Generalizes across art styles where the identity encoder collapses;
//! weaker as a pure identity signal. Expects a 224x224 input with ImageNet
//! per-channel normalization on [0, 1]-scaled RGB.

use super::{run_embedding, EncoderError};
use crate::preprocess::{resize_tensor, ChannelOrder, TensorLayout};
use crate::session::{build_session, ComputeDevice};
use crate::types::{Embedding, UNIVERSAL_DIM};
use image::RgbImage;
use ort::session::Session;
use std::path::Path;

const UNIVERSAL_INPUT_SIZE: u32 = 224;
// ImageNet mean/std expressed in 0-255 pixel units.
const UNIVERSAL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const UNIVERSAL_STD: [f32; 3] = [58.395, 57.12, 57.375];
const UNIVERSAL_INTRA_THREADS: usize = 2;

const LAYOUT: TensorLayout = TensorLayout {
    size: UNIVERSAL_INPUT_SIZE,
    mean: UNIVERSAL_MEAN,
    std: UNIVERSAL_STD,
    order: ChannelOrder::Rgb,
};

#[derive(Debug)]
pub struct UniversalEncoder {
    session: Session,
}

impl UniversalEncoder {
    pub fn load(model_path: &Path, device: ComputeDevice) -> Result<Self, EncoderError> {
        let session = build_session(model_path, device, UNIVERSAL_INTRA_THREADS)?;
        Ok(Self { session })
    }

    /// Embed a face crop (or a whole image) into a unit-norm 1280-D vector.
    pub fn embed(&mut self, image: &RgbImage) -> Result<Embedding, EncoderError> {
        let input = resize_tensor(image, &LAYOUT);
        run_embedding(&mut self.session, &input, UNIVERSAL_DIM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(LAYOUT.size, 224);
        assert_eq!(LAYOUT.order, ChannelOrder::Rgb);
        // mean/std are the ImageNet constants scaled by 255
        assert!((LAYOUT.mean[0] / 255.0 - 0.485).abs() < 1e-3);
        assert!((LAYOUT.std[2] / 255.0 - 0.225).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_shape() {
        let crop = RgbImage::from_pixel(300, 300, image::Rgb([64, 64, 64]));
        let tensor = resize_tensor(&crop, &LAYOUT);
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_missing_model_is_session_error() {
        let err = UniversalEncoder::load(Path::new("/nonexistent/universal.onnx"), ComputeDevice::Cpu)
            .unwrap_err();
        assert!(matches!(err, EncoderError::Session(_)));
    }
}
