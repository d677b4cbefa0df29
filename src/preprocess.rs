//! Image-to-tensor preprocessing shared by detector backends and encoders.
//!
//! Detectors take a letterboxed square input (aspect preserved, centered
//! padding); encoders take a plain square resize. Both produce NCHW float
//! tensors with per-layout normalization and channel order.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

/// Scale and padding applied when fitting an image into a square input.
///
/// Also the inverse mapping used to bring model-space coordinates back into
/// original-image space.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Compute the aspect-preserving fit of `src_w × src_h` into `dst × dst`.
    pub fn fit(src_w: u32, src_h: u32, dst: u32) -> Self {
        let scale_w = dst as f32 / src_w as f32;
        let scale_h = dst as f32 / src_h as f32;
        let scale = scale_w.min(scale_h);
        let new_w = (src_w as f32 * scale).round();
        let new_h = (src_h as f32 * scale).round();
        Self {
            scale,
            pad_x: (dst as f32 - new_w) / 2.0,
            pad_y: (dst as f32 - new_h) / 2.0,
        }
    }

    /// Map a point from letterboxed model space back to original-image space.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Channel order expected by a model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    /// InsightFace-family models expect BGR.
    Bgr,
}

/// Input-tensor layout for one model: square size, per-channel
/// normalization, and channel order. Mean/std are in 0–255 pixel units.
#[derive(Debug, Clone, Copy)]
pub struct TensorLayout {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub order: ChannelOrder,
}

impl TensorLayout {
    fn normalize(&self, pixel: [u8; 3]) -> [f32; 3] {
        let ordered = match self.order {
            ChannelOrder::Rgb => [pixel[0], pixel[1], pixel[2]],
            ChannelOrder::Bgr => [pixel[2], pixel[1], pixel[0]],
        };
        let mut out = [0.0f32; 3];
        for c in 0..3 {
            out[c] = (ordered[c] as f32 - self.mean[c]) / self.std[c];
        }
        out
    }
}

/// Letterbox an image into `layout.size` square and build the NCHW tensor.
///
/// Padding pixels use the layout mean, so they normalize to 0.0.
pub fn letterbox_tensor(image: &RgbImage, layout: &TensorLayout) -> (Array4<f32>, Letterbox) {
    let size = layout.size;
    let letterbox = Letterbox::fit(image.width(), image.height(), size);

    let new_w = (image.width() as f32 * letterbox.scale).round().max(1.0) as u32;
    let new_h = (image.height() as f32 * letterbox.scale).round().max(1.0) as u32;
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let pad_x = letterbox.pad_x.floor() as u32;
    let pad_y = letterbox.pad_y.floor() as u32;

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for y in 0..size {
        for x in 0..size {
            let inside = x >= pad_x && x < pad_x + new_w && y >= pad_y && y < pad_y + new_h;
            let pixel = if inside {
                resized.get_pixel(x - pad_x, y - pad_y).0
            } else {
                [
                    layout.mean[0].round() as u8,
                    layout.mean[1].round() as u8,
                    layout.mean[2].round() as u8,
                ]
            };
            let norm = layout.normalize(pixel);
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = norm[c];
            }
        }
    }

    (tensor, letterbox)
}

/// Plain square resize into `layout.size` and NCHW tensor build, for
/// encoder inputs that do not preserve aspect ratio.
pub fn resize_tensor(image: &RgbImage, layout: &TensorLayout) -> Array4<f32> {
    let size = layout.size;
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
    for y in 0..size {
        for x in 0..size {
            let norm = layout.normalize(resized.get_pixel(x, y).0);
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = norm[c];
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_LAYOUT: TensorLayout = TensorLayout {
        size: 64,
        mean: [127.5, 127.5, 127.5],
        std: [128.0, 128.0, 128.0],
        order: ChannelOrder::Rgb,
    };

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let lb = Letterbox::fit(320, 240, 640);
        let (orig_x, orig_y) = (100.0f32, 50.0f32);
        let boxed_x = orig_x * lb.scale + lb.pad_x;
        let boxed_y = orig_y * lb.scale + lb.pad_y;
        let (rx, ry) = lb.to_original(boxed_x, boxed_y);
        assert!((rx - orig_x).abs() < 0.1, "x: {rx} vs {orig_x}");
        assert!((ry - orig_y).abs() < 0.1, "y: {ry} vs {orig_y}");
    }

    #[test]
    fn test_letterbox_wide_image_pads_vertically() {
        let lb = Letterbox::fit(640, 320, 640);
        assert!((lb.scale - 1.0).abs() < 1e-6);
        assert!((lb.pad_x - 0.0).abs() < 1e-6);
        assert!((lb.pad_y - 160.0).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_tensor_shape_and_padding() {
        // Wide uniform image: padded rows must normalize to ~0.
        let img = RgbImage::from_pixel(128, 32, image::Rgb([200, 200, 200]));
        let (tensor, lb) = letterbox_tensor(&img, &TEST_LAYOUT);
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert!(lb.pad_y > 0.0);
        // Top row is padding
        let pad_val = tensor[[0, 0, 0, 0]];
        assert!(pad_val.abs() < 0.01, "pad value {pad_val} should normalize near 0");
        // Center is image content: (200 - 127.5) / 128
        let center = tensor[[0, 0, 32, 32]];
        let expected = (200.0 - 127.5) / 128.0;
        assert!((center - expected).abs() < 0.05, "center {center} vs {expected}");
    }

    #[test]
    fn test_resize_tensor_uniform_stays_uniform() {
        let img = RgbImage::from_pixel(50, 50, image::Rgb([128, 128, 128]));
        let tensor = resize_tensor(&img, &TEST_LAYOUT);
        let expected = (128.0 - 127.5) / 128.0;
        for c in 0..3 {
            assert!((tensor[[0, c, 10, 10]] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bgr_order_swaps_channels() {
        let layout = TensorLayout { order: ChannelOrder::Bgr, ..TEST_LAYOUT };
        let img = RgbImage::from_pixel(64, 64, image::Rgb([255, 0, 0]));
        let tensor = resize_tensor(&img, &layout);
        // Channel 0 is blue (0), channel 2 is red (255)
        assert!(tensor[[0, 0, 5, 5]] < 0.0);
        assert!(tensor[[0, 2, 5, 5]] > 0.9);
    }
}
