//! Face cropping and landmark-based alignment.
//!
//! Two crop paths: a padded square crop kept for storage/quality scoring,
//! and a similarity-transform aligned 112x112 crop fed to the identity
//! encoder to match its training assumptions.

use crate::postprocess::RawDetection;
use crate::types::FaceBox;
use image::imageops::FilterType;
use image::RgbImage;

/// ArcFace reference landmarks for a 112x112 aligned output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// A padded face crop plus the integer box it was cut from.
pub struct FaceCrop {
    pub image: RgbImage,
    pub bbox: FaceBox,
}

/// Expand the detection by `pad_ratio` of its larger dimension, square it by
/// centering on the larger side, clamp to image bounds, and optionally
/// resize to a canonical storage size.
///
/// Returns `None` when the usable clamped region falls below `min_face` in
/// either dimension; such faces are dropped upstream of embedding.
pub fn padded_crop(
    image: &RgbImage,
    det: &RawDetection,
    pad_ratio: f32,
    storage_size: Option<u32>,
    min_face: u32,
) -> Option<FaceCrop> {
    let pad = pad_ratio * det.width().max(det.height());
    let side = det.width().max(det.height()) + 2.0 * pad;

    let cx = (det.x1 + det.x2) / 2.0;
    let cy = (det.y1 + det.y2) / 2.0;

    let x1 = (cx - side / 2.0).max(0.0);
    let y1 = (cy - side / 2.0).max(0.0);
    let x2 = (cx + side / 2.0).min(image.width() as f32);
    let y2 = (cy + side / 2.0).min(image.height() as f32);

    let w = (x2 - x1).floor() as u32;
    let h = (y2 - y1).floor() as u32;
    if w < min_face || h < min_face {
        return None;
    }

    let bbox = FaceBox {
        x: x1.floor() as u32,
        y: y1.floor() as u32,
        width: w,
        height: h,
    };

    let mut crop = image::imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height)
        .to_image();
    if let Some(size) = storage_size {
        crop = image::imageops::resize(&crop, size, size, FilterType::Triangle);
    }

    Some(FaceCrop { image: crop, bbox })
}

/// Align a face to the canonical 112x112 position.
///
/// Estimates a 4-DOF similarity transform (scale, rotation, translation)
/// from the detected landmarks to the reference points by least-squares,
/// then warps the source image with bilinear interpolation. Out-of-bounds
/// samples are black.
pub fn aligned_crop(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(image, &matrix, ALIGNED_SIZE)
}

/// Estimate a 2x3 similarity transform `[a, -b, tx, b, a, ty]` mapping `src`
/// points onto `dst` points via least-squares over the overdetermined system
/// built from all five pairs.
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // For each pair (sx, sy) -> (dx, dy):
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];
        for j in 0..4 {
            for k in 0..4 {
                ata[j * 4 + k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let x = solve_4x4(&ata, &atb);
    [x[0], -x[1], x[2], x[1], x[0], x[3]]
}

/// Gaussian elimination with partial pivoting for the 4x4 normal equations.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        for j in 0..4 {
            m[i][j] = ata[i * 4 + j];
        }
        m[i][4] = atb[i];
    }

    for col in 0..4 {
        let mut max_row = col;
        for row in (col + 1)..4 {
            if m[row][col].abs() > m[max_row][col].abs() {
                max_row = row;
            }
        }
        m.swap(col, max_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return [1.0, 0.0, 0.0, 0.0]; // degenerate landmarks: identity-ish
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Apply the inverse of a similarity transform to sample an RGB output.
fn warp_affine(image: &RgbImage, matrix: &[f32; 6], out_size: u32) -> RgbImage {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    // Invert the rotation/scale part: M = [[a, -b], [b, a]], det = a^2 + b^2
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return RgbImage::new(out_size, out_size);
    }
    let ia = a / det;
    let ib = b / det;

    let (src_w, src_h) = (image.width() as i64, image.height() as i64);
    let mut output = RgbImage::new(out_size, out_size);

    for oy in 0..out_size {
        for ox in 0..out_size {
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i64;
            let y0 = sy.floor() as i64;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let sample = |x: i64, y: i64, c: usize| -> f32 {
                if x >= 0 && x < src_w && y >= 0 && y < src_h {
                    image.get_pixel(x as u32, y as u32).0[c] as f32
                } else {
                    0.0
                }
            };

            let mut pixel = [0u8; 3];
            for c in 0..3 {
                let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                    + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                    + sample(x0 + 1, y0 + 1, c) * fx * fy;
                pixel[c] = val.round().clamp(0.0, 255.0) as u8;
            }
            output.put_pixel(ox, oy, image::Rgb(pixel));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f32, y1: f32, x2: f32, y2: f32) -> RawDetection {
        RawDetection { x1, y1, x2, y2, confidence: 0.9, landmarks: None }
    }

    #[test]
    fn test_padded_crop_is_square_when_unclamped() {
        let image = RgbImage::new(1000, 1000);
        let crop = padded_crop(&image, &det(400.0, 400.0, 500.0, 560.0), 0.25, None, 10).unwrap();
        // 100x160 box, pad 40 → 240x240 square
        assert_eq!(crop.bbox.width, 240);
        assert_eq!(crop.bbox.height, 240);
        assert_eq!(crop.image.width(), 240);
    }

    #[test]
    fn test_padded_crop_clamps_at_border() {
        let image = RgbImage::new(200, 200);
        let crop = padded_crop(&image, &det(0.0, 0.0, 60.0, 60.0), 0.25, None, 10).unwrap();
        assert_eq!(crop.bbox.x, 0);
        assert_eq!(crop.bbox.y, 0);
        assert!(crop.bbox.width <= 200);
    }

    #[test]
    fn test_padded_crop_storage_resize() {
        let image = RgbImage::new(500, 500);
        let crop = padded_crop(&image, &det(100.0, 100.0, 200.0, 200.0), 0.25, Some(256), 10).unwrap();
        assert_eq!(crop.image.width(), 256);
        assert_eq!(crop.image.height(), 256);
        // bbox still reflects source-image coordinates
        assert_eq!(crop.bbox.width, 150);
    }

    #[test]
    fn test_padded_crop_rejects_tiny_face() {
        let image = RgbImage::new(100, 100);
        assert!(padded_crop(&image, &det(0.0, 0.0, 5.0, 5.0), 0.25, None, 10).is_none());
    }

    #[test]
    fn test_identity_transform() {
        let pts = REFERENCE_LANDMARKS_112;
        let m = estimate_similarity_transform(&pts, &pts);
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!((m[4] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_double_scale_landmarks_halve() {
        let src: [(f32, f32); 5] =
            std::array::from_fn(|i| (REFERENCE_LANDMARKS_112[i].0 * 2.0, REFERENCE_LANDMARKS_112[i].1 * 2.0));
        let m = estimate_similarity_transform(&src, &REFERENCE_LANDMARKS_112);
        assert!((m[0] - 0.5).abs() < 0.01, "a = {}, expected ~0.5", m[0]);
    }

    #[test]
    fn test_aligned_crop_output_size() {
        let image = RgbImage::new(640, 480);
        let aligned = aligned_crop(&image, &REFERENCE_LANDMARKS_112);
        assert_eq!(aligned.width(), ALIGNED_SIZE);
        assert_eq!(aligned.height(), ALIGNED_SIZE);
    }

    #[test]
    fn test_aligned_crop_moves_landmark_to_reference() {
        // Paint a bright patch at the source left-eye position; after
        // alignment it must land near the reference left-eye position.
        let mut image = RgbImage::new(200, 200);
        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for dy in 0..5u32 {
            for dx in 0..5u32 {
                let px = src[0].0 as u32 - 2 + dx;
                let py = src[0].1 as u32 - 2 + dy;
                image.put_pixel(px, py, image::Rgb([255, 255, 255]));
            }
        }

        let aligned = aligned_crop(&image, &src);
        let (rx, ry) = (
            REFERENCE_LANDMARKS_112[0].0.round() as u32,
            REFERENCE_LANDMARKS_112[0].1.round() as u32,
        );
        let mut max_val = 0u8;
        for dy in 0..3u32 {
            for dx in 0..3u32 {
                let x = (rx - 1 + dx).min(ALIGNED_SIZE - 1);
                let y = (ry - 1 + dy).min(ALIGNED_SIZE - 1);
                max_val = max_val.max(aligned.get_pixel(x, y).0[0]);
            }
        }
        assert!(max_val > 100, "expected bright patch near ({rx}, {ry}), max={max_val}");
    }
}
