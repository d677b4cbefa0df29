//! Face quality and sharpness scoring.
//!
//! Quality is a weighted combination dominated by detector confidence, with
//! a crop-size term and an optional pose-penalty term. The weights are a
//! pluggable policy keyed by backend kind. Sharpness is a local-contrast
//! proxy with a single calibrated divisor for every backend.

use crate::types::{BackendKind, Pose};
use image::RgbImage;

/// Crop short side at which the size term saturates to 1.0.
const SIZE_SATURATION_PX: f32 = 150.0;
/// Combined |yaw| + |pitch| at which the pose term reaches 0.
const POSE_PENALTY_RANGE_DEG: f32 = 90.0;
/// Empirical variance divisor bounding sharpness to [0, 1]. One constant
/// for every backend; in-focus crops land a few hundred variance units.
const SHARPNESS_DIVISOR: f32 = 1000.0;

/// Scoring weights for one backend family.
#[derive(Debug, Clone, Copy)]
pub struct QualityPolicy {
    pub confidence_weight: f32,
    pub size_weight: f32,
    pub pose_weight: f32,
}

impl QualityPolicy {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            // Confidence-dominant variant; no pose term.
            BackendKind::Scrfd => Self {
                confidence_weight: 0.6,
                size_weight: 0.4,
                pose_weight: 0.0,
            },
            // Grid backend reports looser confidences; lean on pose when
            // it is available.
            BackendKind::YoloFace => Self {
                confidence_weight: 0.5,
                size_weight: 0.3,
                pose_weight: 0.2,
            },
        }
    }

    /// Weighted quality score in [0, 1].
    ///
    /// When `pose` is `None` (backends without landmarks), the pose weight
    /// is dropped and the remaining weights are renormalized.
    pub fn quality(&self, confidence: f32, crop_w: u32, crop_h: u32, pose: Option<&Pose>) -> f32 {
        let size_term = (crop_w.min(crop_h) as f32 / SIZE_SATURATION_PX).min(1.0);

        let mut score = self.confidence_weight * confidence.clamp(0.0, 1.0)
            + self.size_weight * size_term;
        let mut used = self.confidence_weight + self.size_weight;

        if let Some(pose) = pose {
            if self.pose_weight > 0.0 {
                let pose_term =
                    (1.0 - (pose.yaw.abs() + pose.pitch.abs()) / POSE_PENALTY_RANGE_DEG).max(0.0);
                score += self.pose_weight * pose_term;
                used += self.pose_weight;
            }
        }

        if used > 0.0 {
            (score / used).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Local-contrast sharpness proxy in [0, 1].
///
/// For each interior pixel of the grayscale crop, accumulate
/// |center - mean(4-neighbors)|, take variance = E[d²] - E[d]², and scale
/// by the calibrated divisor.
pub fn sharpness(crop: &RgbImage) -> f32 {
    let (w, h) = (crop.width() as usize, crop.height() as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }

    let gray: Vec<f32> = crop
        .pixels()
        .map(|p| 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
        .collect();

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let count = ((w - 2) * (h - 2)) as f64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = gray[y * w + x];
            let neighbors =
                (gray[(y - 1) * w + x] + gray[(y + 1) * w + x] + gray[y * w + x - 1] + gray[y * w + x + 1])
                    / 4.0;
            let d = (center - neighbors).abs() as f64;
            sum += d;
            sum_sq += d * d;
        }
    }

    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0) as f32;
    (variance / SHARPNESS_DIVISOR).clamp(0.0, 1.0)
}
