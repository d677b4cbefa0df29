//! Shared detection postprocessing: IoU, non-maximum suppression, and
//! bound clamping / minimum-size filtering.
//!
//! Both detector families feed their decoded candidates through this one
//! module, so the suppression semantics are identical regardless of backend.

/// A decoded detection in original-image coordinates, before integer
/// conversion. Corner format.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    /// [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl RawDetection {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Intersection-over-Union between two boxes. 0.0 when disjoint or when the
/// union area is degenerate.
pub fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width() * a.height() + b.width() * b.height() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression.
///
/// Detections are sorted confidence-descending (stable sort, so ties keep
/// input order); the highest remaining box is emitted and every remaining
/// box with IoU ≥ `threshold` against it is suppressed. Output order is
/// selection order, so results stay confidence-descending.
pub fn nms(mut detections: Vec<RawDetection>, threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i], &detections[j]) >= threshold {
                suppressed[j] = true;
            }
        }
        keep.push(detections[i].clone());
    }

    keep
}

/// Clamp detections to image bounds and drop boxes smaller than
/// `min_face` pixels in either dimension.
pub fn clamp_and_filter(
    detections: Vec<RawDetection>,
    img_w: u32,
    img_h: u32,
    min_face: u32,
) -> Vec<RawDetection> {
    let (w, h) = (img_w as f32, img_h as f32);
    detections
        .into_iter()
        .filter_map(|mut d| {
            d.x1 = d.x1.clamp(0.0, w);
            d.y1 = d.y1.clamp(0.0, h);
            d.x2 = d.x2.clamp(0.0, w);
            d.y2 = d.y2.clamp(0.0, h);
            if d.width() >= min_face as f32 && d.height() >= min_face as f32 {
                Some(d)
            } else {
                None
            }
        })
        .collect()
}
