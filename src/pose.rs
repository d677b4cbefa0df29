//! Heuristic head-pose estimation from 5-point landmarks.
//!
//! A rough trigonometric approximation with no camera intrinsics or
//! calibration. Good enough as a quality-scoring signal; not a head-pose
//! measurement.

use crate::types::Pose;

const YAW_RANGE_DEG: f32 = 45.0;
const PITCH_RANGE_DEG: f32 = 30.0;
/// Expected nose drop below the eye line, as a fraction of face height,
/// for a frontal face.
const EXPECTED_NOSE_DROP: f32 = 0.35;

/// Estimate yaw/pitch/roll in degrees from landmarks
/// [left_eye, right_eye, nose, left_mouth, right_mouth] and the face box
/// dimensions in the same coordinate space.
pub fn estimate_pose(landmarks: &[(f32, f32); 5], face_width: f32, face_height: f32) -> Pose {
    if face_width <= 0.0 || face_height <= 0.0 {
        return Pose::default();
    }

    let (left_eye, right_eye, nose) = (landmarks[0], landmarks[1], landmarks[2]);
    let eye_cx = (left_eye.0 + right_eye.0) / 2.0;
    let eye_cy = (left_eye.1 + right_eye.1) / 2.0;

    // Yaw: horizontal nose offset from the eye center, normalized by half
    // the face width.
    let yaw = ((nose.0 - eye_cx) / (face_width / 2.0) * YAW_RANGE_DEG)
        .clamp(-YAW_RANGE_DEG, YAW_RANGE_DEG);

    // Pitch: how far the nose sits below the eye line versus the frontal
    // expectation.
    let expected = EXPECTED_NOSE_DROP * face_height;
    let pitch = (((nose.1 - eye_cy) - expected) / expected * PITCH_RANGE_DEG)
        .clamp(-PITCH_RANGE_DEG, PITCH_RANGE_DEG);

    // Roll: eye-line angle.
    let roll = (right_eye.1 - left_eye.1)
        .atan2(right_eye.0 - left_eye.0)
        .to_degrees();

    Pose { yaw, pitch, roll }
}
