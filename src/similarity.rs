//! Cosine similarity and style-aware blending.

use crate::types::{Embedding, StyleKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimilarityError {
    /// Mismatched embedding widths signal a caller/configuration defect,
    /// not a transient condition. Never retried.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Cosine similarity: dot(a, b) / (‖a‖ · ‖b‖), in [-1, 1].
///
/// Returns 0.0 when either vector has zero norm. Errors when the two
/// vectors differ in length.
pub fn cosine(a: &Embedding, b: &Embedding) -> Result<f32, SimilarityError> {
    if a.dim() != b.dim() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.dim(),
            right: b.dim(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.values.iter().zip(b.values.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    Ok(if denom > 0.0 { dot / denom } else { 0.0 })
}

/// Blend weights (identity, universal) for a given art style.
///
/// The identity encoder dominates on realistic imagery; the universal
/// encoder dominates on stylized art; mixed/unknown splits evenly.
pub fn style_weights(style: StyleKind) -> (f32, f32) {
    match style {
        StyleKind::Realistic => (0.8, 0.2),
        StyleKind::Anime | StyleKind::ThreeD => (0.2, 0.8),
        StyleKind::Mixed => (0.5, 0.5),
    }
}

/// Style-aware blended similarity over whichever embedding pairs are present.
///
/// The weighted sum is normalized by the weights actually used; exactly 0.0
/// when neither pair is available.
pub fn blended(
    identity_pair: Option<(&Embedding, &Embedding)>,
    universal_pair: Option<(&Embedding, &Embedding)>,
    style: StyleKind,
) -> Result<f32, SimilarityError> {
    let (id_weight, uni_weight) = style_weights(style);

    let mut total = 0.0f32;
    let mut used = 0.0f32;

    if let Some((a, b)) = identity_pair {
        total += id_weight * cosine(a, b)?;
        used += id_weight;
    }
    if let Some((a, b)) = universal_pair {
        total += uni_weight * cosine(a, b)?;
        used += uni_weight;
    }

    Ok(if used > 0.0 { total / used } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_cosine_identical() {
        let v = emb(&[0.6, 0.8]);
        assert!((cosine(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[-1.0, 0.0]);
        assert!((cosine(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.0, 1.0]);
        assert!(cosine(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = emb(&[0.0, 0.0]);
        let b = emb(&[1.0, 0.0]);
        assert_eq!(cosine(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_dimension_mismatch_is_error() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[1.0, 0.0, 0.0]);
        assert!(matches!(
            cosine(&a, &b),
            Err(SimilarityError::DimensionMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_style_weight_table() {
        assert_eq!(style_weights(StyleKind::Realistic), (0.8, 0.2));
        assert_eq!(style_weights(StyleKind::Anime), (0.2, 0.8));
        assert_eq!(style_weights(StyleKind::ThreeD), (0.2, 0.8));
        assert_eq!(style_weights(StyleKind::Mixed), (0.5, 0.5));
    }

    #[test]
    fn test_blended_no_pairs_is_exactly_zero() {
        let s = blended(None, None, StyleKind::Realistic).unwrap();
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_blended_single_pair_normalizes_weights() {
        // With only the identity pair present the result is the plain
        // cosine, regardless of style weighting.
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.0, 1.0]);
        let s = blended(Some((&a, &a)), None, StyleKind::Anime).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
        let s = blended(Some((&a, &b)), None, StyleKind::Anime).unwrap();
        assert!(s.abs() < 1e-6);
    }

    #[test]
    fn test_blended_weights_by_style() {
        let same = emb(&[1.0, 0.0]);
        let opposite = emb(&[-1.0, 0.0]);
        // identity pair agrees (+1), universal pair disagrees (-1)
        let realistic =
            blended(Some((&same, &same)), Some((&same, &opposite)), StyleKind::Realistic).unwrap();
        let anime =
            blended(Some((&same, &same)), Some((&same, &opposite)), StyleKind::Anime).unwrap();
        // realistic: 0.8*1 + 0.2*(-1) = 0.6; anime: 0.2*1 + 0.8*(-1) = -0.6
        assert!((realistic - 0.6).abs() < 1e-6);
        assert!((anime + 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_blended_in_range() {
        let a = emb(&[0.6, 0.8]);
        let b = emb(&[-0.8, 0.6]);
        let s = blended(Some((&a, &b)), Some((&b, &a)), StyleKind::Mixed).unwrap();
        assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn test_blended_propagates_dimension_mismatch() {
        let a = emb(&[1.0, 0.0]);
        let c = emb(&[1.0, 0.0, 0.0]);
        assert!(blended(Some((&a, &c)), None, StyleKind::Mixed).is_err());
    }
}
