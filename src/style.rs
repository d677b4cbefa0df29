//! Style-classifier boundary.
//!
//! The classifier itself is an external collaborator; this crate only
//! consumes its verdict to pick blend weights. The facade accepts any boxed
//! implementation and falls back to [`StyleKind::Mixed`] when none is
//! supplied (even weighting).

use crate::types::StyleKind;
use image::RgbImage;

/// Whole-image art-style classification contract.
///
/// Implementations handle their own failures internally and return a best
/// guess; `Mixed` is the neutral answer.
pub trait StyleClassifier {
    fn classify(&mut self, image: &RgbImage) -> StyleKind;
}

/// Always answers with one fixed style. Useful for callers that tag whole
/// collections, and for tests.
pub struct FixedStyle(pub StyleKind);

impl StyleClassifier for FixedStyle {
    fn classify(&mut self, _image: &RgbImage) -> StyleKind {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_style_returns_its_kind() {
        let mut classifier = FixedStyle(StyleKind::Anime);
        let image = RgbImage::new(8, 8);
        assert_eq!(classifier.classify(&image), StyleKind::Anime);
    }
}
