//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::assets::SizeToken;
use std::collections::BTreeMap;

/// Scale `original` to `width`, preserving aspect ratio.
///
/// The height never rounds below one pixel.
pub fn scale_to_width(original: (u32, u32), width: u32) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    if orig_w == 0 {
        return (width.max(1), orig_h.max(1));
    }
    let h = (orig_h as f64 * width as f64 / orig_w as f64).round() as u32;
    (width.max(1), h.max(1))
}

/// Calculate output dimensions for a size variant.
///
/// | Token | Result |
/// |---|---|
/// | `standard` | original size, capped at `max_width` (never upscaled) |
/// | `W` | width `W`, height from aspect ratio |
/// | `WxH` | exactly `W × H` |
/// | named | width from `named_sizes`, height from aspect ratio; unknown names act like `standard` |
///
/// # Examples
/// ```
/// # use vault_mirror::assets::SizeToken;
/// # use vault_mirror::imaging::calculate_variant_dimensions;
/// # use std::collections::BTreeMap;
/// let named = BTreeMap::new();
/// // 4000x3000 capped at 2500 wide
/// assert_eq!(calculate_variant_dimensions((4000, 3000), &SizeToken::Standard, 2500, &named), (2500, 1875));
/// // explicit width keeps aspect
/// assert_eq!(calculate_variant_dimensions((400, 300), &SizeToken::Width(200), 2500, &named), (200, 150));
/// ```
pub fn calculate_variant_dimensions(
    original: (u32, u32),
    size: &SizeToken,
    max_width: u32,
    named_sizes: &BTreeMap<String, u32>,
) -> (u32, u32) {
    match size {
        SizeToken::Standard => standard_dimensions(original, max_width),
        SizeToken::Width(w) => scale_to_width(original, *w),
        SizeToken::Exact { width, height } => ((*width).max(1), (*height).max(1)),
        SizeToken::Named(name) => match named_sizes.get(name) {
            Some(w) => scale_to_width(original, *w),
            None => standard_dimensions(original, max_width),
        },
    }
}

fn standard_dimensions(original: (u32, u32), max_width: u32) -> (u32, u32) {
    if original.0 <= max_width {
        original
    } else {
        scale_to_width(original, max_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named() -> BTreeMap<String, u32> {
        [("small".to_string(), 400)].into_iter().collect()
    }

    #[test]
    fn standard_keeps_small_images() {
        assert_eq!(
            calculate_variant_dimensions((800, 600), &SizeToken::Standard, 2500, &named()),
            (800, 600)
        );
    }

    #[test]
    fn standard_caps_wide_images() {
        assert_eq!(
            calculate_variant_dimensions((5000, 2000), &SizeToken::Standard, 2500, &named()),
            (2500, 1000)
        );
    }

    #[test]
    fn width_preserves_aspect() {
        assert_eq!(
            calculate_variant_dimensions((1000, 500), &SizeToken::Width(300), 2500, &named()),
            (300, 150)
        );
    }

    #[test]
    fn width_may_upscale() {
        assert_eq!(scale_to_width((100, 50), 400), (400, 200));
    }

    #[test]
    fn exact_ignores_aspect() {
        assert_eq!(
            calculate_variant_dimensions(
                (1000, 500),
                &SizeToken::Exact {
                    width: 200,
                    height: 200
                },
                2500,
                &named()
            ),
            (200, 200)
        );
    }

    #[test]
    fn named_size_looks_up_width() {
        assert_eq!(
            calculate_variant_dimensions(
                (800, 800),
                &SizeToken::Named("small".into()),
                2500,
                &named()
            ),
            (400, 400)
        );
    }

    #[test]
    fn unknown_named_size_falls_back_to_standard() {
        assert_eq!(
            calculate_variant_dimensions(
                (3000, 1500),
                &SizeToken::Named("huge".into()),
                1000,
                &named()
            ),
            (1000, 500)
        );
    }

    #[test]
    fn tiny_heights_never_reach_zero() {
        assert_eq!(scale_to_width((1000, 1), 10), (10, 1));
    }
}
