//! Pure calculation functions for icon dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions for a width-targeted resize.
///
/// The width is set to `target_width` and the height follows the source
/// aspect ratio, rounded to the nearest pixel and never below 1. Square
/// sources (the normal case for icons) yield square output.
///
/// # Examples
/// ```
/// # use pwa_assets::imaging::scaled_dimensions;
/// assert_eq!(scaled_dimensions((512, 512), 64), (64, 64));
/// assert_eq!(scaled_dimensions((1024, 512), 192), (192, 96));
/// ```
pub fn scaled_dimensions(source: (u32, u32), target_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return (target_width, target_width);
    }
    let h = (target_width as f64 * src_h as f64 / src_w as f64).round() as u32;
    (target_width, h.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_stays_square() {
        assert_eq!(scaled_dimensions((512, 512), 192), (192, 192));
    }

    #[test]
    fn upscaling_is_allowed() {
        assert_eq!(scaled_dimensions((32, 32), 512), (512, 512));
    }

    #[test]
    fn landscape_keeps_aspect() {
        assert_eq!(scaled_dimensions((1000, 500), 100), (100, 50));
    }

    #[test]
    fn portrait_keeps_aspect() {
        assert_eq!(scaled_dimensions((400, 800), 64), (64, 128));
    }

    #[test]
    fn rounds_to_nearest_pixel() {
        // 3:2 at width 100 → 66.67 → 67
        assert_eq!(scaled_dimensions((300, 200), 100), (100, 67));
    }

    #[test]
    fn extreme_aspect_never_collapses_to_zero() {
        assert_eq!(scaled_dimensions((10_000, 1), 64), (64, 1));
    }

    #[test]
    fn zero_width_source_falls_back_to_square() {
        assert_eq!(scaled_dimensions((0, 10), 64), (64, 64));
    }
}
