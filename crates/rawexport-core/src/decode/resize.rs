//! Resize planning and resampling.
//!
//! Export resizing is always "fit inside, no enlargement": the requested box
//! bounds the output, the aspect ratio is kept, and a raster is never scaled
//! past its decoded size.

use image::DynamicImage;

use super::{DecodeError, FilterType, RasterBuffer};

/// Compute the output size for an optional target box.
///
/// - Neither side given: the source size.
/// - One side given: that side is matched and the other derived from the
///   aspect ratio (rounded to nearest, minimum 1).
/// - Both given: the image is fitted inside the box.
///
/// Whenever the fitted size would be larger than the source, the source
/// size is returned instead. A zero target is treated as absent.
pub fn fit_within(source: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (sw, sh) = source;
    if sw == 0 || sh == 0 {
        return (0, 0);
    }

    let width = width.filter(|&w| w > 0);
    let height = height.filter(|&h| h > 0);

    match (width, height) {
        (None, None) => source,
        (Some(w), None) if w < sw => (w, scale_side(sh, w, sw)),
        (None, Some(h)) if h < sh => (scale_side(sw, h, sh), h),
        (Some(w), Some(h)) if w < sw || h < sh => {
            // Width is the binding constraint when w/sw <= h/sh.
            if w as u64 * sh as u64 <= h as u64 * sw as u64 {
                (w, scale_side(sh, w, sw))
            } else {
                (scale_side(sw, h, sh), h)
            }
        }
        _ => source,
    }
}

/// Fit the longest edge inside `max_edge`, never enlarging.
pub fn fit_longest_edge(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    fit_within(source, Some(max_edge), Some(max_edge))
}

/// `side * numerator / denominator`, rounded to nearest, at least 1.
fn scale_side(side: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (side as u64 * numerator as u64 + denominator as u64 / 2) / denominator as u64;
    (scaled.max(1)).min(u32::MAX as u64) as u32
}

/// Resample an image to exact dimensions. Same-size requests return a clone.
pub fn resize_image(
    image: &DynamicImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    image.resize_exact(width, height, filter.to_image_filter())
}

/// Resample a raster to exact dimensions, preserving channels and bit depth.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` for a zero target.
pub fn resize_raster(
    raster: &RasterBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RasterBuffer, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    if raster.dimensions() == (width, height) {
        return Ok(raster.clone());
    }
    let img = raster.to_dynamic_image()?;
    RasterBuffer::from_dynamic_image(resize_image(&img, width, height, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Samples;

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(((x * 255) / width.max(1)) as u8);
                pixels.push(((y * 255) / height.max(1)) as u8);
                pixels.push(128);
            }
        }
        RasterBuffer::from_rgb8(width, height, pixels).unwrap()
    }

    #[test]
    fn test_width_only_preserves_aspect() {
        assert_eq!(fit_within((4000, 3000), Some(1000), None), (1000, 750));
    }

    #[test]
    fn test_height_only_preserves_aspect() {
        assert_eq!(fit_within((4000, 3000), None, Some(300)), (400, 300));
    }

    #[test]
    fn test_box_fit_landscape() {
        // Height is the binding side for a 3:2 image in a square box.
        assert_eq!(fit_within((6000, 4000), Some(2560), Some(2560)), (2560, 1707));
        assert_eq!(fit_within((6000, 4000), Some(3000), Some(1000)), (1500, 1000));
    }

    #[test]
    fn test_box_fit_portrait() {
        assert_eq!(fit_longest_edge((4000, 6000), 2560), (1707, 2560));
    }

    #[test]
    fn test_never_enlarges() {
        assert_eq!(fit_within((800, 600), Some(1920), None), (800, 600));
        assert_eq!(fit_within((800, 600), Some(1920), Some(1080)), (800, 600));
        assert_eq!(fit_longest_edge((100, 50), 256), (100, 50));
    }

    #[test]
    fn test_no_target_is_source() {
        assert_eq!(fit_within((123, 45), None, None), (123, 45));
        assert_eq!(fit_within((123, 45), Some(0), None), (123, 45));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_within((10000, 2), Some(100), None), (100, 1));
    }

    #[test]
    fn test_single_row_still_shrinks() {
        assert_eq!(fit_within((10000, 1), Some(100), None), (100, 1));
    }

    #[test]
    fn test_zero_source() {
        assert_eq!(fit_within((0, 0), Some(10), None), (0, 0));
    }

    #[test]
    fn test_resize_raster_basic() {
        let resized = resize_raster(&gradient(100, 50), 50, 25, FilterType::Bilinear).unwrap();
        assert_eq!(resized.dimensions(), (50, 25));
        assert_eq!(resized.byte_len(), 50 * 25 * 3);
    }

    #[test]
    fn test_resize_raster_keeps_16bit() {
        let raster = RasterBuffer::from_rgb16(8, 8, vec![40000; 8 * 8 * 3]).unwrap();
        let resized = resize_raster(&raster, 4, 4, FilterType::Lanczos3).unwrap();
        assert!(matches!(resized.samples(), Samples::Sixteen(_)));
    }

    #[test]
    fn test_resize_raster_zero_is_error() {
        let img = gradient(10, 10);
        assert!(resize_raster(&img, 0, 5, FilterType::Nearest).is_err());
    }

    #[test]
    fn test_all_filter_types() {
        let img = gradient(100, 50);
        let filters = [
            FilterType::Nearest,
            FilterType::Bilinear,
            FilterType::CatmullRom,
            FilterType::Lanczos3,
        ];
        for filter in filters {
            assert_eq!(resize_raster(&img, 50, 25, filter).unwrap().dimensions(), (50, 25));
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: the fitted size never exceeds the source or the requested box.
        #[test]
        fn prop_fit_is_bounded(
            sw in 1u32..=8000,
            sh in 1u32..=8000,
            w in proptest::option::of(1u32..=9000),
            h in proptest::option::of(1u32..=9000),
        ) {
            let (ow, oh) = fit_within((sw, sh), w, h);
            prop_assert!(ow >= 1 && oh >= 1);
            prop_assert!(ow <= sw && oh <= sh);
            if (ow, oh) != (sw, sh) {
                if let Some(w) = w { prop_assert!(ow <= w); }
                if let Some(h) = h { prop_assert!(oh <= h); }
            }
        }

        /// Property: a width-only request is honored exactly when it shrinks.
        #[test]
        fn prop_width_only_is_exact(sw in 2u32..=8000, sh in 1u32..=8000, w in 1u32..=8000) {
            prop_assume!(w < sw);
            let (ow, oh) = fit_within((sw, sh), Some(w), None);
            prop_assert_eq!(ow, w);
            prop_assert!(oh <= sh);
        }
    }
}
