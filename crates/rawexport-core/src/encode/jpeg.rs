//! JPEG encoding for export.
//!
//! Uses `jpeg-encoder`, which covers progressive scans, optimized Huffman
//! tables and every chroma subsampling mode including 4:2:2. It has no
//! trellis quantisation or scan-order search, so [`DefaultCodec`] does not
//! advertise either.
//!
//! [`DefaultCodec`]: super::DefaultCodec

use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use super::colorspace::rgb_to_cmyk;
use super::ppm::to_rgb8_samples;
use super::{ChromaSubsampling, EncodeError, JpegSettings, OutputFormat};
use crate::decode::RasterBuffer;

/// Encode a prepared raster to JPEG bytes.
///
/// Gray rasters are written as single-channel JPEGs; everything else as RGB
/// (or CMYK when `cmyk` is set). Alpha is dropped. `icc` is written as
/// APP2 segments.
///
/// # Quality Guidelines
///
/// * 90-100: High quality, suitable for archival or further editing
/// * 80-90: Good quality, recommended for most uses
/// * 60-80: Medium quality, acceptable for web/social media
/// * Below 60: Low quality, visible artifacts
pub fn encode_jpeg(
    raster: &RasterBuffer,
    settings: &JpegSettings,
    cmyk: bool,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = raster.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let (data, color) = if cmyk {
        (rgb_to_cmyk(&to_rgb8_samples(raster)), ColorType::Cmyk)
    } else if raster.channels() < 3 {
        let luma = to_rgb8_samples(raster).into_iter().step_by(3).collect();
        (luma, ColorType::Luma)
    } else {
        (to_rgb8_samples(raster), ColorType::Rgb)
    };

    let mut bytes = Vec::new();
    let mut encoder = Encoder::new(&mut bytes, settings.quality.clamp(1, 100));
    encoder.set_progressive(settings.progressive);
    encoder.set_optimized_huffman_tables(settings.optimize_coding);
    encoder.set_sampling_factor(match settings.chroma {
        ChromaSubsampling::Yuv444 => SamplingFactor::F_1_1,
        ChromaSubsampling::Yuv422 => SamplingFactor::F_2_1,
        ChromaSubsampling::Yuv420 => SamplingFactor::F_2_2,
    });
    if let Some(icc) = icc {
        encoder
            .add_icc_profile(icc)
            .map_err(|e| EncodeError::failed(OutputFormat::Jpeg, e))?;
    }
    encoder
        .encode(&data, width as u16, height as u16, color)
        .map_err(|e| EncodeError::failed(OutputFormat::Jpeg, e))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Samples;

    fn settings(quality: u8) -> JpegSettings {
        JpegSettings {
            quality,
            progressive: false,
            chroma: ChromaSubsampling::Yuv420,
            trellis: false,
            optimize_scans: false,
            optimize_coding: true,
        }
    }

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        RasterBuffer::from_rgb8(width, height, pixels).unwrap()
    }

    #[test]
    fn test_encode_jpeg_basic() {
        let jpeg_bytes = encode_jpeg(&gradient(100, 100), &settings(90), false, None).unwrap();

        // Check JPEG magic bytes (SOI marker)
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);

        // Check JPEG ends with EOI marker
        let len = jpeg_bytes.len();
        assert_eq!(&jpeg_bytes[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_decodes_to_same_size() {
        let jpeg_bytes = encode_jpeg(&gradient(120, 45), &settings(80), false, None).unwrap();
        let img = image::load_from_memory(&jpeg_bytes).unwrap();
        assert_eq!((img.width(), img.height()), (120, 45));
    }

    #[test]
    fn test_encode_jpeg_quality_affects_size() {
        let raster = gradient(128, 128);
        let low_q = encode_jpeg(&raster, &settings(20), false, None).unwrap();
        let high_q = encode_jpeg(&raster, &settings(95), false, None).unwrap();
        assert!(high_q.len() > low_q.len());
    }

    #[test]
    fn test_encode_jpeg_progressive() {
        let mut s = settings(85);
        s.progressive = true;
        let jpeg_bytes = encode_jpeg(&gradient(64, 64), &s, false, None).unwrap();
        // SOF2 marks a progressive frame
        assert!(jpeg_bytes.windows(2).any(|w| w == [0xFF, 0xC2]));
    }

    #[test]
    fn test_encode_jpeg_all_subsampling_modes() {
        for chroma in [
            ChromaSubsampling::Yuv444,
            ChromaSubsampling::Yuv422,
            ChromaSubsampling::Yuv420,
        ] {
            let mut s = settings(85);
            s.chroma = chroma;
            let bytes = encode_jpeg(&gradient(33, 17), &s, false, None).unwrap();
            assert!(image::load_from_memory(&bytes).is_ok(), "{chroma:?}");
        }
    }

    #[test]
    fn test_encode_jpeg_16bit_source() {
        let raster = RasterBuffer::from_rgb16(8, 8, vec![40000u16; 8 * 8 * 3]).unwrap();
        let bytes = encode_jpeg(&raster, &settings(90), false, None).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_jpeg_gray() {
        let raster = RasterBuffer::new(10, 10, 1, Samples::Eight(vec![77; 100])).unwrap();
        let bytes = encode_jpeg(&raster, &settings(90), false, None).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(img.color(), image::ColorType::L8);
    }

    #[test]
    fn test_encode_jpeg_cmyk() {
        let bytes = encode_jpeg(&gradient(16, 16), &settings(90), true, None).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_icc_profile_embedded() {
        let profile = vec![0x42; 600];
        let bytes = encode_jpeg(&gradient(16, 16), &settings(90), false, Some(&profile)).unwrap();
        let app2 = bytes
            .windows(14)
            .position(|w| w == b"ICC_PROFILE\0\x01\x01")
            .unwrap();
        assert_eq!(&bytes[app2 + 14..app2 + 14 + profile.len()], &profile[..]);
    }

    #[test]
    fn test_encode_jpeg_small_image() {
        let raster = RasterBuffer::from_rgb8(1, 1, vec![255, 0, 0]).unwrap();
        let jpeg_bytes = encode_jpeg(&raster, &settings(90), false, None).unwrap();
        assert_eq!(&jpeg_bytes[0..2], &[0xFF, 0xD8]);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for generating image dimensions (keep small for speed).
    fn dimensions_strategy() -> impl Strategy<Value = (u32, u32)> {
        (1u32..=40, 1u32..=40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: any valid raster and quality produce a well-formed JPEG.
        #[test]
        fn prop_valid_input_produces_valid_jpeg(
            (width, height) in dimensions_strategy(),
            quality in 1u8..=100,
            seed in any::<u8>(),
        ) {
            let pixels: Vec<u8> = (0..width * height * 3)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
                .collect();
            let raster = RasterBuffer::from_rgb8(width, height, pixels).unwrap();
            let settings = JpegSettings {
                quality,
                progressive: seed % 2 == 0,
                chroma: ChromaSubsampling::Yuv420,
                trellis: false,
                optimize_scans: false,
                optimize_coding: seed % 3 == 0,
            };
            let bytes = encode_jpeg(&raster, &settings, false, None).unwrap();
            prop_assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
            prop_assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
        }
    }
}
