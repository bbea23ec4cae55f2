//! PNG encoding. Lossless; the compression level only trades time for size.

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use super::{EncodeError, OutputFormat, PngSettings};
use crate::decode::{RasterBuffer, Samples};

/// Every zlib level maps to its own deflate level; 0 stores uncompressed.
fn compression_for(level: u8) -> CompressionType {
    CompressionType::Level(level.min(9))
}

/// Encode a raster as PNG, keeping its channel count and bit depth.
///
/// `icc` goes into an `iCCP` chunk.
pub fn encode_png(
    raster: &RasterBuffer,
    settings: &PngSettings,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, EncodeError> {
    let filter = if settings.compression_level == 0 {
        PngFilter::NoFilter
    } else {
        PngFilter::Adaptive
    };
    let (w, h) = raster.dimensions();
    let mut bytes = Vec::new();
    let mut encoder = PngEncoder::new_with_quality(
        &mut bytes,
        compression_for(settings.compression_level),
        filter,
    );
    if let Some(icc) = icc {
        encoder
            .set_icc_profile(icc.to_vec())
            .map_err(|e| EncodeError::failed(OutputFormat::Png, e))?;
    }

    let result = match raster.samples() {
        Samples::Eight(v) => encoder.write_image(v, w, h, color_type(raster.channels(), 8)),
        Samples::Sixteen(v) => {
            // The encoder expects native-endian sample bytes.
            let raw: Vec<u8> = v.iter().flat_map(|s| s.to_ne_bytes()).collect();
            encoder.write_image(&raw, w, h, color_type(raster.channels(), 16))
        }
    };
    result.map_err(|e| EncodeError::failed(OutputFormat::Png, e))?;
    Ok(bytes)
}

fn color_type(channels: u8, bits: u8) -> ExtendedColorType {
    match (channels, bits) {
        (1, 8) => ExtendedColorType::L8,
        (2, 8) => ExtendedColorType::La8,
        (3, 8) => ExtendedColorType::Rgb8,
        (_, 8) => ExtendedColorType::Rgba8,
        (1, _) => ExtendedColorType::L16,
        (2, _) => ExtendedColorType::La16,
        (3, _) => ExtendedColorType::Rgb16,
        _ => ExtendedColorType::Rgba16,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(level: u8) -> PngSettings {
        PngSettings {
            compression_level: level,
            interlaced: false,
        }
    }

    #[test]
    fn test_png_is_lossless() {
        let pixels: Vec<u8> = (0..20 * 10 * 3).map(|i| (i * 7 % 251) as u8).collect();
        let raster = RasterBuffer::from_rgb8(20, 10, pixels.clone()).unwrap();
        let bytes = encode_png(&raster, &settings(6), None).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let back = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(back.into_raw(), pixels);
    }

    #[test]
    fn test_png_keeps_16_bits() {
        let raster = RasterBuffer::from_rgb16(3, 2, (0..18).map(|v| v * 3000).collect()).unwrap();
        let bytes = encode_png(&raster, &settings(9), None).unwrap();
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!(back.color(), image::ColorType::Rgb16);
        let decoded = RasterBuffer::from_dynamic_image(back).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn test_every_level_encodes() {
        let raster = RasterBuffer::from_rgb8(8, 8, vec![90; 192]).unwrap();
        for level in 0..=9 {
            assert!(encode_png(&raster, &settings(level), None).is_ok(), "level {level}");
        }
    }

    #[test]
    fn test_level_mapping() {
        for level in 0..=9 {
            assert!(matches!(compression_for(level), CompressionType::Level(l) if l == level));
        }
    }

    #[test]
    fn test_higher_levels_never_grow_output() {
        let pixels: Vec<u8> = (0..64 * 48)
            .flat_map(|i| {
                let (x, y) = (i % 64, i / 64);
                [(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8]
            })
            .collect();
        let raster = RasterBuffer::from_rgb8(64, 48, pixels).unwrap();
        let sizes: Vec<usize> = (0..=9)
            .map(|level| encode_png(&raster, &settings(level), None).unwrap().len())
            .collect();
        assert!(sizes[0] > sizes[1], "{sizes:?}");
        for pair in sizes.windows(2) {
            assert!(pair[1] <= pair[0], "{sizes:?}");
        }
        // No longer three buckets: the low levels do not all coincide.
        assert!(sizes[1] > sizes[9], "{sizes:?}");
    }

    #[test]
    fn test_icc_profile_round_trips() {
        use image::codecs::png::PngDecoder;
        use image::ImageDecoder;

        let raster = RasterBuffer::from_rgb8(4, 4, vec![10; 48]).unwrap();
        let profile = vec![7u8; 300];
        let bytes = encode_png(&raster, &settings(6), Some(&profile)).unwrap();
        let mut decoder = PngDecoder::new(std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(profile));

        let plain = encode_png(&raster, &settings(6), None).unwrap();
        let mut decoder = PngDecoder::new(std::io::Cursor::new(&plain)).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), None);
    }
}
