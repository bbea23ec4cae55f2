//! AVIF encoding through the `image` crate's rav1e-backed encoder.

use image::codecs::avif::AvifEncoder;
use image::{ExtendedColorType, ImageEncoder};

use super::ppm::to_rgb8_samples;
use super::{AvifSettings, EncodeError, OutputFormat};
use crate::decode::{narrow_sample, RasterBuffer, Samples};

/// Encode a raster as 8-bit AVIF.
///
/// `lossless` is approximated with quality 100; the encoder has no true
/// lossless mode. An `icc` profile is attached when the encoder accepts
/// one; otherwise the file goes out untagged with a warning.
pub fn encode_avif(
    raster: &RasterBuffer,
    settings: &AvifSettings,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, EncodeError> {
    let (w, h) = raster.dimensions();
    let mut bytes = Vec::new();
    let mut encoder = AvifEncoder::new_with_speed_quality(
        &mut bytes,
        settings.speed.clamp(1, 10),
        settings.quality.clamp(1, 100),
    );
    if let Some(icc) = icc {
        if let Err(e) = encoder.set_icc_profile(icc.to_vec()) {
            log::warn!("AVIF written without its ICC profile: {e}");
        }
    }

    let result = if raster.channels() == 4 {
        encoder.write_image(&to_rgba8_samples(raster), w, h, ExtendedColorType::Rgba8)
    } else {
        encoder.write_image(&to_rgb8_samples(raster), w, h, ExtendedColorType::Rgb8)
    };
    result.map_err(|e| EncodeError::failed(OutputFormat::Avif, e))?;
    Ok(bytes)
}

/// Interleaved 8-bit RGBA from a four-channel raster.
fn to_rgba8_samples(raster: &RasterBuffer) -> Vec<u8> {
    match raster.samples() {
        Samples::Eight(v) => v.clone(),
        Samples::Sixteen(v) => v.iter().map(|&s| narrow_sample(s)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_avif_brand() {
        let pixels = (0..16 * 16).flat_map(|i| [i as u8, (i * 3) as u8, 90]).collect();
        let raster = RasterBuffer::from_rgb8(16, 16, pixels).unwrap();
        let settings = AvifSettings {
            quality: 60,
            lossless: false,
            speed: 10,
        };
        let bytes = encode_avif(&raster, &settings, None).unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");
        assert!(bytes.windows(4).any(|w| w == b"avif"));
    }

    #[test]
    fn test_16bit_rgba_narrows_like_every_other_format() {
        let raster = RasterBuffer::new(
            2,
            1,
            4,
            Samples::Sixteen(vec![32768, 257, 65535, 0, 256, 65280, 1000, 65535]),
        )
        .unwrap();
        // Shifting would give 128 and 255 for the first and sixth samples.
        assert_eq!(to_rgba8_samples(&raster), vec![127, 1, 255, 0, 0, 254, 3, 255]);
        assert_eq!(to_rgb8_samples(&raster), vec![127, 1, 255, 0, 0, 254]);
    }
}
