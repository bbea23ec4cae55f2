//! WebP encoding through libwebp.

use ::webp::{Encoder, WebPConfig};

use super::ppm::to_rgb8_samples;
use super::{EncodeError, OutputFormat, WebpSettings};
use crate::decode::{narrow_sample, RasterBuffer, Samples};

/// VP8X feature flags.
const FLAG_ICC: u8 = 0x20;
const FLAG_ALPHA: u8 = 0x10;

/// Encode a raster as lossy or lossless WebP.
///
/// Rasters with alpha keep it; everything else is written as RGB. With
/// `icc`, the file is rewritten into the extended format with an `ICCP`
/// chunk.
pub fn encode_webp(
    raster: &RasterBuffer,
    settings: &WebpSettings,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, EncodeError> {
    let (w, h) = raster.dimensions();
    let rgba = has_alpha(raster).then(|| to_rgba8(raster));
    let rgb = if rgba.is_none() {
        to_rgb8_samples(raster)
    } else {
        Vec::new()
    };
    let encoder = match &rgba {
        Some(px) => Encoder::from_rgba(px, w, h),
        None => Encoder::from_rgb(&rgb, w, h),
    };

    let mut config =
        WebPConfig::new().map_err(|()| EncodeError::failed(OutputFormat::Webp, "config init"))?;
    config.lossless = i32::from(settings.lossless);
    config.quality = if settings.lossless {
        // Lossless effort scale; the quality knob is ignored.
        (settings.method as f32 / 6.0) * 100.0
    } else {
        settings.quality as f32
    };
    config.method = settings.method as i32;

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| EncodeError::failed(OutputFormat::Webp, format!("{e:?}")))?;
    match icc {
        Some(icc) => embed_icc(&memory, icc, (w, h), has_alpha(raster)),
        None => Ok(memory.to_vec()),
    }
}

/// Insert an `ICCP` chunk, adding a `VP8X` header first when the encoder
/// wrote a simple-format file.
fn embed_icc(
    webp: &[u8],
    icc: &[u8],
    (width, height): (u32, u32),
    alpha: bool,
) -> Result<Vec<u8>, EncodeError> {
    let malformed = || EncodeError::failed(OutputFormat::Webp, "output is not a RIFF WebP file");
    if webp.len() < 12 || &webp[0..4] != b"RIFF" || &webp[8..12] != b"WEBP" {
        return Err(malformed());
    }
    let body = &webp[12..];

    let mut chunks = Vec::with_capacity(body.len() + icc.len() + 32);
    let rest = if body.starts_with(b"VP8X") {
        let header = body.get(..18).ok_or_else(malformed)?;
        chunks.extend_from_slice(header);
        chunks[8] |= FLAG_ICC;
        &body[18..]
    } else {
        let mut vp8x = [0u8; 10];
        vp8x[0] = FLAG_ICC | if alpha { FLAG_ALPHA } else { 0 };
        vp8x[4..7].copy_from_slice(&(width - 1).to_le_bytes()[..3]);
        vp8x[7..10].copy_from_slice(&(height - 1).to_le_bytes()[..3]);
        push_chunk(&mut chunks, b"VP8X", &vp8x);
        body
    };
    push_chunk(&mut chunks, b"ICCP", icc);
    chunks.extend_from_slice(rest);

    let mut out = Vec::with_capacity(chunks.len() + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(chunks.len() as u32 + 4).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&chunks);
    Ok(out)
}

/// Append a RIFF chunk, padded to an even length.
fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

fn has_alpha(raster: &RasterBuffer) -> bool {
    raster.channels() == 2 || raster.channels() == 4
}

fn to_rgba8(raster: &RasterBuffer) -> Vec<u8> {
    let channels = raster.channels() as usize;
    let eight: Vec<u8> = match raster.samples() {
        Samples::Eight(v) => v.clone(),
        Samples::Sixteen(v) => v.iter().map(|&s| narrow_sample(s)).collect(),
    };
    eight
        .chunks_exact(channels)
        .flat_map(|px| match channels {
            2 => [px[0], px[0], px[0], px[1]],
            _ => [px[0], px[1], px[2], px[3]],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RasterBuffer {
        let pixels = (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                [(x * 255 / width) as u8, (y * 255 / height) as u8, ((x ^ y) & 0xFF) as u8]
            })
            .collect();
        RasterBuffer::from_rgb8(width, height, pixels).unwrap()
    }

    fn settings(quality: u8, lossless: bool) -> WebpSettings {
        WebpSettings {
            quality,
            lossless,
            method: 4,
        }
    }

    #[test]
    fn test_encode_webp_header() {
        let bytes = encode_webp(&gradient(32, 24), &settings(80, false), None).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_lossless_round_trip() {
        let raster = gradient(16, 16);
        let bytes = encode_webp(&raster, &settings(80, true), None).unwrap();
        let back = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(back.into_raw(), to_rgb8_samples(&raster));
    }

    #[test]
    fn test_alpha_is_kept() {
        let pixels = vec![255, 0, 0, 128, 0, 255, 0, 255];
        let raster = RasterBuffer::new(2, 1, 4, Samples::Eight(pixels)).unwrap();
        let bytes = encode_webp(&raster, &settings(90, true), None).unwrap();
        let back = image::load_from_memory(&bytes).unwrap();
        assert!(back.color().has_alpha());
    }

    fn le_u32(b: &[u8]) -> u32 {
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    #[test]
    fn test_icc_profile_embedded_in_extended_file() {
        let profile = vec![0x5A; 301];
        for lossless in [false, true] {
            let bytes = encode_webp(&gradient(20, 10), &settings(80, lossless), Some(&profile))
                .unwrap();
            assert_eq!(&bytes[12..16], b"VP8X");
            assert_eq!(bytes[20] & FLAG_ICC, FLAG_ICC);
            assert_eq!(le_u32(&bytes[4..8]) as usize + 8, bytes.len());

            let at = bytes.windows(4).position(|w| w == b"ICCP").unwrap();
            assert_eq!(le_u32(&bytes[at + 4..at + 8]) as usize, profile.len());
            assert_eq!(&bytes[at + 8..at + 8 + profile.len()], &profile[..]);

            let back = image::load_from_memory(&bytes).unwrap();
            assert_eq!((back.width(), back.height()), (20, 10));
        }
    }

    #[test]
    fn test_icc_profile_with_lossy_alpha() {
        let pixels = (0..8 * 8).flat_map(|i| [i as u8, 40, 90, 128]).collect();
        let raster = RasterBuffer::new(8, 8, 4, Samples::Eight(pixels)).unwrap();
        let profile = vec![1u8; 64];
        let bytes = encode_webp(&raster, &settings(80, false), Some(&profile)).unwrap();
        assert_eq!(bytes[20] & (FLAG_ICC | FLAG_ALPHA), FLAG_ICC | FLAG_ALPHA);
        let back = image::load_from_memory(&bytes).unwrap();
        assert!(back.color().has_alpha());
    }
}
