//! Binary PPM (P6) output: 8-bit RGB, no compression.

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder};

use super::{EncodeError, OutputFormat};
use crate::decode::{narrow_sample, RasterBuffer, Samples};

/// Flatten any raster to interleaved 8-bit RGB.
///
/// 16-bit samples are rescaled with `floor(v * 255 / 65535)`. Gray is
/// replicated into all three channels; alpha is dropped. The input raster is
/// never modified.
pub fn to_rgb8_samples(raster: &RasterBuffer) -> Vec<u8> {
    let channels = raster.channels() as usize;
    let mut out = Vec::with_capacity(raster.pixel_count() as usize * 3);

    let mut push_pixel = |px: [u8; 4]| {
        if channels < 3 {
            out.extend_from_slice(&[px[0], px[0], px[0]]);
        } else {
            out.extend_from_slice(&px[..3]);
        }
    };

    match raster.samples() {
        Samples::Eight(v) => {
            for px in v.chunks_exact(channels) {
                let mut p = [0u8; 4];
                p[..channels].copy_from_slice(px);
                push_pixel(p);
            }
        }
        Samples::Sixteen(v) => {
            for px in v.chunks_exact(channels) {
                let mut p = [0u8; 4];
                for (dst, &src) in p.iter_mut().zip(px) {
                    *dst = narrow_sample(src);
                }
                push_pixel(p);
            }
        }
    }
    out
}

/// Encode a raster as binary PPM at its own size.
pub fn encode_ppm(raster: &RasterBuffer) -> Result<Vec<u8>, EncodeError> {
    let rgb = to_rgb8_samples(raster);
    let mut bytes = Vec::with_capacity(rgb.len() + 32);
    PnmEncoder::new(&mut bytes)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Binary))
        .write_image(&rgb, raster.width(), raster.height(), ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::failed(OutputFormat::Ppm, e))?;
    Ok(bytes)
}
