//! Output color space conversion.
//!
//! Decoded rasters are treated as sRGB/BT.709 primaries with the sRGB
//! transfer curve. Wide-gamut targets re-express the same colors in the
//! target primaries, so saturated colors come out less saturated in the raw
//! numbers; encoders embed the matching profile from [`icc_profile`].

use moxcms::ColorProfile;

use super::{ColorSpace, EncodeError, OutputFormat};
use crate::decode::{DecodeError, RasterBuffer, Samples};

/// Linear BT.709 to linear BT.2020 (ITU-R BT.2087).
const BT709_TO_BT2020: [[f32; 3]; 3] = [
    [0.6274, 0.3293, 0.0433],
    [0.0691, 0.9195, 0.0114],
    [0.0164, 0.0880, 0.8956],
];

/// Linear BT.709 to linear Display P3 (D65).
const BT709_TO_P3: [[f32; 3]; 3] = [
    [0.8225, 0.1774, 0.0001],
    [0.0332, 0.9669, -0.0001],
    [0.0171, 0.0724, 0.9105],
];

fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

/// BT.2020 OETF (12-bit constants, identical shape to BT.709).
fn linear_to_bt2020(v: f32) -> f32 {
    const ALPHA: f32 = 1.099_296_8;
    const BETA: f32 = 0.018_053_97;
    if v < BETA {
        4.5 * v
    } else {
        ALPHA * v.powf(0.45) - (ALPHA - 1.0)
    }
}

/// Convert `raster` into `space`.
///
/// Returns `None` when the pixels need no change: native or sRGB output,
/// CMYK (separated later by the encoder) and grayscale rasters.
pub fn convert_color_space(
    raster: &RasterBuffer,
    space: ColorSpace,
) -> Result<Option<RasterBuffer>, DecodeError> {
    let (matrix, encode): ([[f32; 3]; 3], fn(f32) -> f32) = match space {
        ColorSpace::Native | ColorSpace::Srgb | ColorSpace::Cmyk => return Ok(None),
        ColorSpace::Rec2020 => (BT709_TO_BT2020, linear_to_bt2020),
        ColorSpace::DisplayP3 => (BT709_TO_P3, linear_to_srgb),
    };
    let channels = raster.channels() as usize;
    if channels < 3 {
        return Ok(None);
    }

    let samples = match raster.samples() {
        Samples::Eight(v) => {
            let decode: Vec<f32> = (0..=255u16).map(|i| srgb_to_linear(i as f32 / 255.0)).collect();
            let mut out = v.clone();
            for px in out.chunks_exact_mut(channels) {
                let rgb = [decode[px[0] as usize], decode[px[1] as usize], decode[px[2] as usize]];
                for (c, row) in matrix.iter().enumerate() {
                    let lin = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
                    px[c] = (encode(lin.clamp(0.0, 1.0)) * 255.0).round() as u8;
                }
            }
            Samples::Eight(out)
        }
        Samples::Sixteen(v) => {
            let decode: Vec<f32> = (0..=u16::MAX)
                .map(|i| srgb_to_linear(i as f32 / 65535.0))
                .collect();
            let mut out = v.clone();
            for px in out.chunks_exact_mut(channels) {
                let rgb = [decode[px[0] as usize], decode[px[1] as usize], decode[px[2] as usize]];
                for (c, row) in matrix.iter().enumerate() {
                    let lin = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
                    px[c] = (encode(lin.clamp(0.0, 1.0)) * 65535.0).round() as u16;
                }
            }
            Samples::Sixteen(out)
        }
    };

    RasterBuffer::new(raster.width(), raster.height(), raster.channels(), samples).map(Some)
}

/// ICC profile for pixels converted into `space`.
///
/// Only the wide-gamut targets are tagged; sRGB and native output follow
/// the untagged-means-sRGB convention and naive CMYK has no profile.
pub fn icc_profile(
    space: ColorSpace,
    format: OutputFormat,
) -> Result<Option<Vec<u8>>, EncodeError> {
    let profile = match space {
        ColorSpace::Rec2020 => ColorProfile::new_bt2020(),
        ColorSpace::DisplayP3 => ColorProfile::new_display_p3(),
        ColorSpace::Native | ColorSpace::Srgb | ColorSpace::Cmyk => return Ok(None),
    };
    profile
        .encode()
        .map(Some)
        .map_err(|e| EncodeError::failed(format, format!("ICC profile: {e:?}")))
}

/// Naive RGB to CMYK separation for interleaved 8-bit RGB.
pub fn rgb_to_cmyk(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        let max = px[0].max(px[1]).max(px[2]);
        if max == 0 {
            out.extend_from_slice(&[0, 0, 0, 255]);
            continue;
        }
        let k = 255 - max;
        let m = max as u32;
        for &v in px {
            out.push(((m - v as u32) * 255 / m) as u8);
        }
        out.push(k);
    }
    out
}
