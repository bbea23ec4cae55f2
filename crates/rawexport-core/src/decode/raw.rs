//! Default [`RawDecoder`] backed by `rawloader`.
//!
//! Pipeline: unpack, black/white normalisation, white balance, 2x2
//! super-pixel demosaic, auto-brightness, gamma. The cancel flag is checked
//! between each stage. Sources `rawloader` cannot read are retried as
//! ordinary bitmaps through the `image` crate.

use std::fs;
use std::io::Cursor;

use rawloader::{RawImage, RawImageData};

use super::bitmap::{decode_bitmap, is_bitmap, read_orientation};
use super::metadata::{read_lens_info, read_metadata};
use super::resize::resize_raster;
use super::source::{CancelFlag, DecodeParams, RawDecoder, SourceInput};
use super::thumbnail::extract_embedded_jpeg;
use super::types::narrow_sample;
use super::{
    ColorInfo, DecodeError, EmbeddedThumbnail, FilterType, ImageMetadata, ImageSizes, LensInfo,
    RasterBuffer, Samples,
};

/// Size of the gamma lookup table (one entry per 16-bit input level).
const LUT_SIZE: usize = 1 << 16;

/// Fraction of pixels allowed to clip when auto-brightness picks a white point.
const AUTO_BRIGHT_CLIP: f64 = 0.01;

const HISTOGRAM_BINS: usize = 0x2000;

/// Loaded bytes, kept in memory until the session closes or reloads.
#[derive(Debug)]
pub struct LoadedSource {
    bytes: Vec<u8>,
}

impl LoadedSource {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decoder for camera RAW files with a bitmap fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderDecoder;

impl RawloaderDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl RawDecoder for RawloaderDecoder {
    type Handle = LoadedSource;

    fn load_source(&self, source: SourceInput) -> Result<LoadedSource, DecodeError> {
        let bytes = match source {
            SourceInput::Path(path) => {
                fs::read(&path)
                    .map_err(|e| DecodeError::IoError(format!("{}: {e}", path.display())))?
            }
            SourceInput::Bytes(bytes) => bytes,
        };
        if bytes.is_empty() {
            return Err(DecodeError::InvalidFormat);
        }
        Ok(LoadedSource { bytes })
    }

    fn decode_to_raster(
        &self,
        handle: &LoadedSource,
        params: &DecodeParams,
        cancel: &CancelFlag,
    ) -> Result<RasterBuffer, DecodeError> {
        cancel.check()?;
        let raw = match unpack(&handle.bytes)? {
            Unpacked::Raw(raw) => raw,
            Unpacked::Bitmap => {
                let raster = decode_bitmap(&handle.bytes)?;
                return Ok(with_output_bits(raster, params.output_bits));
            }
        };
        log::debug!(
            "unpacked {} {}: {}x{} cpp={}",
            raw.clean_make,
            raw.clean_model,
            raw.width,
            raw.height,
            raw.cpp
        );

        cancel.check()?;
        let linear = normalise(&raw)?;

        cancel.check()?;
        let mul = white_balance(&raw, params);

        cancel.check()?;
        let rgb = demosaic(&raw, &linear, mul)?;

        cancel.check()?;
        let scale = if params.no_auto_bright {
            params.bright
        } else {
            params.bright * auto_bright_scale(&rgb.pixels)
        };
        let lut = gamma_lut(params.gamma.0, params.gamma.1);
        let samples = apply_tone(&rgb.pixels, scale, &lut, params.output_bits);
        let raster = RasterBuffer::new(rgb.width, rgb.height, 3, samples)?;

        if params.half_size {
            return Ok(raster);
        }
        cancel.check()?;
        let (w, h) = (rgb.width * 2, rgb.height * 2);
        resize_raster(&raster, w, h, FilterType::Bilinear)
    }

    fn embedded_thumbnail(&self, handle: &LoadedSource) -> Result<EmbeddedThumbnail, DecodeError> {
        extract_embedded_jpeg(&handle.bytes).map(EmbeddedThumbnail::Jpeg)
    }

    fn lens_info(&self, handle: &LoadedSource) -> Result<LensInfo, DecodeError> {
        Ok(read_lens_info(&handle.bytes))
    }

    fn color_info(&self, handle: &LoadedSource) -> Result<ColorInfo, DecodeError> {
        match unpack(&handle.bytes)? {
            Unpacked::Raw(raw) => Ok(ColorInfo {
                components: raw.cpp as u32,
                cfa_pattern: if raw.cpp == 1 {
                    raw.cfa.name.clone()
                } else {
                    String::new()
                },
                black_levels: raw.blacklevels,
                white_levels: raw.whitelevels,
                camera_multipliers: raw.wb_coeffs,
                xyz_to_camera: raw.xyz_to_cam,
            }),
            Unpacked::Bitmap => Err(DecodeError::UnsupportedCamera(
                "bitmap sources have no sensor data".to_string(),
            )),
        }
    }

    fn image_sizes(
        &self,
        handle: &LoadedSource,
        params: &DecodeParams,
    ) -> Result<ImageSizes, DecodeError> {
        match unpack(&handle.bytes)? {
            Unpacked::Raw(raw) => Ok(raw_sizes(raw.width, raw.height, raw.crops, params.half_size)),
            Unpacked::Bitmap => bitmap_sizes(&handle.bytes),
        }
    }

    fn metadata(&self, handle: &LoadedSource) -> Result<ImageMetadata, DecodeError> {
        let mut meta = read_metadata(&handle.bytes);
        if meta.width.is_none() || meta.height.is_none() {
            if let Ok(size) = image::ImageReader::new(Cursor::new(&handle.bytes))
                .with_guessed_format()
                .map_err(|e| e.to_string())
                .and_then(|r| r.into_dimensions().map_err(|e| e.to_string()))
            {
                meta.width = Some(size.0);
                meta.height = Some(size.1);
            }
        }
        Ok(meta)
    }
}

enum Unpacked {
    Raw(Box<RawImage>),
    Bitmap,
}

/// Unpack sensor data, or report that the bytes are an ordinary bitmap.
fn unpack(bytes: &[u8]) -> Result<Unpacked, DecodeError> {
    match rawloader::decode(&mut Cursor::new(bytes)) {
        Ok(raw) => Ok(Unpacked::Raw(Box::new(raw))),
        Err(raw_err) if is_bitmap(bytes) => {
            log::debug!("not a camera RAW ({raw_err}), treating as bitmap");
            Ok(Unpacked::Bitmap)
        }
        Err(raw_err) => Err(DecodeError::UnsupportedCamera(raw_err.to_string())),
    }
}

/// `crops` is top, right, bottom, left. The output matches `demosaic`: half
/// the visible area, doubled again unless `half_size` is set.
fn raw_sizes(
    raw_width: usize,
    raw_height: usize,
    crops: [usize; 4],
    half_size: bool,
) -> ImageSizes {
    let [top, right, bottom, left] = crops;
    let width = raw_width.saturating_sub(left + right);
    let height = raw_height.saturating_sub(top + bottom);
    let scale = if half_size { 1 } else { 2 };
    ImageSizes {
        raw_width: raw_width as u32,
        raw_height: raw_height as u32,
        top_margin: top as u32,
        left_margin: left as u32,
        width: width as u32,
        height: height as u32,
        output_width: (width / 2 * scale) as u32,
        output_height: (height / 2 * scale) as u32,
    }
}

/// Bitmaps have no margins; the output is the stored size after orientation.
fn bitmap_sizes(bytes: &[u8]) -> Result<ImageSizes, DecodeError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    let (output_width, output_height) = if read_orientation(bytes).swaps_dimensions() {
        (height, width)
    } else {
        (width, height)
    };
    Ok(ImageSizes {
        raw_width: width,
        raw_height: height,
        top_margin: 0,
        left_margin: 0,
        width,
        height,
        output_width,
        output_height,
    })
}

/// Sensor data scaled to 0.0..=1.0 between black and white levels.
fn normalise(raw: &RawImage) -> Result<Vec<f32>, DecodeError> {
    let expected = raw.width * raw.height * raw.cpp;
    let len = match &raw.data {
        RawImageData::Integer(v) => v.len(),
        RawImageData::Float(v) => v.len(),
    };
    if len != expected {
        return Err(DecodeError::BufferMismatch {
            expected,
            actual: len,
        });
    }

    let channel_of = |idx: usize| -> usize {
        if raw.cpp == 1 {
            let (row, col) = (idx / raw.width, idx % raw.width);
            raw.cfa.color_at(row, col).min(3)
        } else {
            idx % raw.cpp
        }
    };

    let out = match &raw.data {
        RawImageData::Integer(values) => values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let c = channel_of(i);
                let black = raw.blacklevels[c] as f32;
                let range = (raw.whitelevels[c] as f32 - black).max(1.0);
                ((v as f32 - black) / range).clamp(0.0, 1.0)
            })
            .collect(),
        RawImageData::Float(values) => values.iter().map(|v| v.clamp(0.0, 1.0)).collect(),
    };
    Ok(out)
}

/// R, G, B multipliers normalised to green.
fn white_balance(raw: &RawImage, params: &DecodeParams) -> [f32; 3] {
    let coeffs = match params.user_mul {
        Some(mul) => mul,
        None if params.use_camera_wb => raw.wb_coeffs,
        None => return [1.0, 1.0, 1.0],
    };
    let green = coeffs[1];
    if !(green.is_finite() && green > 0.0) || coeffs[..3].iter().any(|c| !c.is_finite()) {
        log::warn!("unusable white balance coefficients {coeffs:?}, using unity");
        return [1.0, 1.0, 1.0];
    }
    [coeffs[0] / green, 1.0, coeffs[2] / green]
}

struct LinearRgb {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

/// Collapse each 2x2 CFA block inside the crop area into one RGB pixel.
///
/// Three-component sensors are passed through at full resolution after
/// cropping, then halved so both paths produce the same geometry.
fn demosaic(raw: &RawImage, linear: &[f32], mul: [f32; 3]) -> Result<LinearRgb, DecodeError> {
    let [top, right, bottom, left] = raw.crops;
    let crop_w = raw.width.saturating_sub(left + right);
    let crop_h = raw.height.saturating_sub(top + bottom);
    let (out_w, out_h) = (crop_w / 2, crop_h / 2);
    if out_w == 0 || out_h == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: out_w as u32,
            height: out_h as u32,
        });
    }

    let mut pixels = Vec::with_capacity(out_w * out_h * 3);
    for by in 0..out_h {
        for bx in 0..out_w {
            let mut sum = [0.0f32; 3];
            let mut count = [0u32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let row = top + by * 2 + dy;
                    let col = left + bx * 2 + dx;
                    if raw.cpp == 1 {
                        let c = match raw.cfa.color_at(row, col) {
                            0 => 0,
                            2 => 2,
                            _ => 1,
                        };
                        sum[c] += linear[row * raw.width + col];
                        count[c] += 1;
                    } else {
                        let base = (row * raw.width + col) * raw.cpp;
                        for (c, s) in sum.iter_mut().enumerate() {
                            *s += linear[base + c.min(raw.cpp - 1)];
                            count[c] += 1;
                        }
                    }
                }
            }
            for c in 0..3 {
                let avg = if count[c] > 0 { sum[c] / count[c] as f32 } else { 0.0 };
                pixels.push(avg * mul[c]);
            }
        }
    }

    Ok(LinearRgb {
        width: out_w as u32,
        height: out_h as u32,
        pixels,
    })
}

/// Scale that maps the brightest non-clipped level to 1.0.
fn auto_bright_scale(pixels: &[f32]) -> f32 {
    let mut histogram = vec![0u64; HISTOGRAM_BINS];
    for px in pixels.chunks_exact(3) {
        let peak = px[0].max(px[1]).max(px[2]).clamp(0.0, 1.0);
        let bin = ((peak * (HISTOGRAM_BINS - 1) as f32) as usize).min(HISTOGRAM_BINS - 1);
        histogram[bin] += 1;
    }

    let total = (pixels.len() / 3) as f64;
    let allowed = (total * AUTO_BRIGHT_CLIP) as u64;
    let mut above = 0u64;
    for bin in (1..HISTOGRAM_BINS).rev() {
        above += histogram[bin];
        if above > allowed {
            return (HISTOGRAM_BINS - 1) as f32 / bin as f32;
        }
    }
    1.0
}

/// Gamma curve with a linear toe, sampled at every 16-bit level.
///
/// The toe joins the power segment with matching value and slope; for
/// `(0.45, 4.5)` this is the BT.709 transfer function.
pub(crate) fn gamma_lut(power: f32, slope: f32) -> Vec<u16> {
    let p = power as f64;
    let ts = slope as f64;
    let (x0, a) = if ts > 1.0 && p < 1.0 {
        let f = |x: f64| ts * x.powf(1.0 - p) / p - ts * x * (1.0 / p - 1.0) - 1.0;
        let (mut lo, mut hi) = (0.0f64, 1.0f64);
        for _ in 0..60 {
            let mid = (lo + hi) / 2.0;
            if f(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let x0 = (lo + hi) / 2.0;
        (x0, ts * x0 * (1.0 / p - 1.0))
    } else {
        (0.0, 0.0)
    };

    (0..LUT_SIZE)
        .map(|i| {
            let x = i as f64 / (LUT_SIZE - 1) as f64;
            let y = if x < x0 {
                ts * x
            } else {
                (1.0 + a) * x.powf(p) - a
            };
            (y.clamp(0.0, 1.0) * 65535.0).round() as u16
        })
        .collect()
}

fn apply_tone(pixels: &[f32], scale: f32, lut: &[u16], output_bits: u8) -> Samples {
    let level = |v: f32| -> u16 {
        let idx = ((v * scale).clamp(0.0, 1.0) * (LUT_SIZE - 1) as f32).round() as usize;
        lut[idx.min(LUT_SIZE - 1)]
    };
    if output_bits == 8 {
        Samples::Eight(pixels.iter().map(|&v| narrow_sample(level(v))).collect())
    } else {
        Samples::Sixteen(pixels.iter().map(|&v| level(v)).collect())
    }
}

/// Widen or narrow a bitmap-decoded raster to the requested sample depth.
fn with_output_bits(raster: RasterBuffer, output_bits: u8) -> RasterBuffer {
    let (w, h, c) = (raster.width(), raster.height(), raster.channels());
    let converted = match (raster.samples(), output_bits) {
        (Samples::Eight(v), 16) => {
            Some(Samples::Sixteen(v.iter().map(|&s| s as u16 * 257).collect()))
        }
        (Samples::Sixteen(v), 8) => {
            Some(Samples::Eight(v.iter().map(|&s| narrow_sample(s)).collect()))
        }
        _ => None,
    };
    match converted {
        Some(samples) => RasterBuffer::new(w, h, c, samples).unwrap_or(raster),
        None => raster,
    }
}
