//! TIFF encoding with selectable compression and optional pyramid levels.

use std::io::{Cursor, Seek, Write};

use ::tiff::encoder::colortype::{self, ColorType};
use ::tiff::encoder::compression::{Compression, Deflate, Lzw, Uncompressed};
use ::tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard, TiffValue};
use ::tiff::tags::Tag;
use ::tiff::{TiffError, TiffResult};
use jpeg_encoder::{ColorType as JpegColor, Encoder as JpegEncoder, SamplingFactor};

use super::colorspace::rgb_to_cmyk;
use super::ppm::to_rgb8_samples;
use super::{EncodeError, OutputFormat, TiffCompression, TiffSettings};
use crate::decode::{resize_raster, FilterType, RasterBuffer, Samples};

/// Pyramid levels stop once the longest side is at or below this.
const PYRAMID_MIN_EDGE: u32 = 256;

const TAG_ICC_PROFILE: u16 = 34675;
const COMPRESSION_JPEG: u16 = 7;
const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;

/// Encode a raster as TIFF, keeping 16-bit depth when present.
///
/// With `pyramid` set, successively halved copies follow the full-size image
/// as additional IFDs. CMYK output is always 8-bit, and so is JPEG
/// compression, which stores each level as a single baseline JPEG strip.
pub fn encode_tiff(
    raster: &RasterBuffer,
    settings: &TiffSettings,
    cmyk: bool,
    filter: FilterType,
    icc: Option<&[u8]>,
) -> Result<Vec<u8>, EncodeError> {
    let mut levels = vec![raster.clone()];
    if settings.pyramid {
        let (mut w, mut h) = raster.dimensions();
        while w.max(h) > PYRAMID_MIN_EDGE && w > 1 && h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            levels.push(resize_raster(raster, w, h, filter)?);
        }
        log::debug!("TIFF pyramid with {} levels", levels.len());
    }

    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_failed)?;
    for level in &levels {
        if settings.compression == TiffCompression::Jpeg {
            write_jpeg_level(&mut encoder, level, settings.quality, icc)?;
        } else {
            write_raster(&mut encoder, level, settings.compression, cmyk, icc)?;
        }
    }
    drop(encoder);
    Ok(cursor.into_inner())
}

fn tiff_failed(e: TiffError) -> EncodeError {
    EncodeError::failed(OutputFormat::Tiff, e)
}

fn write_raster<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    raster: &RasterBuffer,
    compression: TiffCompression,
    cmyk: bool,
    icc: Option<&[u8]>,
) -> Result<(), EncodeError> {
    let (w, h) = raster.dimensions();
    let level = Level {
        width: w,
        height: h,
        compression,
        icc,
    };
    if cmyk {
        let data = rgb_to_cmyk(&to_rgb8_samples(raster));
        return level.write::<_, colortype::CMYK8>(encoder, &data);
    }

    match (raster.samples(), raster.channels()) {
        (Samples::Eight(v), 1) => level.write::<_, colortype::Gray8>(encoder, v),
        (Samples::Eight(v), 3) => level.write::<_, colortype::RGB8>(encoder, v),
        (Samples::Eight(v), 4) => level.write::<_, colortype::RGBA8>(encoder, v),
        (Samples::Sixteen(v), 1) => level.write::<_, colortype::Gray16>(encoder, v),
        (Samples::Sixteen(v), 3) => level.write::<_, colortype::RGB16>(encoder, v),
        (Samples::Sixteen(v), 4) => level.write::<_, colortype::RGBA16>(encoder, v),
        (Samples::Eight(v), _) => {
            level.write::<_, colortype::RGBA8>(encoder, &gray_alpha_to_rgba(v))
        }
        (Samples::Sixteen(v), _) => {
            level.write::<_, colortype::RGBA16>(encoder, &gray_alpha_to_rgba(v))
        }
    }
}

fn gray_alpha_to_rgba<T: Copy>(samples: &[T]) -> Vec<T> {
    samples
        .chunks_exact(2)
        .flat_map(|px| [px[0], px[0], px[0], px[1]])
        .collect()
}

/// One uncompressed, LZW or deflate IFD.
struct Level<'a> {
    width: u32,
    height: u32,
    compression: TiffCompression,
    icc: Option<&'a [u8]>,
}

impl Level<'_> {
    fn write<W: Write + Seek, C: ColorType>(
        &self,
        encoder: &mut TiffEncoder<W>,
        data: &[C::Inner],
    ) -> Result<(), EncodeError>
    where
        [C::Inner]: TiffValue,
    {
        match self.compression {
            TiffCompression::None => {
                self.write_with::<_, C, _>(encoder, data, Uncompressed::default())
            }
            TiffCompression::Lzw => self.write_with::<_, C, _>(encoder, data, Lzw::default()),
            TiffCompression::Zip | TiffCompression::Jpeg => {
                self.write_with::<_, C, _>(encoder, data, Deflate::default())
            }
        }
    }

    fn write_with<W: Write + Seek, C: ColorType, D: Compression>(
        &self,
        encoder: &mut TiffEncoder<W>,
        data: &[C::Inner],
        compression: D,
    ) -> Result<(), EncodeError>
    where
        [C::Inner]: TiffValue,
    {
        let mut image = encoder
            .new_image_with_compression::<C, D>(self.width, self.height, compression)
            .map_err(tiff_failed)?;
        if let Some(icc) = self.icc {
            image
                .encoder()
                .write_tag(Tag::Unknown(TAG_ICC_PROFILE), icc)
                .map_err(tiff_failed)?;
        }
        image.write_data(data).map_err(tiff_failed)
    }
}

/// Write one compression-7 IFD whose single strip is a complete JPEG.
///
/// Color levels use photometric RGB, so the JPEG components are stored
/// untransformed and without chroma subsampling. Alpha is dropped.
fn write_jpeg_level<W: Write + Seek>(
    encoder: &mut TiffEncoder<W>,
    raster: &RasterBuffer,
    quality: u8,
    icc: Option<&[u8]>,
) -> Result<(), EncodeError> {
    let (width, height) = raster.dimensions();
    if width > u16::MAX as u32 || height > u16::MAX as u32 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let rgb = to_rgb8_samples(raster);
    let gray = raster.channels() < 3;
    let (data, color, photometric) = if gray {
        let luma = rgb.into_iter().step_by(3).collect();
        (luma, JpegColor::Luma, PHOTOMETRIC_BLACK_IS_ZERO)
    } else {
        (rgb, JpegColor::Ycbcr, PHOTOMETRIC_RGB)
    };

    let mut strip = Vec::new();
    let mut jpeg = JpegEncoder::new(&mut strip, quality.clamp(1, 100));
    jpeg.set_sampling_factor(SamplingFactor::F_1_1);
    jpeg.encode(&data, width as u16, height as u16, color)
        .map_err(|e| EncodeError::failed(OutputFormat::Tiff, e))?;

    let dir = encoder.new_directory().map_err(tiff_failed)?;
    write_jpeg_ifd(dir, (width, height), &strip, photometric, gray, icc).map_err(tiff_failed)
}

fn write_jpeg_ifd<W: Write + Seek>(
    mut dir: DirectoryEncoder<'_, W, TiffKindStandard>,
    (width, height): (u32, u32),
    strip: &[u8],
    photometric: u16,
    gray: bool,
    icc: Option<&[u8]>,
) -> TiffResult<()> {
    let offset = dir.write_data(strip)?;
    let offset = u32::try_from(offset).map_err(|_| TiffError::LimitsExceeded)?;

    let bits: &[u16] = if gray { &[8] } else { &[8, 8, 8] };
    dir.write_tag(Tag::ImageWidth, width)?;
    dir.write_tag(Tag::ImageLength, height)?;
    dir.write_tag(Tag::BitsPerSample, bits)?;
    dir.write_tag(Tag::Compression, COMPRESSION_JPEG)?;
    dir.write_tag(Tag::PhotometricInterpretation, photometric)?;
    dir.write_tag(Tag::SamplesPerPixel, bits.len() as u16)?;
    dir.write_tag(Tag::RowsPerStrip, height)?;
    dir.write_tag(Tag::StripOffsets, offset)?;
    dir.write_tag(Tag::StripByteCounts, strip.len() as u32)?;
    dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
    if let Some(icc) = icc {
        dir.write_tag(Tag::Unknown(TAG_ICC_PROFILE), icc)?;
    }
    dir.finish()
}
