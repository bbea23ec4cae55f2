//! Typed per-format export options.
//!
//! Every struct deserializes from a camelCase option bag with defaults for
//! missing fields and rejects unknown ones. Numeric knobs are plain signed
//! integers so that out-of-range input (including negatives) reaches
//! [`ExportRequest::validate`] and is reported with the field name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::CodecCapabilities;
use crate::error::ExportError;

/// Output container of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Ppm,
    #[serde(rename = "thumbnail")]
    ThumbnailJpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg | OutputFormat::ThumbnailJpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Ppm => "ppm",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg | OutputFormat::ThumbnailJpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Ppm => "image/x-portable-pixmap",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Webp => "WebP",
            OutputFormat::Avif => "AVIF",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Ppm => "PPM",
            OutputFormat::ThumbnailJpeg => "thumbnail JPEG",
        };
        f.write_str(name)
    }
}

/// JPEG chroma subsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    #[serde(rename = "4:4:4")]
    Yuv444,
    #[serde(rename = "4:2:2")]
    Yuv422,
    #[default]
    #[serde(rename = "4:2:0")]
    Yuv420,
}

/// Color space the output pixels are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Pixels exactly as decoded.
    Native,
    #[default]
    Srgb,
    Rec2020,
    #[serde(rename = "p3", alias = "displayp3")]
    DisplayP3,
    /// Four-channel ink separation; JPEG and TIFF only.
    Cmyk,
}

/// Coarse JPEG speed dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JpegEffort {
    /// Baseline encode with every optional pass off.
    Fast,
    #[default]
    Balanced,
    /// Every size optimisation on.
    Max,
}

/// TIFF compression codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TiffCompression {
    None,
    #[default]
    Lzw,
    Jpeg,
    Zip,
}

impl TiffCompression {
    pub fn as_str(self) -> &'static str {
        match self {
            TiffCompression::None => "none",
            TiffCompression::Lzw => "lzw",
            TiffCompression::Jpeg => "jpeg",
            TiffCompression::Zip => "zip",
        }
    }
}

impl FromStr for TiffCompression {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(TiffCompression::None),
            "lzw" => Ok(TiffCompression::Lzw),
            "jpeg" => Ok(TiffCompression::Jpeg),
            "zip" | "deflate" => Ok(TiffCompression::Zip),
            _ => Err(ExportError::invalid_parameter(
                "compression",
                s,
                "one of none, lzw, jpeg, zip",
            )),
        }
    }
}

impl TryFrom<String> for TiffCompression {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TiffCompression> for String {
    fn from(value: TiffCompression) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct JpegOptions {
    pub quality: i32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Defaults to the `mozjpeg` setting when unset.
    pub progressive: Option<bool>,
    /// Turns on progressive, trellis and scan optimisation unless each is set explicitly.
    pub mozjpeg: bool,
    pub chroma_subsampling: ChromaSubsampling,
    pub trellis_quantisation: Option<bool>,
    pub optimize_scans: Option<bool>,
    pub optimize_coding: bool,
    pub color_space: ColorSpace,
    pub effort: JpegEffort,
    pub fast_resize: bool,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: 85,
            width: None,
            height: None,
            progressive: None,
            mozjpeg: true,
            chroma_subsampling: ChromaSubsampling::default(),
            trellis_quantisation: None,
            optimize_scans: None,
            optimize_coding: true,
            color_space: ColorSpace::default(),
            effort: JpegEffort::default(),
            fast_resize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct PngOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// zlib level, 0 (fastest) to 9 (smallest).
    pub compression_level: i32,
    /// Adam7 interlacing; only accepted by codecs that can write it.
    pub progressive: bool,
    pub color_space: ColorSpace,
    pub fast_resize: bool,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            compression_level: 6,
            progressive: false,
            color_space: ColorSpace::default(),
            fast_resize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct WebpOptions {
    pub quality: i32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub lossless: bool,
    /// 0 (fastest) to 6 (smallest).
    pub effort: i32,
    pub color_space: ColorSpace,
    pub fast_resize: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self {
            quality: 80,
            width: None,
            height: None,
            lossless: false,
            effort: 4,
            color_space: ColorSpace::default(),
            fast_resize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct AvifOptions {
    pub quality: i32,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub lossless: bool,
    /// 0 (fastest) to 9 (smallest).
    pub effort: i32,
    pub color_space: ColorSpace,
    pub fast_resize: bool,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: 50,
            width: None,
            height: None,
            lossless: false,
            effort: 4,
            color_space: ColorSpace::default(),
            fast_resize: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct TiffOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub compression: TiffCompression,
    /// Only used by JPEG-in-TIFF.
    pub quality: i32,
    /// Append successively halved sub-images down to 256 px.
    pub pyramid: bool,
    pub color_space: ColorSpace,
    pub fast_resize: bool,
}

impl Default for TiffOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            compression: TiffCompression::default(),
            quality: 80,
            pyramid: false,
            color_space: ColorSpace::default(),
            fast_resize: false,
        }
    }
}

/// PPM has no knobs: always full size, 8-bit RGB.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PpmOptions {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ThumbnailOptions {
    /// Re-encode quality; setting it disables the passthrough.
    pub quality: Option<i32>,
    /// Longest-edge limit; setting it disables the passthrough.
    pub max_size: Option<u32>,
}

impl ThumbnailOptions {
    pub const DEFAULT_QUALITY: u8 = 85;

    /// True when the embedded JPEG may be returned untouched.
    pub fn is_passthrough(&self) -> bool {
        self.quality.is_none() && self.max_size.is_none()
    }
}

/// One export call: a target format plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ExportRequest {
    Jpeg(JpegOptions),
    Png(PngOptions),
    Webp(WebpOptions),
    Avif(AvifOptions),
    Tiff(TiffOptions),
    Ppm(PpmOptions),
    #[serde(rename = "thumbnail")]
    Thumbnail(ThumbnailOptions),
}

impl ExportRequest {
    /// Parse a `{ format, ...options }` bag from any serde source.
    ///
    /// Unknown fields, wrong types and unknown enum names all come back as
    /// `InvalidParameter` on `request`, with the parser's message attached.
    pub fn from_bag<'de, D: Deserializer<'de>>(bag: D) -> Result<Self, ExportError> {
        Self::deserialize(bag).map_err(|e| {
            ExportError::invalid_parameter("request", e, "a valid export option object")
        })
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            ExportRequest::Jpeg(_) => OutputFormat::Jpeg,
            ExportRequest::Png(_) => OutputFormat::Png,
            ExportRequest::Webp(_) => OutputFormat::Webp,
            ExportRequest::Avif(_) => OutputFormat::Avif,
            ExportRequest::Tiff(_) => OutputFormat::Tiff,
            ExportRequest::Ppm(_) => OutputFormat::Ppm,
            ExportRequest::Thumbnail(_) => OutputFormat::ThumbnailJpeg,
        }
    }

    /// True when the request reads the embedded thumbnail instead of the
    /// decoded raster.
    pub fn uses_thumbnail(&self) -> bool {
        matches!(self, ExportRequest::Thumbnail(_))
    }

    /// Requested `(width, height)` box, if any.
    pub fn target_size(&self) -> (Option<u32>, Option<u32>) {
        match self {
            ExportRequest::Jpeg(o) => (o.width, o.height),
            ExportRequest::Png(o) => (o.width, o.height),
            ExportRequest::Webp(o) => (o.width, o.height),
            ExportRequest::Avif(o) => (o.width, o.height),
            ExportRequest::Tiff(o) => (o.width, o.height),
            ExportRequest::Ppm(_) | ExportRequest::Thumbnail(_) => (None, None),
        }
    }

    /// Check every option against its range and the codec's abilities.
    ///
    /// Runs before any decode or encode work.
    pub fn validate(&self, caps: &CodecCapabilities) -> Result<(), ExportError> {
        match self {
            ExportRequest::Jpeg(o) => {
                check_quality("quality", o.quality)?;
                check_dimensions(o.width, o.height)?;
                require_feature(
                    o.trellis_quantisation,
                    caps.jpeg_trellis,
                    "JPEG trellis quantisation",
                )?;
                require_feature(
                    o.optimize_scans,
                    caps.jpeg_optimize_scans,
                    "JPEG scan optimisation",
                )
            }
            ExportRequest::Png(o) => {
                check_range("compressionLevel", o.compression_level, 0, 9)?;
                check_dimensions(o.width, o.height)?;
                require_feature(Some(o.progressive), caps.png_interlace, "PNG interlacing")?;
                reject_cmyk(OutputFormat::Png, o.color_space)
            }
            ExportRequest::Webp(o) => {
                check_quality("quality", o.quality)?;
                check_range("effort", o.effort, 0, 6)?;
                check_dimensions(o.width, o.height)?;
                reject_cmyk(OutputFormat::Webp, o.color_space)
            }
            ExportRequest::Avif(o) => {
                check_quality("quality", o.quality)?;
                check_range("effort", o.effort, 0, 9)?;
                check_dimensions(o.width, o.height)?;
                reject_cmyk(OutputFormat::Avif, o.color_space)
            }
            ExportRequest::Tiff(o) => {
                check_quality("quality", o.quality)?;
                check_dimensions(o.width, o.height)?;
                if o.compression == TiffCompression::Jpeg && !caps.tiff_jpeg {
                    return Err(ExportError::UnsupportedCombination(
                        "JPEG-in-TIFF compression is not available in this codec".to_string(),
                    ));
                }
                if o.compression == TiffCompression::Jpeg && o.color_space == ColorSpace::Cmyk {
                    return Err(ExportError::UnsupportedCombination(
                        "JPEG-in-TIFF cannot carry CMYK".to_string(),
                    ));
                }
                Ok(())
            }
            ExportRequest::Ppm(_) => Ok(()),
            ExportRequest::Thumbnail(o) => {
                if let Some(q) = o.quality {
                    check_quality("quality", q)?;
                }
                if o.max_size == Some(0) {
                    return Err(ExportError::invalid_parameter(
                        "maxSize",
                        0,
                        "a positive pixel count",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl From<JpegOptions> for ExportRequest {
    fn from(o: JpegOptions) -> Self {
        ExportRequest::Jpeg(o)
    }
}

impl From<PngOptions> for ExportRequest {
    fn from(o: PngOptions) -> Self {
        ExportRequest::Png(o)
    }
}

impl From<WebpOptions> for ExportRequest {
    fn from(o: WebpOptions) -> Self {
        ExportRequest::Webp(o)
    }
}

impl From<AvifOptions> for ExportRequest {
    fn from(o: AvifOptions) -> Self {
        ExportRequest::Avif(o)
    }
}

impl From<TiffOptions> for ExportRequest {
    fn from(o: TiffOptions) -> Self {
        ExportRequest::Tiff(o)
    }
}

impl From<PpmOptions> for ExportRequest {
    fn from(o: PpmOptions) -> Self {
        ExportRequest::Ppm(o)
    }
}

impl From<ThumbnailOptions> for ExportRequest {
    fn from(o: ThumbnailOptions) -> Self {
        ExportRequest::Thumbnail(o)
    }
}

fn check_quality(field: &str, value: i32) -> Result<(), ExportError> {
    check_range(field, value, 1, 100)
}

fn check_range(field: &str, value: i32, min: i32, max: i32) -> Result<(), ExportError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ExportError::invalid_parameter(
            field,
            value,
            format!("an integer in {min}..={max}"),
        ))
    }
}

/// JPEG tops out at 65535 per side; nothing we write goes beyond that.
fn check_dimensions(width: Option<u32>, height: Option<u32>) -> Result<(), ExportError> {
    for (field, value) in [("width", width), ("height", height)] {
        match value {
            Some(0) => return Err(ExportError::invalid_parameter(field, 0, "at least 1")),
            Some(v) if v > u16::MAX as u32 => {
                return Err(ExportError::invalid_parameter(field, v, "at most 65535"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// An explicitly requested codec feature must exist. Presets that merely
/// imply it are trimmed during planning instead.
fn require_feature(
    requested: Option<bool>,
    available: bool,
    what: &str,
) -> Result<(), ExportError> {
    if requested == Some(true) && !available {
        Err(ExportError::UnsupportedCombination(format!(
            "{what} is not available in this codec"
        )))
    } else {
        Ok(())
    }
}

fn reject_cmyk(format: OutputFormat, color_space: ColorSpace) -> Result<(), ExportError> {
    if color_space == ColorSpace::Cmyk {
        Err(ExportError::UnsupportedCombination(format!(
            "CMYK output is only available for JPEG and TIFF, not {format}"
        )))
    } else {
        Ok(())
    }
}
