//! Encoding side of the export pipeline.
//!
//! This module provides:
//! - Typed option structs for each output format
//! - [`EncodePlan`], the validated and fully resolved settings of one export
//! - The [`ImageCodec`] collaborator trait and [`DefaultCodec`], which
//!   resizes, converts color and writes JPEG, PNG, WebP, AVIF, TIFF and PPM
//! - Thumbnail export from the embedded preview, with a zero-copy passthrough
//!
//! Options are checked before any pixels are touched; a codec only ever
//! sees plans that passed validation.

mod avif;
mod codec;
mod colorspace;
mod jpeg;
mod options;
mod plan;
mod png;
mod ppm;
mod thumbnail;
mod tiff;
mod webp;

use thiserror::Error;

use crate::decode::{DecodeError, RasterBuffer};

pub use codec::DefaultCodec;
pub use colorspace::{convert_color_space, rgb_to_cmyk};
pub use options::{
    AvifOptions, ChromaSubsampling, ColorSpace, ExportRequest, JpegEffort, JpegOptions,
    OutputFormat, PngOptions, PpmOptions, ThumbnailOptions, TiffCompression, TiffOptions,
    WebpOptions,
};
pub use plan::{
    AvifSettings, EncodePlan, FormatSettings, JpegSettings, PngSettings, TiffSettings,
    WebpSettings,
};
pub use ppm::{encode_ppm, to_rgb8_samples};
pub use thumbnail::{encode_thumbnail, ThumbnailOutput};

/// Errors raised by a codec after validation passed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Width or height is zero or too large for the container.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The raster could not be resized or converted.
    #[error("Pixel preparation failed: {0}")]
    Prepare(#[from] DecodeError),

    /// The underlying encoder failed.
    #[error("{format} encoding failed: {message}")]
    EncodingFailed {
        format: OutputFormat,
        message: String,
    },
}

impl EncodeError {
    pub(crate) fn failed(format: OutputFormat, message: impl ToString) -> Self {
        EncodeError::EncodingFailed {
            format,
            message: message.to_string(),
        }
    }
}

/// Optional features a codec may or may not implement.
///
/// Validation and planning consult these so requests for missing features
/// either degrade in a documented way or fail before encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecCapabilities {
    /// Native 4:2:2 JPEG chroma subsampling.
    pub jpeg_chroma_422: bool,
    /// Trellis quantisation.
    pub jpeg_trellis: bool,
    /// Progressive scan-order search.
    pub jpeg_optimize_scans: bool,
    /// Adam7 PNG interlacing.
    pub png_interlace: bool,
    /// JPEG compression inside TIFF.
    pub tiff_jpeg: bool,
}

/// Bytes produced by a codec together with their real pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// The image codec collaborator.
///
/// Implementations resize to the plan's size, convert to its color space
/// and encode. They must not modify `raster`; concurrent exports share it.
pub trait ImageCodec: Send + Sync {
    fn capabilities(&self) -> CodecCapabilities;

    fn encode(&self, raster: &RasterBuffer, plan: &EncodePlan) -> Result<EncodedImage, EncodeError>;
}
