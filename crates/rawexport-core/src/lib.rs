//! RawExport Core - RAW decode cache and multi-format export pipeline
//!
//! This crate decodes a camera RAW file (or an ordinary bitmap) once per
//! session, keeps the raster in memory, and encodes it to JPEG, PNG, WebP,
//! AVIF, TIFF, PPM or a thumbnail JPEG as many times as asked.

pub mod cache;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod export;

pub use cache::DecodeCache;
pub use config::{PerformanceProfile, SessionConfig, DEFAULT_MAX_DECODED_PIXELS};
pub use decode::{
    CancelFlag, ColorInfo, DecodeError, DecodeParams, EmbeddedThumbnail, ImageMetadata,
    ImageSizes, LensInfo, RasterBuffer, RawDecoder, RawloaderDecoder, SourceInput,
};
pub use encode::{
    AvifOptions, ChromaSubsampling, CodecCapabilities, ColorSpace, DefaultCodec, EncodeError,
    EncodePlan, EncodedImage, ExportRequest, ImageCodec, JpegEffort, JpegOptions, OutputFormat,
    PngOptions, PpmOptions, ThumbnailOptions, TiffCompression, TiffOptions, WebpOptions,
};
pub use error::ExportError;
pub use export::{convert_files, BatchReport, ExportResult, MultiExport, Session};
