//! Decoding side of the export pipeline.
//!
//! This module provides:
//! - The [`RawDecoder`] collaborator trait and its parameters
//! - [`RawloaderDecoder`], the default RAW decoder with a bitmap fallback
//! - Embedded JPEG preview extraction from RAW containers
//! - EXIF metadata, lens, sensor level and geometry queries
//! - Aspect-preserving resize planning and resampling
//!
//! # Architecture
//!
//! Loading a source is cheap; the full sensor decode only happens when an
//! export first needs pixels (see [`crate::cache::DecodeCache`]). Every
//! decoded image is a [`RasterBuffer`] whose sample count is checked at
//! construction.

mod bitmap;
mod metadata;
mod raw;
mod resize;
mod source;
mod thumbnail;
mod types;

pub use bitmap::{decode_bitmap, decode_bitmap_no_orientation, is_bitmap, read_orientation};
pub use metadata::{read_lens_info, read_metadata};
pub use raw::{LoadedSource, RawloaderDecoder};
pub use resize::{fit_longest_edge, fit_within, resize_image, resize_raster};
pub use source::{CancelFlag, DecodeParams, RawDecoder, SourceInput};
pub use thumbnail::{extract_embedded_jpeg, is_tiff_container};
pub use types::{
    narrow_sample, ColorInfo, DecodeError, EmbeddedThumbnail, FilterType, ImageMetadata,
    ImageSizes, LensInfo, Orientation, RasterBuffer, Samples,
};
