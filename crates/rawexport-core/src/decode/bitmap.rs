//! Decoding of ordinary (non-RAW) image bytes with EXIF orientation handling.
//!
//! Used for embedded JPEG thumbnails and as the fallback path when a loaded
//! source is a JPEG, PNG, TIFF or WebP file rather than a camera RAW.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{DecodeError, Orientation, RasterBuffer};

/// Decode image bytes, applying EXIF orientation correction.
///
/// The sample depth of the source is preserved (8-bit JPEGs stay 8-bit,
/// 16-bit PNG/TIFF stay 16-bit).
///
/// # Errors
///
/// Returns `DecodeError::CorruptedFile` if the bytes cannot be decoded.
pub fn decode_bitmap(bytes: &[u8]) -> Result<RasterBuffer, DecodeError> {
    let orientation = read_orientation(bytes);
    let img = decode_dynamic(bytes)?;
    RasterBuffer::from_dynamic_image(apply_orientation(img, orientation))
}

/// Decode image bytes as stored, ignoring any EXIF orientation.
pub fn decode_bitmap_no_orientation(bytes: &[u8]) -> Result<RasterBuffer, DecodeError> {
    RasterBuffer::from_dynamic_image(decode_dynamic(bytes)?)
}

/// Cheap header sniff: true when the `image` crate recognizes the container.
pub fn is_bitmap(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok()
}

fn decode_dynamic(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

/// Read the EXIF orientation tag.
///
/// Returns `Orientation::Normal` if there is no EXIF block or no orientation tag.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    Reader::new()
        .read_from_container(&mut cursor)
        .ok()
        .and_then(|exif| {
            exif.get_field(Tag::Orientation, In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(Orientation::from)
        .unwrap_or_default()
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
