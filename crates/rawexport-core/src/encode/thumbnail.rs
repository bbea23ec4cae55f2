//! Thumbnail-JPEG export from the camera's embedded preview.

use std::io::Cursor;

use super::{EncodePlan, EncodedImage, ExportRequest, ImageCodec, ThumbnailOptions};
use crate::config::PerformanceProfile;
use crate::decode::{decode_bitmap, DecodeError, EmbeddedThumbnail};
use crate::error::ExportError;

/// Encoded thumbnail plus the size figures of its source.
#[derive(Debug)]
pub struct ThumbnailOutput {
    pub encoded: EncodedImage,
    pub source_dimensions: (u32, u32),
    pub source_size: u64,
    /// True when the embedded bytes were returned without re-encoding.
    pub passthrough: bool,
}

/// Produce a JPEG thumbnail.
///
/// An embedded JPEG is returned byte-for-byte when `opts` asks for neither
/// a quality nor a size limit. Otherwise it is decoded and re-encoded with
/// its longest edge capped at `max_size`.
pub fn encode_thumbnail<C: ImageCodec + ?Sized>(
    thumbnail: &EmbeddedThumbnail,
    opts: &ThumbnailOptions,
    codec: &C,
    profile: PerformanceProfile,
) -> Result<ThumbnailOutput, ExportError> {
    let request = ExportRequest::Thumbnail(opts.clone());
    request.validate(&codec.capabilities())?;

    match thumbnail {
        EmbeddedThumbnail::Jpeg(bytes) if opts.is_passthrough() => {
            let dims = jpeg_dimensions(bytes)?;
            log::debug!("thumbnail passthrough ({} bytes)", bytes.len());
            Ok(ThumbnailOutput {
                encoded: EncodedImage {
                    bytes: bytes.clone(),
                    width: dims.0,
                    height: dims.1,
                },
                source_dimensions: dims,
                source_size: bytes.len() as u64,
                passthrough: true,
            })
        }
        EmbeddedThumbnail::Jpeg(bytes) => {
            let raster = decode_bitmap(bytes)?;
            let caps = codec.capabilities();
            let plan = EncodePlan::resolve(&request, raster.dimensions(), profile, &caps)?;
            Ok(ThumbnailOutput {
                encoded: codec.encode(&raster, &plan)?,
                source_dimensions: raster.dimensions(),
                source_size: bytes.len() as u64,
                passthrough: false,
            })
        }
        EmbeddedThumbnail::Bitmap(raster) => {
            let caps = codec.capabilities();
            let plan = EncodePlan::resolve(&request, raster.dimensions(), profile, &caps)?;
            Ok(ThumbnailOutput {
                encoded: codec.encode(raster, &plan)?,
                source_dimensions: raster.dimensions(),
                source_size: raster.byte_len() as u64,
                passthrough: false,
            })
        }
    }
}

/// Frame size from the JPEG header; a preview without a readable one is
/// treated as corrupt.
fn jpeg_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    image::ImageReader::with_format(Cursor::new(bytes), image::ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(format!("embedded preview: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RasterBuffer;
    use crate::encode::DefaultCodec;

    fn embedded_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 60])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_passthrough_is_byte_identical() {
        let source = embedded_jpeg(160, 120);
        let out = encode_thumbnail(
            &EmbeddedThumbnail::Jpeg(source.clone()),
            &ThumbnailOptions::default(),
            &DefaultCodec,
            PerformanceProfile::Balanced,
        )
        .unwrap();
        assert!(out.passthrough);
        assert_eq!(out.encoded.bytes, source);
        assert_eq!((out.encoded.width, out.encoded.height), (160, 120));
    }

    #[test]
    fn test_passthrough_without_frame_header_is_corrupt() {
        // SOI immediately followed by EOI: nothing to read a size from.
        let result = encode_thumbnail(
            &EmbeddedThumbnail::Jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]),
            &ThumbnailOptions::default(),
            &DefaultCodec,
            PerformanceProfile::Balanced,
        );
        assert!(matches!(
            result,
            Err(ExportError::Decode(DecodeError::CorruptedFile(_)))
        ));
    }

    #[test]
    fn test_max_size_reencodes() {
        let source = embedded_jpeg(320, 200);
        let out = encode_thumbnail(
            &EmbeddedThumbnail::Jpeg(source.clone()),
            &ThumbnailOptions {
                max_size: Some(100),
                quality: None,
            },
            &DefaultCodec,
            PerformanceProfile::Balanced,
        )
        .unwrap();
        assert!(!out.passthrough);
        assert_ne!(out.encoded.bytes, source);
        assert_eq!((out.encoded.width, out.encoded.height), (100, 63));
    }

    #[test]
    fn test_bitmap_thumbnail_is_encoded() {
        let raster = RasterBuffer::from_rgb8(40, 30, vec![200; 40 * 30 * 3]).unwrap();
        let out = encode_thumbnail(
            &EmbeddedThumbnail::Bitmap(raster),
            &ThumbnailOptions::default(),
            &DefaultCodec,
            PerformanceProfile::Balanced,
        )
        .unwrap();
        assert_eq!(&out.encoded.bytes[0..2], &[0xFF, 0xD8]);
        assert_eq!(out.source_size, 40 * 30 * 3);
    }

    #[test]
    fn test_bad_quality_rejected() {
        let result = encode_thumbnail(
            &EmbeddedThumbnail::Jpeg(embedded_jpeg(8, 8)),
            &ThumbnailOptions {
                quality: Some(0),
                max_size: None,
            },
            &DefaultCodec,
            PerformanceProfile::Balanced,
        );
        assert!(matches!(result, Err(ExportError::InvalidParameter { .. })));
    }
}
