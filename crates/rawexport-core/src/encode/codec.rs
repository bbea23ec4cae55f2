//! The built-in [`ImageCodec`].

use std::borrow::Cow;

use super::avif::encode_avif;
use super::colorspace::{convert_color_space, icc_profile};
use super::jpeg::encode_jpeg;
use super::png::encode_png;
use super::ppm::encode_ppm;
use super::tiff::encode_tiff;
use super::webp::encode_webp;
use super::{
    CodecCapabilities, ColorSpace, EncodeError, EncodePlan, EncodedImage, FormatSettings,
    ImageCodec,
};
use crate::decode::{resize_raster, RasterBuffer};

/// Codec built on `image`, `jpeg-encoder`, `webp` and `tiff`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl DefaultCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for DefaultCodec {
    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            jpeg_chroma_422: true,
            tiff_jpeg: true,
            ..Default::default()
        }
    }

    fn encode(
        &self,
        raster: &RasterBuffer,
        plan: &EncodePlan,
    ) -> Result<EncodedImage, EncodeError> {
        if plan.width == 0 || plan.height == 0 {
            return Err(EncodeError::InvalidDimensions {
                width: plan.width,
                height: plan.height,
            });
        }

        // Work on a copy only when something actually changes the pixels.
        let mut pixels: Cow<'_, RasterBuffer> = Cow::Borrowed(raster);
        if pixels.dimensions() != (plan.width, plan.height) {
            pixels = Cow::Owned(resize_raster(&pixels, plan.width, plan.height, plan.filter)?);
        }
        if let Some(converted) = convert_color_space(&pixels, plan.color_space)? {
            pixels = Cow::Owned(converted);
        }

        let cmyk = plan.color_space == ColorSpace::Cmyk;
        let icc = if pixels.channels() >= 3 {
            icc_profile(plan.color_space, plan.format())?
        } else {
            None
        };
        let icc = icc.as_deref();
        let bytes = match &plan.settings {
            FormatSettings::Jpeg(s) => encode_jpeg(&pixels, s, cmyk, icc)?,
            FormatSettings::Png(s) => encode_png(&pixels, s, icc)?,
            FormatSettings::Webp(s) => encode_webp(&pixels, s, icc)?,
            FormatSettings::Avif(s) => encode_avif(&pixels, s, icc)?,
            FormatSettings::Tiff(s) => encode_tiff(&pixels, s, cmyk, plan.filter, icc)?,
            FormatSettings::Ppm => encode_ppm(&pixels)?,
        };

        Ok(EncodedImage {
            bytes,
            width: pixels.width(),
            height: pixels.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FilterType;
    use crate::encode::{PngSettings, WebpSettings};

    fn plan(width: u32, height: u32, settings: FormatSettings) -> EncodePlan {
        EncodePlan {
            width,
            height,
            filter: FilterType::Lanczos3,
            color_space: ColorSpace::Srgb,
            settings,
        }
    }

    #[test]
    fn test_encode_reports_actual_output_size() {
        let raster = RasterBuffer::from_rgb8(40, 30, vec![120; 40 * 30 * 3]).unwrap();
        let png = FormatSettings::Png(PngSettings {
            compression_level: 6,
            interlaced: false,
        });
        let out = DefaultCodec.encode(&raster, &plan(20, 15, png)).unwrap();
        assert_eq!((out.width, out.height), (20, 15));

        let img = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (20, 15));
    }

    #[test]
    fn test_encode_leaves_source_alone() {
        let raster = RasterBuffer::from_rgb16(8, 8, vec![30000; 192]).unwrap();
        let before = raster.clone();
        let webp = FormatSettings::Webp(WebpSettings {
            quality: 80,
            lossless: false,
            method: 4,
        });
        let mut p = plan(4, 4, webp);
        p.color_space = ColorSpace::Rec2020;
        DefaultCodec.encode(&raster, &p).unwrap();
        assert_eq!(raster, before);
    }

    #[test]
    fn test_zero_plan_rejected() {
        let raster = RasterBuffer::from_rgb8(1, 1, vec![0; 3]).unwrap();
        let result = DefaultCodec.encode(&raster, &plan(0, 1, FormatSettings::Ppm));
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_default_codec_capabilities() {
        let caps = DefaultCodec.capabilities();
        assert!(caps.jpeg_chroma_422);
        assert!(caps.tiff_jpeg);
        assert!(!caps.jpeg_trellis && !caps.jpeg_optimize_scans && !caps.png_interlace);
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_wide_gamut_output_is_tagged() {
        use crate::encode::{
            ChromaSubsampling, JpegSettings, OutputFormat, TiffCompression, TiffSettings,
        };
        use image::codecs::png::PngDecoder;
        use image::ImageDecoder;

        let raster = RasterBuffer::from_rgb8(16, 12, vec![200; 16 * 12 * 3]).unwrap();
        let profile = icc_profile(ColorSpace::DisplayP3, OutputFormat::Png)
            .unwrap()
            .unwrap();
        let jpeg = FormatSettings::Jpeg(JpegSettings {
            quality: 90,
            progressive: false,
            chroma: ChromaSubsampling::Yuv420,
            trellis: false,
            optimize_scans: false,
            optimize_coding: true,
        });
        let png = FormatSettings::Png(PngSettings {
            compression_level: 6,
            interlaced: false,
        });
        let webp = FormatSettings::Webp(WebpSettings {
            quality: 80,
            lossless: false,
            method: 4,
        });
        let tiff = FormatSettings::Tiff(TiffSettings {
            compression: TiffCompression::Lzw,
            quality: 80,
            pyramid: false,
        });

        for settings in [jpeg, webp, tiff] {
            let mut p = plan(16, 12, settings);
            p.color_space = ColorSpace::DisplayP3;
            let out = DefaultCodec.encode(&raster, &p).unwrap();
            assert!(contains(&out.bytes, &profile), "{:?}", p.format());

            p.color_space = ColorSpace::Srgb;
            let out = DefaultCodec.encode(&raster, &p).unwrap();
            assert!(!contains(&out.bytes, &profile), "{:?}", p.format());
        }

        let mut p = plan(16, 12, png);
        p.color_space = ColorSpace::DisplayP3;
        let out = DefaultCodec.encode(&raster, &p).unwrap();
        let mut decoder = PngDecoder::new(std::io::Cursor::new(&out.bytes)).unwrap();
        assert_eq!(decoder.icc_profile().unwrap(), Some(profile));
    }
}
