//! Resolution of validated options into concrete encoder settings.

use super::options::{
    ChromaSubsampling, ColorSpace, ExportRequest, JpegEffort, JpegOptions, OutputFormat,
    ThumbnailOptions, TiffCompression,
};
use super::CodecCapabilities;
use crate::config::PerformanceProfile;
use crate::decode::{fit_longest_edge, fit_within, FilterType};
use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegSettings {
    pub quality: u8,
    pub progressive: bool,
    pub chroma: ChromaSubsampling,
    pub trellis: bool,
    pub optimize_scans: bool,
    pub optimize_coding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngSettings {
    pub compression_level: u8,
    pub interlaced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpSettings {
    pub quality: u8,
    pub lossless: bool,
    /// libwebp `method`, 0..=6.
    pub method: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvifSettings {
    pub quality: u8,
    pub lossless: bool,
    /// Encoder speed, 1 (slowest) to 10.
    pub speed: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffSettings {
    pub compression: TiffCompression,
    pub quality: u8,
    pub pyramid: bool,
}

/// Format-specific half of an [`EncodePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSettings {
    Jpeg(JpegSettings),
    Png(PngSettings),
    Webp(WebpSettings),
    Avif(AvifSettings),
    Tiff(TiffSettings),
    Ppm,
}

/// Everything a codec needs to turn one raster into one encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodePlan {
    /// Output width after aspect fit.
    pub width: u32,
    /// Output height after aspect fit.
    pub height: u32,
    pub filter: FilterType,
    pub color_space: ColorSpace,
    pub settings: FormatSettings,
}

impl EncodePlan {
    /// Validate `request` and fix every setting for a raster of `source` size.
    pub fn resolve(
        request: &ExportRequest,
        source: (u32, u32),
        profile: PerformanceProfile,
        caps: &CodecCapabilities,
    ) -> Result<Self, ExportError> {
        request.validate(caps)?;

        let kernel = |fast: bool| {
            if fast {
                FilterType::Bilinear
            } else {
                profile.resize_filter()
            }
        };
        let fitted = |(w, h): (Option<u32>, Option<u32>)| fit_within(source, w, h);

        let plan = match request {
            ExportRequest::Jpeg(o) => {
                let (width, height) = fitted((o.width, o.height));
                let fast = o.fast_resize || o.effort == JpegEffort::Fast;
                EncodePlan {
                    width,
                    height,
                    filter: kernel(fast),
                    color_space: o.color_space,
                    settings: FormatSettings::Jpeg(jpeg_settings(o, caps)),
                }
            }
            ExportRequest::Png(o) => {
                let (width, height) = fitted((o.width, o.height));
                EncodePlan {
                    width,
                    height,
                    filter: kernel(o.fast_resize),
                    color_space: o.color_space,
                    settings: FormatSettings::Png(PngSettings {
                        compression_level: o.compression_level as u8,
                        interlaced: o.progressive,
                    }),
                }
            }
            ExportRequest::Webp(o) => {
                let (width, height) = fitted((o.width, o.height));
                EncodePlan {
                    width,
                    height,
                    filter: kernel(o.fast_resize),
                    color_space: o.color_space,
                    settings: FormatSettings::Webp(WebpSettings {
                        quality: o.quality as u8,
                        lossless: o.lossless,
                        method: o.effort as u8,
                    }),
                }
            }
            ExportRequest::Avif(o) => {
                let (width, height) = fitted((o.width, o.height));
                EncodePlan {
                    width,
                    height,
                    filter: kernel(o.fast_resize),
                    color_space: o.color_space,
                    settings: FormatSettings::Avif(AvifSettings {
                        quality: if o.lossless { 100 } else { o.quality as u8 },
                        lossless: o.lossless,
                        speed: (10 - o.effort) as u8,
                    }),
                }
            }
            ExportRequest::Tiff(o) => {
                let (width, height) = fitted((o.width, o.height));
                EncodePlan {
                    width,
                    height,
                    filter: kernel(o.fast_resize),
                    color_space: o.color_space,
                    settings: FormatSettings::Tiff(TiffSettings {
                        compression: o.compression,
                        quality: o.quality as u8,
                        pyramid: o.pyramid,
                    }),
                }
            }
            ExportRequest::Ppm(_) => EncodePlan {
                width: source.0,
                height: source.1,
                filter: profile.resize_filter(),
                color_space: ColorSpace::Native,
                settings: FormatSettings::Ppm,
            },
            ExportRequest::Thumbnail(o) => Self::thumbnail(o, source, profile),
        };

        log::debug!("{} plan: {:?}", request.format(), plan);
        Ok(plan)
    }

    /// Re-encode plan for a thumbnail raster: longest edge capped at `max_size`.
    fn thumbnail(opts: &ThumbnailOptions, source: (u32, u32), profile: PerformanceProfile) -> Self {
        let (width, height) = match opts.max_size {
            Some(max) => fit_longest_edge(source, max),
            None => source,
        };
        let quality = opts
            .quality
            .map(|q| q as u8)
            .unwrap_or(ThumbnailOptions::DEFAULT_QUALITY);
        EncodePlan {
            width,
            height,
            filter: profile.resize_filter(),
            color_space: ColorSpace::Srgb,
            settings: FormatSettings::Jpeg(JpegSettings {
                quality,
                progressive: false,
                chroma: ChromaSubsampling::Yuv420,
                trellis: false,
                optimize_scans: false,
                optimize_coding: true,
            }),
        }
    }

    pub fn format(&self) -> OutputFormat {
        match self.settings {
            FormatSettings::Jpeg(_) => OutputFormat::Jpeg,
            FormatSettings::Png(_) => OutputFormat::Png,
            FormatSettings::Webp(_) => OutputFormat::Webp,
            FormatSettings::Avif(_) => OutputFormat::Avif,
            FormatSettings::Tiff(_) => OutputFormat::Tiff,
            FormatSettings::Ppm => OutputFormat::Ppm,
        }
    }
}

/// Apply the mozjpeg defaults, then let the effort dial override them.
fn jpeg_settings(o: &JpegOptions, caps: &CodecCapabilities) -> JpegSettings {
    let mut settings = JpegSettings {
        quality: o.quality as u8,
        progressive: o.progressive.unwrap_or(o.mozjpeg),
        chroma: o.chroma_subsampling,
        trellis: o.trellis_quantisation.unwrap_or(o.mozjpeg),
        optimize_scans: o.optimize_scans.unwrap_or(o.mozjpeg),
        optimize_coding: o.optimize_coding,
    };

    match o.effort {
        JpegEffort::Fast => {
            settings.progressive = false;
            settings.trellis = false;
            settings.optimize_scans = false;
        }
        JpegEffort::Balanced => {}
        JpegEffort::Max => {
            settings.progressive = true;
            settings.trellis = true;
            settings.optimize_scans = true;
            settings.optimize_coding = true;
        }
    }

    // Explicit requests for these were refused during validation; what is
    // left here came from the mozjpeg preset or the effort dial.
    if settings.trellis && !caps.jpeg_trellis {
        log::debug!("trellis quantisation not available, dropped from preset");
        settings.trellis = false;
    }
    if settings.optimize_scans && !caps.jpeg_optimize_scans {
        log::debug!("scan optimisation not available, dropped from preset");
        settings.optimize_scans = false;
    }

    if settings.chroma == ChromaSubsampling::Yuv422 && !caps.jpeg_chroma_422 {
        log::warn!("JPEG 4:2:2 chroma subsampling not supported by codec, using 4:4:4");
        settings.chroma = ChromaSubsampling::Yuv444;
    }
    settings
}
