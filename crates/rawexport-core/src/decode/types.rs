//! Core types for image decoding.

use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file format is not recognized or supported.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The camera model is not supported for RAW decoding.
    #[error("Unsupported camera: {0}")]
    UnsupportedCamera(String),

    /// The image file is corrupted or incomplete.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// The decoder produced a pixel buffer that disagrees with its own header.
    #[error("Pixel buffer size mismatch: expected {expected} samples, got {actual}")]
    BufferMismatch { expected: usize, actual: usize },

    /// Width or height is zero.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Channel count or bit depth outside what a raster can hold.
    #[error("Unsupported pixel layout: {channels} channel(s) at {bits} bits")]
    UnsupportedLayout { channels: u8, bits: u8 },

    /// Decoded image would exceed the configured pixel budget.
    #[error("Image too large: {pixels} pixels (limit {limit})")]
    TooLarge { pixels: u64, limit: u64 },

    /// I/O error during file reading.
    #[error("I/O error: {0}")]
    IoError(String),

    /// No embedded thumbnail found in RAW file.
    #[error("No embedded thumbnail found")]
    NoThumbnail,

    /// The session cancel flag was raised between decode stages.
    #[error("Decode cancelled")]
    Cancelled,
}

/// Filter type for image resizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    Bilinear,
    /// Catmull-Rom cubic interpolation (sharp, cheaper than Lanczos3).
    CatmullRom,
    /// Lanczos3 interpolation (slower, highest quality).
    #[default]
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::CatmullRom => image::imageops::FilterType::CatmullRom,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Narrow a 16-bit sample to 8 bits as `floor(v * 255 / 65535)`.
#[inline]
pub fn narrow_sample(v: u16) -> u8 {
    (v as u32 * 255 / 65535) as u8
}

/// EXIF orientation values (1-8).
/// See: https://exiftool.org/TagNames/EXIF.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    /// Normal (no transformation needed).
    #[default]
    Normal = 1,
    /// Horizontal flip.
    FlipHorizontal = 2,
    /// Rotate 180 degrees.
    Rotate180 = 3,
    /// Vertical flip.
    FlipVertical = 4,
    /// Transpose (flip horizontal + rotate 270 CW).
    Transpose = 5,
    /// Rotate 90 degrees clockwise.
    Rotate90CW = 6,
    /// Transverse (flip horizontal + rotate 90 CW).
    Transverse = 7,
    /// Rotate 270 degrees clockwise (90 CCW).
    Rotate270CW = 8,
}

impl Orientation {
    /// Returns true if this orientation swaps width and height dimensions.
    #[inline]
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90CW
                | Orientation::Transverse
                | Orientation::Rotate270CW
        )
    }
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            1 => Orientation::Normal,
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90CW,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270CW,
            _ => Orientation::Normal,
        }
    }
}

/// Metadata read from a loaded source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    /// Image width in pixels as recorded by the file (before orientation correction).
    pub width: Option<u32>,
    /// Image height in pixels as recorded by the file.
    pub height: Option<u32>,
    /// EXIF orientation.
    pub orientation: Orientation,
    /// Camera make (e.g., "Sony").
    pub camera_make: Option<String>,
    /// Camera model (e.g., "ILCE-6600").
    pub camera_model: Option<String>,
    /// Date/time the photo was taken, as written by the camera.
    pub date_taken: Option<String>,
    /// ISO sensitivity.
    pub iso: Option<u32>,
    /// Shutter speed as a string (e.g., "1/250").
    pub shutter_speed: Option<String>,
    /// Aperture as f-number (e.g., 2.8).
    pub aperture: Option<f32>,
    /// Focal length in mm.
    pub focal_length: Option<f32>,
}

impl ImageMetadata {
    /// Get the effective dimensions after orientation correction.
    pub fn oriented_dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = (self.width?, self.height?);
        if self.orientation.swaps_dimensions() {
            Some((h, w))
        } else {
            Some((w, h))
        }
    }
}

/// Lens details from the EXIF block. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensInfo {
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub lens_serial: Option<String>,
    /// Shortest focal length in mm.
    pub min_focal: Option<f32>,
    pub max_focal: Option<f32>,
    /// Widest f-number at the shortest focal length.
    pub max_aperture_at_min_focal: Option<f32>,
    pub max_aperture_at_max_focal: Option<f32>,
    /// Widest f-number the lens reports, converted from APEX.
    pub max_aperture: Option<f32>,
    pub focal_length_in_35mm: Option<u32>,
}

/// Sensor levels and colour data of a camera RAW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorInfo {
    /// Components per sensor pixel: 1 for a mosaic, 3 for linear RAWs.
    pub components: u32,
    /// CFA layout such as "RGGB", empty for non-mosaic data.
    pub cfa_pattern: String,
    pub black_levels: [u16; 4],
    pub white_levels: [u16; 4],
    /// As-shot white balance multipliers, NaN where the camera left one out.
    pub camera_multipliers: [f32; 4],
    pub xyz_to_camera: [[f32; 3]; 4],
}

/// Geometry of a source at each stage of the decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSizes {
    /// Full sensor readout, including masked borders.
    pub raw_width: u32,
    pub raw_height: u32,
    pub top_margin: u32,
    pub left_margin: u32,
    /// Visible area after cropping the borders.
    pub width: u32,
    pub height: u32,
    /// Size of the raster the current decode parameters produce.
    pub output_width: u32,
    pub output_height: u32,
}

/// Interleaved sample storage for a [`RasterBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// One byte per sample.
    Eight(Vec<u8>),
    /// Two bytes per sample, full 0..=65535 range.
    Sixteen(Vec<u16>),
}

impl Samples {
    /// Number of samples (not bytes).
    pub fn len(&self) -> usize {
        match self {
            Samples::Eight(v) => v.len(),
            Samples::Sixteen(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bits(&self) -> u8 {
        match self {
            Samples::Eight(_) => 8,
            Samples::Sixteen(_) => 16,
        }
    }
}

/// A fully decoded, interleaved pixel raster.
///
/// The sample count always equals `width * height * channels`; the
/// constructor refuses anything else, so every raster that exists is
/// internally consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Samples,
}

impl RasterBuffer {
    /// Create a raster, checking dimensions, layout and buffer length.
    pub fn new(
        width: u32,
        height: u32,
        channels: u8,
        samples: Samples,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        if !(1..=4).contains(&channels) {
            return Err(DecodeError::UnsupportedLayout {
                channels,
                bits: samples.bits(),
            });
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|p| p.checked_mul(channels as usize))
            .ok_or(DecodeError::TooLarge {
                pixels: width as u64 * height as u64,
                limit: usize::MAX as u64,
            })?;
        if samples.len() != expected {
            return Err(DecodeError::BufferMismatch {
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// 8-bit RGB convenience constructor.
    pub fn from_rgb8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        Self::new(width, height, 3, Samples::Eight(pixels))
    }

    /// 16-bit RGB convenience constructor.
    pub fn from_rgb16(width: u32, height: u32, pixels: Vec<u16>) -> Result<Self, DecodeError> {
        Self::new(width, height, 3, Samples::Sixteen(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bits_per_channel(&self) -> u8 {
        self.samples.bits()
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Size of the pixel buffer in bytes (`width * height * channels * bits / 8`).
    pub fn byte_len(&self) -> usize {
        self.samples.len() * (self.bits_per_channel() as usize / 8)
    }

    /// Copy the raster into an `image` crate buffer for resizing and encoding.
    pub fn to_dynamic_image(&self) -> Result<DynamicImage, DecodeError> {
        let (w, h) = (self.width, self.height);
        let mismatch = || DecodeError::BufferMismatch {
            expected: self.samples.len(),
            actual: self.samples.len(),
        };

        let img = match (&self.samples, self.channels) {
            (Samples::Eight(v), 1) => DynamicImage::ImageLuma8(
                ImageBuffer::<Luma<u8>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Eight(v), 2) => DynamicImage::ImageLumaA8(
                ImageBuffer::<LumaA<u8>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Eight(v), 3) => DynamicImage::ImageRgb8(
                ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Eight(v), _) => DynamicImage::ImageRgba8(
                ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Sixteen(v), 1) => DynamicImage::ImageLuma16(
                ImageBuffer::<Luma<u16>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Sixteen(v), 2) => DynamicImage::ImageLumaA16(
                ImageBuffer::<LumaA<u16>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Sixteen(v), 3) => DynamicImage::ImageRgb16(
                ImageBuffer::<Rgb<u16>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
            (Samples::Sixteen(v), _) => DynamicImage::ImageRgba16(
                ImageBuffer::<Rgba<u16>, _>::from_raw(w, h, v.clone()).ok_or_else(mismatch)?,
            ),
        };
        Ok(img)
    }

    /// Build a raster from an `image` crate buffer.
    ///
    /// Float images are quantized to 16 bits.
    pub fn from_dynamic_image(img: DynamicImage) -> Result<Self, DecodeError> {
        let (w, h) = (img.width(), img.height());
        match img {
            DynamicImage::ImageLuma8(b) => Self::new(w, h, 1, Samples::Eight(b.into_raw())),
            DynamicImage::ImageLumaA8(b) => Self::new(w, h, 2, Samples::Eight(b.into_raw())),
            DynamicImage::ImageRgb8(b) => Self::new(w, h, 3, Samples::Eight(b.into_raw())),
            DynamicImage::ImageRgba8(b) => Self::new(w, h, 4, Samples::Eight(b.into_raw())),
            DynamicImage::ImageLuma16(b) => Self::new(w, h, 1, Samples::Sixteen(b.into_raw())),
            DynamicImage::ImageLumaA16(b) => Self::new(w, h, 2, Samples::Sixteen(b.into_raw())),
            DynamicImage::ImageRgb16(b) => Self::new(w, h, 3, Samples::Sixteen(b.into_raw())),
            DynamicImage::ImageRgba16(b) => Self::new(w, h, 4, Samples::Sixteen(b.into_raw())),
            other if other.color().has_alpha() => {
                Self::new(w, h, 4, Samples::Sixteen(other.into_rgba16().into_raw()))
            }
            other => Self::new(w, h, 3, Samples::Sixteen(other.into_rgb16().into_raw())),
        }
    }
}

/// The thumbnail a camera embedded in its RAW file.
#[derive(Debug, Clone)]
pub enum EmbeddedThumbnail {
    /// Already JPEG-encoded; can be handed out untouched.
    Jpeg(Vec<u8>),
    /// An uncompressed bitmap preview.
    Bitmap(RasterBuffer),
}
