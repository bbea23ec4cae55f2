//! Session configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decode::{DecodeParams, FilterType};
use crate::error::ExportError;

/// Largest decoded raster a session accepts by default (100 megapixels).
pub const DEFAULT_MAX_DECODED_PIXELS: u64 = 100_000_000;

/// Quality/speed preset that picks the default resampling kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceProfile {
    /// Highest quality resampling.
    Quality,
    /// Catmull-Rom resampling; the default.
    #[default]
    Balanced,
    /// Bilinear resampling for throughput.
    Speed,
}

impl PerformanceProfile {
    /// Resampling kernel used when a request does not ask for speed.
    pub fn resize_filter(self) -> FilterType {
        match self {
            PerformanceProfile::Quality => FilterType::Lanczos3,
            PerformanceProfile::Balanced => FilterType::CatmullRom,
            PerformanceProfile::Speed => FilterType::Bilinear,
        }
    }
}

impl FromStr for PerformanceProfile {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quality" => Ok(PerformanceProfile::Quality),
            "balanced" => Ok(PerformanceProfile::Balanced),
            "speed" => Ok(PerformanceProfile::Speed),
            _ => Err(ExportError::invalid_parameter(
                "profile",
                s,
                "one of quality, balanced, speed",
            )),
        }
    }
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Decodes producing more pixels than this fail with `TooLarge`.
    pub max_decoded_pixels: u64,
    /// Run multi-exports on the rayon pool instead of one after another.
    pub parallel_exports: bool,
    pub profile: PerformanceProfile,
    pub decode: DecodeParams,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_decoded_pixels: DEFAULT_MAX_DECODED_PIXELS,
            parallel_exports: true,
            profile: PerformanceProfile::default(),
            decode: DecodeParams::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.max_decoded_pixels == 0 {
            return Err(ExportError::invalid_parameter(
                "maxDecodedPixels",
                0,
                "a positive pixel count",
            ));
        }
        self.decode.validate()
    }
}
