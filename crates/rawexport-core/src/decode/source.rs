//! The RAW decoder collaborator contract.
//!
//! A session talks to its decoder only through [`RawDecoder`]. The default
//! implementation lives in `raw.rs`; tests plug in counting mocks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    ColorInfo, DecodeError, EmbeddedThumbnail, ImageMetadata, ImageSizes, LensInfo, RasterBuffer,
};
use crate::error::ExportError;

/// Where a session's bytes come from.
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// A file on disk, read by the decoder.
    Path(PathBuf),
    /// Bytes already in memory.
    Bytes(Vec<u8>),
}

impl From<PathBuf> for SourceInput {
    fn from(path: PathBuf) -> Self {
        SourceInput::Path(path)
    }
}

impl From<Vec<u8>> for SourceInput {
    fn from(bytes: Vec<u8>) -> Self {
        SourceInput::Bytes(bytes)
    }
}

/// Parameters applied when turning sensor data into an RGB raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct DecodeParams {
    /// Bits per output sample: 8 or 16.
    pub output_bits: u8,
    /// Gamma curve as `(power, toe slope)`. BT.709 is `(0.45, 4.5)`.
    pub gamma: (f32, f32),
    /// Brightness multiplier applied after auto-bright.
    pub bright: f32,
    /// Disable the histogram-based auto-brightness stage.
    pub no_auto_bright: bool,
    /// Use the white balance multipliers recorded by the camera.
    pub use_camera_wb: bool,
    /// Explicit R, G, B, G2 multipliers; overrides `use_camera_wb`.
    pub user_mul: Option<[f32; 4]>,
    /// Emit the half-resolution super-pixel raster without upsampling.
    pub half_size: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            output_bits: 16,
            gamma: (0.45, 4.5),
            bright: 1.0,
            no_auto_bright: false,
            use_camera_wb: true,
            user_mul: None,
            half_size: false,
        }
    }
}

impl DecodeParams {
    /// Check every field; the first bad one is reported.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.output_bits != 8 && self.output_bits != 16 {
            return Err(ExportError::invalid_parameter(
                "outputBits",
                self.output_bits,
                "8 or 16",
            ));
        }
        let (power, slope) = self.gamma;
        if !(power.is_finite() && power > 0.0 && power <= 1.0) {
            return Err(ExportError::invalid_parameter(
                "gamma.power",
                power,
                "a number in (0, 1]",
            ));
        }
        if !(slope.is_finite() && slope >= 0.0) {
            return Err(ExportError::invalid_parameter(
                "gamma.slope",
                slope,
                "a number >= 0",
            ));
        }
        if !(self.bright.is_finite() && self.bright > 0.0) {
            return Err(ExportError::invalid_parameter(
                "bright",
                self.bright,
                "a number > 0",
            ));
        }
        if let Some(mul) = self.user_mul {
            if let Some(bad) = mul.iter().find(|m| !(m.is_finite() && **m >= 0.0)) {
                return Err(ExportError::invalid_parameter(
                    "userMul",
                    bad,
                    "four multipliers >= 0",
                ));
            }
        }
        Ok(())
    }
}

/// Session-wide cancel signal, checked by the decoder between stages.
///
/// Clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(DecodeError::Cancelled)` once the flag is raised.
    pub fn check(&self) -> Result<(), DecodeError> {
        if self.is_raised() {
            Err(DecodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Turns a loaded source into rasters.
///
/// `load_source` should stay cheap: the expensive work belongs in
/// `decode_to_raster`, which the decode cache calls at most once per load.
pub trait RawDecoder: Send + Sync {
    /// Per-source state produced by `load_source`.
    type Handle: Send + Sync;

    fn load_source(&self, source: SourceInput) -> Result<Self::Handle, DecodeError>;

    fn decode_to_raster(
        &self,
        handle: &Self::Handle,
        params: &DecodeParams,
        cancel: &CancelFlag,
    ) -> Result<RasterBuffer, DecodeError>;

    /// The preview the camera stored inside the file.
    ///
    /// Fails with `DecodeError::NoThumbnail` when there is none.
    fn embedded_thumbnail(&self, handle: &Self::Handle) -> Result<EmbeddedThumbnail, DecodeError>;

    fn metadata(&self, handle: &Self::Handle) -> Result<ImageMetadata, DecodeError>;

    fn lens_info(&self, _handle: &Self::Handle) -> Result<LensInfo, DecodeError> {
        Ok(LensInfo::default())
    }

    /// Sensor levels and colour data; only camera RAWs have them.
    fn color_info(&self, _handle: &Self::Handle) -> Result<ColorInfo, DecodeError> {
        Err(DecodeError::UnsupportedCamera(
            "decoder has no sensor colour data".to_string(),
        ))
    }

    /// Raw, visible and output geometry under `params`.
    fn image_sizes(
        &self,
        _handle: &Self::Handle,
        _params: &DecodeParams,
    ) -> Result<ImageSizes, DecodeError> {
        Err(DecodeError::UnsupportedCamera(
            "decoder does not report sizes".to_string(),
        ))
    }

    /// Release anything the handle holds beyond its own memory.
    fn close(&self, handle: Self::Handle) {
        drop(handle);
    }
}
