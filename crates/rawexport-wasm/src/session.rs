//! The `RawSession` binding.
//!
//! Methods are one-to-one passthroughs to [`rawexport_core::Session`]. Option
//! bags are plain JS objects parsed into the typed option structs; unknown
//! or mistyped fields throw an `InvalidParameterError` before any work.
//!
//! # Example
//!
//! ```typescript
//! const session = new RawSession();
//! session.loadBuffer(bytes);
//! const all = session.exportMany([
//!   { format: 'jpeg', width: 1920, quality: 80 },
//!   { format: 'png', width: 800 },
//!   { format: 'webp', width: 1920, quality: 80 },
//! ]);
//! for (let i = 0; i < all.length; i++) console.log(all.get(i).metadata);
//! ```

use rawexport_core::{
    AvifOptions, DecodeParams, ExportError, ExportRequest, JpegOptions, PngOptions, PpmOptions,
    Session, SessionConfig, ThumbnailOptions, TiffOptions, WebpOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::error::{bad_options, to_js};
use crate::types::{JsExportResult, JsMultiExport};

/// Parse an option bag; `undefined` and `null` mean "all defaults".
fn options<T: DeserializeOwned + Default>(bag: JsValue, what: &str) -> Result<T, ExportError> {
    if bag.is_undefined() || bag.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(bag).map_err(|e| bad_options(what, e))
}

fn request(bag: JsValue) -> Result<ExportRequest, ExportError> {
    ExportRequest::from_bag(serde_wasm_bindgen::Deserializer::from(bag))
}

fn to_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(JsValue::from)
}

/// One RAW-processing session: load once, export many times.
#[wasm_bindgen]
pub struct RawSession {
    inner: Session,
}

#[wasm_bindgen]
impl RawSession {
    /// Create a session. `config` is an optional
    /// `{ maxDecodedPixels, parallelExports, profile, decode }` object.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<RawSession, JsValue> {
        let config: SessionConfig = options(config, "config").map_err(to_js)?;
        let inner = Session::new(config).map_err(to_js)?;
        Ok(RawSession { inner })
    }

    /// Load file bytes, replacing any previous source and its decode.
    #[wasm_bindgen(js_name = loadBuffer)]
    pub fn load_buffer(&self, bytes: Vec<u8>) -> Result<(), JsValue> {
        self.inner.load_buffer(bytes).map_err(to_js)
    }

    pub fn close(&self) {
        self.inner.close();
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }

    #[wasm_bindgen(getter, js_name = isProcessed)]
    pub fn is_processed(&self) -> bool {
        self.inner.is_processed()
    }

    pub fn metadata(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.metadata().map_err(to_js)?)
    }

    /// `{ lensMake, lensModel, lensSerial, minFocal, maxFocal, ... }`
    #[wasm_bindgen(js_name = lensInfo)]
    pub fn lens_info(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.lens_info().map_err(to_js)?)
    }

    /// Sensor levels and multipliers; throws `DecodeError` for bitmaps.
    #[wasm_bindgen(js_name = colorInfo)]
    pub fn color_info(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.color_info().map_err(to_js)?)
    }

    /// `{ rawWidth, rawHeight, topMargin, leftMargin, width, height,
    /// outputWidth, outputHeight }`
    #[wasm_bindgen(js_name = imageSizes)]
    pub fn image_sizes(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.image_sizes().map_err(to_js)?)
    }

    /// Decode now instead of on the first export.
    pub fn process(&self) -> Result<(), JsValue> {
        self.inner.process().map(|_| ()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = decodeParams)]
    pub fn decode_params(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.decode_params())
    }

    /// Replace the decode parameters; a change drops the cached decode.
    #[wasm_bindgen(js_name = setDecodeParams)]
    pub fn set_decode_params(&self, params: JsValue) -> Result<(), JsValue> {
        let params: DecodeParams = options(params, "decodeParams").map_err(to_js)?;
        self.inner.set_decode_params(params).map_err(to_js)
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    #[wasm_bindgen(js_name = clearCancel)]
    pub fn clear_cancel(&self) {
        self.inner.clear_cancel();
    }

    /// Export from a `{ format, ...options }` bag.
    pub fn export(&self, bag: JsValue) -> Result<JsExportResult, JsValue> {
        let request = request(bag).map_err(to_js)?;
        self.inner.export(&request).map(Into::into).map_err(to_js)
    }

    /// Like `export`, but throws `NotProcessedError` instead of decoding.
    #[wasm_bindgen(js_name = exportCached)]
    pub fn export_cached(&self, bag: JsValue) -> Result<JsExportResult, JsValue> {
        let request = request(bag).map_err(to_js)?;
        self.inner.export_cached(&request).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportJpeg)]
    pub fn export_jpeg(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: JpegOptions = options(opts, "jpeg").map_err(to_js)?;
        self.inner.export_jpeg(opts).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportPng)]
    pub fn export_png(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: PngOptions = options(opts, "png").map_err(to_js)?;
        self.inner.export_png(opts).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportWebp)]
    pub fn export_webp(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: WebpOptions = options(opts, "webp").map_err(to_js)?;
        self.inner.export_webp(opts).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportAvif)]
    pub fn export_avif(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: AvifOptions = options(opts, "avif").map_err(to_js)?;
        self.inner.export_avif(opts).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportTiff)]
    pub fn export_tiff(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: TiffOptions = options(opts, "tiff").map_err(to_js)?;
        self.inner.export_tiff(opts).map(Into::into).map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportPpm)]
    pub fn export_ppm(&self) -> Result<JsExportResult, JsValue> {
        self.inner
            .export(&PpmOptions::default().into())
            .map(Into::into)
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = exportThumbnail)]
    pub fn export_thumbnail(&self, opts: JsValue) -> Result<JsExportResult, JsValue> {
        let opts: ThumbnailOptions = options(opts, "thumbnail").map_err(to_js)?;
        self.inner.export_thumbnail(opts).map(Into::into).map_err(to_js)
    }

    /// Several exports from one decode. Takes an array of `{ format, ... }` bags.
    #[wasm_bindgen(js_name = exportMany)]
    pub fn export_many(&self, bags: JsValue) -> Result<JsMultiExport, JsValue> {
        let requests: Vec<ExportRequest> =
            serde_wasm_bindgen::from_value(bags).map_err(|e| to_js(bad_options("requests", e)))?;
        self.inner.export_many(&requests).map(Into::into).map_err(to_js)
    }
}
