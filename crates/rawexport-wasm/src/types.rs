//! WASM-compatible wrapper types for export results.
//!
//! Encoded bytes stay in WASM memory until `bytes()` is called, which copies
//! them out as a `Uint8Array`.

use rawexport_core::export::ExportMetadata;
use rawexport_core::{ExportResult, MultiExport};
use wasm_bindgen::prelude::*;

/// One finished export.
#[wasm_bindgen]
#[derive(Clone)]
pub struct JsExportResult {
    bytes: Vec<u8>,
    metadata: ExportMetadata,
}

#[wasm_bindgen]
impl JsExportResult {
    /// Always true; failed exports throw instead.
    #[wasm_bindgen(getter)]
    pub fn success(&self) -> bool {
        true
    }

    /// Encoded file bytes. This copies out of WASM memory.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    #[wasm_bindgen(getter, js_name = byteLength)]
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    #[wasm_bindgen(getter, js_name = mimeType)]
    pub fn mime_type(&self) -> String {
        self.metadata.format.mime_type().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn extension(&self) -> String {
        self.metadata.format.extension().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.metadata.output_dimensions.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.metadata.output_dimensions.height
    }

    /// `{ format, originalDimensions, outputDimensions, originalSize,
    /// compressedSize, compressionRatio, processingTimeMs, throughputMbps }`
    #[wasm_bindgen(getter)]
    pub fn metadata(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.metadata).map_err(JsValue::from)
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl From<ExportResult> for JsExportResult {
    fn from(result: ExportResult) -> Self {
        Self {
            bytes: result.bytes,
            metadata: result.metadata,
        }
    }
}

/// Results of `exportMany`, in request order.
#[wasm_bindgen]
pub struct JsMultiExport {
    results: Vec<JsExportResult>,
    elapsed_ms: f64,
}

#[wasm_bindgen]
impl JsMultiExport {
    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.results.len()
    }

    /// Result at `index`, or `undefined` past the end.
    pub fn get(&self, index: usize) -> Option<JsExportResult> {
        self.results.get(index).cloned()
    }

    /// Wall-clock time of the whole batch.
    #[wasm_bindgen(getter, js_name = elapsedMs)]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    #[wasm_bindgen(getter, js_name = totalBytes)]
    pub fn total_bytes(&self) -> usize {
        self.results.iter().map(|r| r.bytes.len()).sum()
    }
}

impl From<MultiExport> for JsMultiExport {
    fn from(multi: MultiExport) -> Self {
        Self {
            elapsed_ms: multi.elapsed.as_secs_f64() * 1000.0,
            results: multi.results.into_iter().map(JsExportResult::from).collect(),
        }
    }
}
