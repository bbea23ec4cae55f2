//! Stateless decode helpers that do not need a session.
//!
//! # Example
//!
//! ```typescript
//! import { is_raw_file, extract_thumbnail_bytes, read_metadata } from '@rawexport/wasm';
//!
//! if (is_raw_file(bytes)) {
//!   const preview = extract_thumbnail_bytes(bytes); // embedded JPEG, untouched
//!   const meta = read_metadata(bytes);
//!   console.log(`${meta.cameraMake} ${meta.cameraModel}, ISO ${meta.iso}`);
//! }
//! ```

use rawexport_core::decode;
use rawexport_core::ExportError;
use wasm_bindgen::prelude::*;

use crate::error::to_js;

/// Check whether `bytes` look like a TIFF-based RAW container.
#[wasm_bindgen]
pub fn is_raw_file(bytes: &[u8]) -> bool {
    decode::is_tiff_container(bytes)
}

/// Extract the embedded JPEG preview without decoding it.
///
/// Throws a `DecodeError` when the file has no usable preview.
#[wasm_bindgen]
pub fn extract_thumbnail_bytes(bytes: &[u8]) -> Result<Vec<u8>, JsValue> {
    decode::extract_embedded_jpeg(bytes)
        .map_err(ExportError::from)
        .map_err(to_js)
}

/// EXIF metadata of `bytes` as a plain object; missing fields are `undefined`.
#[wasm_bindgen]
pub fn read_metadata(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let meta = decode::read_metadata(bytes);
    serde_wasm_bindgen::to_value(&meta).map_err(JsValue::from)
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_extract_from_garbage_throws() {
        assert!(extract_thumbnail_bytes(&[1, 2, 3, 4]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_metadata_of_empty_input_is_object() {
        let meta = read_metadata(&[]).unwrap();
        assert!(meta.is_object());
    }
}
