//! Conversion of core errors into JavaScript exceptions.
//!
//! Every binding maps its `ExportError` through [`to_js`], so scripts see one
//! consistent shape: an `Error` whose `name` is the error kind
//! (`InvalidParameterError`, `DecodeError`, ...) and whose `message` keeps
//! the original text.

use rawexport_core::ExportError;
use wasm_bindgen::JsValue;

pub(crate) fn to_js(err: ExportError) -> JsValue {
    let js = js_sys::Error::new(&err.to_string());
    js.set_name(err.kind());
    js.into()
}

/// An option bag that failed to deserialize.
pub(crate) fn bad_options(what: &str, err: serde_wasm_bindgen::Error) -> ExportError {
    ExportError::invalid_parameter(what, err, "a valid option object")
}
