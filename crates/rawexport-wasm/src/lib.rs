//! RawExport WASM - WebAssembly bindings for rawexport-core
//!
//! This crate exposes the decode-once, export-many session to
//! JavaScript/TypeScript applications.
//!
//! # Module Structure
//!
//! - `session` - [`RawSession`], one loaded source and its cached decode
//! - `types` - JS-facing result wrappers
//! - `decode` - Stateless helpers (RAW detection, preview bytes, metadata)
//! - `error` - The single conversion from core errors to JS exceptions
//!
//! # Usage
//!
//! ```typescript
//! import init, { RawSession } from '@rawexport/wasm';
//!
//! await init();
//!
//! const session = new RawSession({ profile: 'balanced' });
//! session.loadBuffer(new Uint8Array(await file.arrayBuffer()));
//! const jpeg = session.exportJpeg({ quality: 90, width: 1920 });
//! const webp = session.exportWebp({ quality: 80, width: 1920 }); // no second decode
//! console.log(jpeg.metadata.outputDimensions, webp.bytes().byteLength);
//! ```

use wasm_bindgen::prelude::*;

mod decode;
mod error;
mod session;
mod types;

pub use decode::{extract_thumbnail_bytes, is_raw_file, read_metadata};
pub use session::RawSession;
pub use types::{JsExportResult, JsMultiExport};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), env!("CARGO_PKG_VERSION"));
    }
}
