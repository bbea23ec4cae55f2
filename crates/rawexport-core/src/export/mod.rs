//! Export orchestration.
//!
//! A [`Session`] owns one loaded source and its cached decode, and turns
//! export requests into [`ExportResult`]s. [`convert_files`] drives one
//! session per file for batch conversion to disk.

mod batch;
mod result;
mod session;

pub use batch::{convert_files, output_path, BatchReport, FileOutcome};
pub use result::{Dimensions, ExportMetadata, ExportResult, MultiExport};
pub use session::{Session, SourceKind};
