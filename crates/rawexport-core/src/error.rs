//! Crate-level error taxonomy.

use std::fmt::Display;

use thiserror::Error;

use crate::decode::DecodeError;
use crate::encode::EncodeError;

/// Every failure an export operation can report.
///
/// Parameter problems are raised before any decode or encode work starts;
/// decoder and codec failures keep their original message text.
#[derive(Debug, Error)]
pub enum ExportError {
    /// An export or decode was requested before any source was loaded.
    #[error("No source loaded")]
    NotLoaded,

    /// The decoder rejected the source.
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// No decoded raster is available and none was produced on demand.
    #[error("Image has not been processed")]
    NotProcessed,

    /// An option is out of range or malformed.
    #[error("Invalid parameter '{field}': got {value}, expected {expected}")]
    InvalidParameter {
        field: String,
        value: String,
        expected: String,
    },

    /// The options are individually valid but cannot be combined.
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    /// The codec failed after validation passed.
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// Writing the encoded bytes failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ExportError {
    pub fn invalid_parameter(
        field: impl Into<String>,
        value: impl Display,
        expected: impl Into<String>,
    ) -> Self {
        ExportError::InvalidParameter {
            field: field.into(),
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Short machine-readable name, used by bindings as the error `name`.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::NotLoaded => "NotLoadedError",
            ExportError::Decode(_) => "DecodeError",
            ExportError::NotProcessed => "NotProcessedError",
            ExportError::InvalidParameter { .. } => "InvalidParameterError",
            ExportError::UnsupportedCombination(_) => "UnsupportedCombinationError",
            ExportError::Encode(_) => "EncodeError",
            ExportError::Io(_) => "IoError",
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message_names_field() {
        let err = ExportError::invalid_parameter("quality", 101, "an integer in 1..=100");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'quality': got 101, expected an integer in 1..=100"
        );
        assert_eq!(err.kind(), "InvalidParameterError");
    }

    #[test]
    fn test_decode_error_text_is_preserved() {
        let err: ExportError = DecodeError::CorruptedFile("truncated strip".into()).into();
        assert!(err.to_string().contains("truncated strip"));
        assert_eq!(err.kind(), "DecodeError");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ExportError = io.into();
        assert!(matches!(err, ExportError::Io(ref m) if m.contains("read-only")));
    }
}
