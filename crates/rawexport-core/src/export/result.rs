//! The uniform result envelope of an export.

use std::time::Duration;

use serde::Serialize;

use crate::encode::{EncodedImage, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Size and timing figures for one export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub format: OutputFormat,
    /// Size of the raster the export started from.
    pub original_dimensions: Dimensions,
    /// Size the codec actually wrote.
    pub output_dimensions: Dimensions,
    /// Bytes of the source pixel data.
    pub original_size: u64,
    /// Bytes of the encoded output.
    pub compressed_size: u64,
    /// `original_size / compressed_size`, two decimals.
    pub compression_ratio: f64,
    pub processing_time_ms: f64,
    /// Source megabytes (MiB) per second of processing.
    pub throughput_mbps: f64,
}

/// Encoded bytes plus metadata. Only produced for complete encodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub success: bool,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub metadata: ExportMetadata,
}

impl ExportResult {
    pub(crate) fn new(
        format: OutputFormat,
        original_dimensions: (u32, u32),
        original_size: u64,
        encoded: EncodedImage,
        elapsed: Duration,
    ) -> Self {
        let compressed_size = encoded.bytes.len() as u64;
        let metadata = ExportMetadata {
            format,
            original_dimensions: original_dimensions.into(),
            output_dimensions: (encoded.width, encoded.height).into(),
            original_size,
            compressed_size,
            compression_ratio: compression_ratio(original_size, compressed_size),
            processing_time_ms: elapsed.as_secs_f64() * 1000.0,
            throughput_mbps: throughput_mbps(original_size, elapsed),
        };
        Self {
            success: true,
            bytes: encoded.bytes,
            metadata,
        }
    }
}

/// Results of a multi-export, in request order.
#[derive(Debug, Clone)]
pub struct MultiExport {
    pub results: Vec<ExportResult>,
    /// Wall-clock span covering the decode lookup and every encode.
    pub elapsed: Duration,
}

impl MultiExport {
    pub fn total_bytes(&self) -> u64 {
        self.results.iter().map(|r| r.metadata.compressed_size).sum()
    }
}

pub(crate) fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    (original as f64 / compressed as f64 * 100.0).round() / 100.0
}

pub(crate) fn throughput_mbps(original: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    original as f64 / (1024.0 * 1024.0) / secs
}
