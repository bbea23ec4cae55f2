//! Per-session memo of the decoded raster.

use std::sync::Arc;

use crate::decode::RasterBuffer;

/// The single cached raster slot of a session.
///
/// Not synchronised on its own: the session keeps it behind a mutex and
/// holds the lock across invalidate and populate.
#[derive(Debug, Default)]
pub struct DecodeCache {
    raster: Option<Arc<RasterBuffer>>,
    is_processed: bool,
    decode_count: u64,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached raster, or run `decode`, store and return its result.
    ///
    /// A failed decode leaves the cache empty.
    pub fn get_or_decode<E>(
        &mut self,
        decode: impl FnOnce() -> Result<RasterBuffer, E>,
    ) -> Result<Arc<RasterBuffer>, E> {
        if let (true, Some(raster)) = (self.is_processed, &self.raster) {
            log::debug!("decode cache hit ({}x{})", raster.width(), raster.height());
            return Ok(Arc::clone(raster));
        }

        log::debug!("decode cache miss");
        let raster = Arc::new(decode()?);
        self.decode_count += 1;
        self.raster = Some(Arc::clone(&raster));
        self.is_processed = true;
        Ok(raster)
    }

    /// The cached raster without triggering a decode.
    pub fn peek(&self) -> Option<Arc<RasterBuffer>> {
        if self.is_processed {
            self.raster.clone()
        } else {
            None
        }
    }

    /// Drop the cached raster. Exports already holding it keep their `Arc`.
    pub fn invalidate(&mut self) {
        if self.raster.take().is_some() {
            log::debug!("decode cache invalidated");
        }
        self.is_processed = false;
    }

    pub fn is_processed(&self) -> bool {
        self.is_processed
    }

    /// Number of decodes this cache has stored since it was created.
    pub fn decode_count(&self) -> u64 {
        self.decode_count
    }
}
