//! One RAW-processing workflow: load a source, decode it once, export many.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use web_time::Instant;

use super::result::{ExportResult, MultiExport};
use crate::cache::DecodeCache;
use crate::config::SessionConfig;
use crate::decode::{
    CancelFlag, ColorInfo, DecodeError, DecodeParams, EmbeddedThumbnail, ImageMetadata,
    ImageSizes, LensInfo, RasterBuffer, RawDecoder, RawloaderDecoder, SourceInput,
};
use crate::encode::{
    encode_thumbnail, AvifOptions, DefaultCodec, EncodePlan, ExportRequest, ImageCodec,
    JpegOptions, PngOptions, PpmOptions, ThumbnailOptions, TiffOptions, WebpOptions,
};
use crate::error::ExportError;

/// What a session currently has loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    None,
    File(PathBuf),
    Buffer { len: usize },
}

struct State<H> {
    kind: SourceKind,
    handle: Option<H>,
    cache: DecodeCache,
    decode_params: DecodeParams,
}

/// Pixels an export batch reads, fetched once under the session lock.
struct Inputs {
    raster: Option<Arc<RasterBuffer>>,
    thumbnail: Option<EmbeddedThumbnail>,
}

/// A session owning one decoder handle and one cached raster.
///
/// All methods take `&self`; a mutex around the source and cache makes
/// load, invalidate and decode atomic with respect to each other, so an
/// export never sees a half-replaced raster. Encoding runs outside the lock
/// on a shared, read-only `Arc<RasterBuffer>`.
pub struct Session<D: RawDecoder = RawloaderDecoder, C: ImageCodec = DefaultCodec> {
    decoder: D,
    codec: C,
    config: SessionConfig,
    cancel: CancelFlag,
    state: Mutex<State<D::Handle>>,
}

impl Session {
    /// A session with the default decoder and codec.
    pub fn new(config: SessionConfig) -> Result<Self, ExportError> {
        Self::with_collaborators(RawloaderDecoder::new(), DefaultCodec::new(), config)
    }
}

impl<D: RawDecoder, C: ImageCodec> Session<D, C> {
    pub fn with_collaborators(
        decoder: D,
        codec: C,
        config: SessionConfig,
    ) -> Result<Self, ExportError> {
        config.validate()?;
        let decode_params = config.decode.clone();
        Ok(Self {
            decoder,
            codec,
            config,
            cancel: CancelFlag::new(),
            state: Mutex::new(State {
                kind: SourceKind::None,
                handle: None,
                cache: DecodeCache::new(),
                decode_params,
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn lock(&self) -> MutexGuard<'_, State<D::Handle>> {
        // A panic while holding the lock leaves the state usable: every
        // mutation below is a single assignment.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------
    // Source lifecycle
    // ------------------------------------------------------------------

    /// Load a file. Any previous source and its cached raster are dropped.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref().to_path_buf();
        self.load(SourceInput::Path(path.clone()), SourceKind::File(path))
    }

    /// Load an in-memory buffer. Any previous source and its cached raster are dropped.
    pub fn load_buffer(&self, bytes: Vec<u8>) -> Result<(), ExportError> {
        let kind = SourceKind::Buffer { len: bytes.len() };
        self.load(SourceInput::Bytes(bytes), kind)
    }

    fn load(&self, input: SourceInput, kind: SourceKind) -> Result<(), ExportError> {
        let mut state = self.lock();
        state.cache.invalidate();
        if let Some(old) = state.handle.take() {
            self.decoder.close(old);
        }
        state.kind = SourceKind::None;

        let handle = self.decoder.load_source(input)?;
        log::info!("loaded source {:?}", kind);
        state.handle = Some(handle);
        state.kind = kind;
        Ok(())
    }

    /// Release the source and the cached raster.
    pub fn close(&self) {
        let mut state = self.lock();
        state.cache.invalidate();
        if let Some(handle) = state.handle.take() {
            self.decoder.close(handle);
            log::info!("closed source {:?}", state.kind);
        }
        state.kind = SourceKind::None;
    }

    pub fn source(&self) -> SourceKind {
        self.lock().kind.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().handle.is_some()
    }

    pub fn is_processed(&self) -> bool {
        self.lock().cache.is_processed()
    }

    /// Number of decodes this session has performed.
    pub fn decode_count(&self) -> u64 {
        self.lock().cache.decode_count()
    }

    pub fn metadata(&self) -> Result<ImageMetadata, ExportError> {
        let state = self.lock();
        let handle = state.handle.as_ref().ok_or(ExportError::NotLoaded)?;
        Ok(self.decoder.metadata(handle)?)
    }

    pub fn lens_info(&self) -> Result<LensInfo, ExportError> {
        let state = self.lock();
        let handle = state.handle.as_ref().ok_or(ExportError::NotLoaded)?;
        Ok(self.decoder.lens_info(handle)?)
    }

    /// Black/white levels, CFA layout and camera multipliers.
    ///
    /// Bitmap sources have none and fail with `DecodeError::UnsupportedCamera`.
    pub fn color_info(&self) -> Result<ColorInfo, ExportError> {
        let state = self.lock();
        let handle = state.handle.as_ref().ok_or(ExportError::NotLoaded)?;
        Ok(self.decoder.color_info(handle)?)
    }

    /// Sensor, visible and output sizes under the current decode parameters.
    pub fn image_sizes(&self) -> Result<ImageSizes, ExportError> {
        let state = self.lock();
        let handle = state.handle.as_ref().ok_or(ExportError::NotLoaded)?;
        Ok(self.decoder.image_sizes(handle, &state.decode_params)?)
    }

    // ------------------------------------------------------------------
    // Decode parameters and cancellation
    // ------------------------------------------------------------------

    pub fn decode_params(&self) -> DecodeParams {
        self.lock().decode_params.clone()
    }

    /// Replace the decode parameters. A changed set drops the cached raster.
    pub fn set_decode_params(&self, params: DecodeParams) -> Result<(), ExportError> {
        params.validate()?;
        let mut state = self.lock();
        if state.decode_params != params {
            state.decode_params = params;
            state.cache.invalidate();
        }
        Ok(())
    }

    /// A handle on the session's cancel flag, usable from other threads.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.raise();
    }

    pub fn clear_cancel(&self) {
        self.cancel.clear();
    }

    // ------------------------------------------------------------------
    // Decode cache
    // ------------------------------------------------------------------

    /// Decode the loaded source now, or return the cached raster.
    pub fn process(&self) -> Result<Arc<RasterBuffer>, ExportError> {
        let mut state = self.lock();
        self.raster_locked(&mut state)
    }

    /// The cached raster, without decoding.
    pub fn decoded_raster(&self) -> Option<Arc<RasterBuffer>> {
        self.lock().cache.peek()
    }

    fn raster_locked(
        &self,
        state: &mut State<D::Handle>,
    ) -> Result<Arc<RasterBuffer>, ExportError> {
        let State {
            handle,
            cache,
            decode_params,
            ..
        } = state;
        let handle = handle.as_ref().ok_or(ExportError::NotLoaded)?;
        let limit = self.config.max_decoded_pixels;

        let raster = cache.get_or_decode(|| {
            let started = Instant::now();
            let raster = self
                .decoder
                .decode_to_raster(handle, decode_params, &self.cancel)?;
            if raster.pixel_count() > limit {
                return Err(DecodeError::TooLarge {
                    pixels: raster.pixel_count(),
                    limit,
                });
            }
            log::info!(
                "decoded {}x{} ({} channels, {}-bit) in {:.1} ms",
                raster.width(),
                raster.height(),
                raster.channels(),
                raster.bits_per_channel(),
                started.elapsed().as_secs_f64() * 1000.0
            );
            Ok(raster)
        })?;
        Ok(raster)
    }

    fn gather_inputs(&self, requests: &[ExportRequest]) -> Result<Inputs, ExportError> {
        let mut state = self.lock();
        if state.handle.is_none() {
            return Err(ExportError::NotLoaded);
        }

        let raster = if requests.iter().any(|r| !r.uses_thumbnail()) {
            Some(self.raster_locked(&mut state)?)
        } else {
            None
        };
        let wants_thumbnail = requests.iter().any(ExportRequest::uses_thumbnail);
        let thumbnail = match &state.handle {
            Some(handle) if wants_thumbnail => Some(self.decoder.embedded_thumbnail(handle)?),
            _ => None,
        };
        Ok(Inputs { raster, thumbnail })
    }

    // ------------------------------------------------------------------
    // Exports
    // ------------------------------------------------------------------

    /// Export one image, decoding first if nothing is cached.
    pub fn export(&self, request: &ExportRequest) -> Result<ExportResult, ExportError> {
        request.validate(&self.codec.capabilities())?;
        let inputs = self.gather_inputs(std::slice::from_ref(request))?;
        self.encode_one(request, &inputs)
    }

    /// Export from the cached raster only.
    ///
    /// Fails with `NotProcessed` if no decode has completed since the last
    /// load; never starts a decode itself.
    pub fn export_cached(&self, request: &ExportRequest) -> Result<ExportResult, ExportError> {
        request.validate(&self.codec.capabilities())?;
        let state = self.lock();
        if state.handle.is_none() {
            return Err(ExportError::NotLoaded);
        }
        let raster = state.cache.peek().ok_or(ExportError::NotProcessed)?;
        let thumbnail = match &state.handle {
            Some(handle) if request.uses_thumbnail() => {
                Some(self.decoder.embedded_thumbnail(handle)?)
            }
            _ => None,
        };
        drop(state);
        self.encode_one(
            request,
            &Inputs {
                raster: Some(raster),
                thumbnail,
            },
        )
    }

    pub fn export_jpeg(&self, options: JpegOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    pub fn export_png(&self, options: PngOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    pub fn export_webp(&self, options: WebpOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    pub fn export_avif(&self, options: AvifOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    pub fn export_tiff(&self, options: TiffOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    pub fn export_ppm(&self) -> Result<ExportResult, ExportError> {
        self.export(&PpmOptions::default().into())
    }

    pub fn export_thumbnail(&self, options: ThumbnailOptions) -> Result<ExportResult, ExportError> {
        self.export(&options.into())
    }

    /// Export several sizes or formats from a single decode.
    ///
    /// Every request is validated before the decode starts. Encodes run on
    /// the rayon pool when `parallel_exports` is set, otherwise in order.
    /// `elapsed` is the wall-clock span of the whole call. The first failing
    /// request (in request order) fails the batch.
    pub fn export_many(&self, requests: &[ExportRequest]) -> Result<MultiExport, ExportError> {
        let started = Instant::now();
        let caps = self.codec.capabilities();
        for request in requests {
            request.validate(&caps)?;
        }
        if requests.is_empty() {
            return Ok(MultiExport {
                results: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        let inputs = self.gather_inputs(requests)?;
        let results = self.encode_all(requests, &inputs)?;
        let elapsed = started.elapsed();
        log::info!(
            "exported {} images in {:.1} ms",
            results.len(),
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(MultiExport { results, elapsed })
    }

    #[cfg(feature = "parallel")]
    fn encode_all(
        &self,
        requests: &[ExportRequest],
        inputs: &Inputs,
    ) -> Result<Vec<ExportResult>, ExportError> {
        use rayon::prelude::*;

        if self.config.parallel_exports && requests.len() > 1 {
            requests
                .par_iter()
                .map(|request| self.encode_one(request, inputs))
                .collect()
        } else {
            requests
                .iter()
                .map(|request| self.encode_one(request, inputs))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn encode_all(
        &self,
        requests: &[ExportRequest],
        inputs: &Inputs,
    ) -> Result<Vec<ExportResult>, ExportError> {
        requests
            .iter()
            .map(|request| self.encode_one(request, inputs))
            .collect()
    }

    fn encode_one(
        &self,
        request: &ExportRequest,
        inputs: &Inputs,
    ) -> Result<ExportResult, ExportError> {
        let started = Instant::now();

        let result = if let ExportRequest::Thumbnail(opts) = request {
            let thumbnail = inputs.thumbnail.as_ref().ok_or(ExportError::NotProcessed)?;
            let out = encode_thumbnail(thumbnail, opts, &self.codec, self.config.profile)?;
            ExportResult::new(
                request.format(),
                out.source_dimensions,
                out.source_size,
                out.encoded,
                started.elapsed(),
            )
        } else {
            let raster = inputs.raster.as_ref().ok_or(ExportError::NotProcessed)?;
            let plan = EncodePlan::resolve(
                request,
                raster.dimensions(),
                self.config.profile,
                &self.codec.capabilities(),
            )?;
            let encoded = self.codec.encode(raster, &plan)?;
            ExportResult::new(
                request.format(),
                raster.dimensions(),
                raster.byte_len() as u64,
                encoded,
                started.elapsed(),
            )
        };

        let meta = &result.metadata;
        log::info!(
            "{} export {}x{} -> {}x{}, {} bytes (ratio {:.2}) in {:.1} ms",
            meta.format,
            meta.original_dimensions.width,
            meta.original_dimensions.height,
            meta.output_dimensions.width,
            meta.output_dimensions.height,
            meta.compressed_size,
            meta.compression_ratio,
            meta.processing_time_ms
        );
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Convert-and-write
    // ------------------------------------------------------------------

    /// Export and write the bytes to `path`, reusing any cached decode.
    pub fn export_to_path(
        &self,
        request: &ExportRequest,
        path: impl AsRef<Path>,
    ) -> Result<ExportResult, ExportError> {
        let result = self.export(request)?;
        fs::write(path.as_ref(), &result.bytes)
            .map_err(|e| ExportError::Io(format!("{}: {e}", path.as_ref().display())))?;
        Ok(result)
    }

    /// Export and write the bytes to `sink`, reusing any cached decode.
    pub fn export_to_writer<W: Write>(
        &self,
        request: &ExportRequest,
        sink: &mut W,
    ) -> Result<ExportResult, ExportError> {
        let result = self.export(request)?;
        sink.write_all(&result.bytes)?;
        sink.flush()?;
        Ok(result)
    }
}

impl<D: RawDecoder, C: ImageCodec> Drop for Session<D, C> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = state.handle.take() {
            self.decoder.close(handle);
        }
    }
}
