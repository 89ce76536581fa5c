use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use tokio::{sync::broadcast, task};

use crate::{
    AssetId, CaptureMetadata, ElaHeatmap, ForensicsConfig, ImageAsset,
    analysis::ela::ElaEngine,
    detection::{RiskAssessment, risk::RiskScorer},
    error::{ForensicsError, Result},
    image_utils,
    metadata::exif::MetadataExtractor,
    session::{Controls, SessionEvent, SessionSnapshot, SessionState},
};

struct SessionInner {
    generation: u64,
    state: SessionState,
    asset: Option<Arc<ImageAsset>>,
    pixels: Option<Arc<RgbaImage>>,
    metadata: Option<CaptureMetadata>,
    assessment: Option<RiskAssessment>,
    heatmap: Option<Arc<ElaHeatmap>>,
    heatmap_visible: bool,
    last_error: Option<String>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            generation: 0,
            state: SessionState::Empty,
            asset: None,
            pixels: None,
            metadata: None,
            assessment: None,
            heatmap: None,
            heatmap_visible: false,
            last_error: None,
        }
    }

    /// Drops everything derived from the current image in one step.
    fn clear_asset(&mut self) {
        self.state = SessionState::Empty;
        self.asset = None;
        self.pixels = None;
        self.metadata = None;
        self.assessment = None;
        self.heatmap = None;
        self.heatmap_visible = false;
    }

    fn current_id(&self) -> Option<AssetId> {
        self.asset.as_ref().map(|asset| asset.id())
    }
}

/// Owns one image at a time and sequences extraction, scoring and on-demand ELA.
///
/// Every upload takes a new generation; results computed for an older generation are
/// discarded with [`ForensicsError::Superseded`] instead of being written back.
#[derive(Clone)]
pub struct ForensicsSession {
    inner: Arc<Mutex<SessionInner>>,
    engine: Arc<ElaEngine>,
    scorer: RiskScorer,
    events: broadcast::Sender<SessionEvent>,
}

impl ForensicsSession {
    pub fn new() -> Self {
        Self::build(ElaEngine::default(), ForensicsConfig::default().event_capacity)
    }

    pub fn with_config(config: ForensicsConfig) -> Result<Self> {
        let engine = ElaEngine::new(config.ela_quality)?.with_parallel(config.parallel);
        Ok(Self::build(engine, config.event_capacity))
    }

    pub fn with_engine(mut self, engine: ElaEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    fn build(engine: ElaEngine, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));

        Self {
            inner: Arc::new(Mutex::new(SessionInner::new())),
            engine: Arc::new(engine),
            scorer: RiskScorer::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Runs `apply` only if `id` is still the current generation.
    fn with_current<T>(&self, id: AssetId, apply: impl FnOnce(&mut SessionInner) -> T) -> Result<T> {
        let mut inner = self.inner.lock();

        if inner.generation != id.0 {
            log::debug!("discarding stale result for asset {}", id);
            return Err(ForensicsError::Superseded(id.0));
        }

        Ok(apply(&mut inner))
    }

    /// Fatal-for-asset failure: nothing about the asset stays observable.
    fn reject(&self, id: AssetId, err: ForensicsError) -> ForensicsError {
        let rejected = self.with_current(id, |inner| {
            log::warn!("asset {} rejected: {}", id, err);
            inner.clear_asset();
            inner.last_error = Some(err.to_string());

            self.emit(SessionEvent::Failed {
                asset: Some(id),
                message: err.to_string(),
            });
            self.emit(SessionEvent::StateChanged {
                asset: None,
                state: SessionState::Empty,
            });
        });

        match rejected {
            Ok(()) => err,
            Err(superseded) => superseded,
        }
    }

    /// Loads a new image, invalidating all state of the previous one.
    ///
    /// Resolves once the final assessment is in place. Observers see the partial
    /// assessment (geometry rules deferred) through [`SessionEvent::AssessmentUpdated`]
    /// before the pixels finish decoding.
    ///
    /// A file whose header cannot be read is rejected before `MetadataPending`. A file
    /// whose header reads but whose body fails to decode is only caught after the partial
    /// assessment went out: subscribers then get [`SessionEvent::Failed`] followed by
    /// `StateChanged(Empty)`, and everything published for that asset is withdrawn.
    ///
    /// The pipeline runs on its own task, so dropping this future (for example under a
    /// caller's timeout) does not leave the image half-loaded; the final assessment still lands.
    pub async fn upload(&self, bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Result<AssetId> {
        let bytes: Arc<[u8]> = bytes.into();
        let mime_type = mime_type.into();

        let id = self.begin_upload();

        let pipeline = tokio::spawn(self.clone().load(id, bytes, mime_type));

        match pipeline.await {
            Ok(loaded) => loaded,
            Err(e) => Err(self.reject(id, e.into())),
        }
    }

    /// Takes a new generation and clears the previous asset atomically.
    fn begin_upload(&self) -> AssetId {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.clear_asset();
        inner.last_error = None;

        self.emit(SessionEvent::StateChanged {
            asset: None,
            state: SessionState::Empty,
        });

        AssetId(inner.generation)
    }

    async fn load(self, id: AssetId, bytes: Arc<[u8]>, mime_type: String) -> Result<AssetId> {
        let header_bytes = Arc::clone(&bytes);
        let header = task::spawn_blocking(move || image_utils::read_header(&header_bytes))
            .await
            .map_err(ForensicsError::from)
            .and_then(|header| header);

        let (format, width, height) = match header {
            Ok(header) => header,
            Err(e) => return Err(self.reject(id, e)),
        };

        log::info!(
            "asset {} accepted: {} ({:?}, {}x{}, {} bytes)",
            id,
            mime_type,
            format,
            width,
            height,
            bytes.len()
        );

        let asset = Arc::new(ImageAsset::new(id, bytes, mime_type));

        self.with_current(id, |inner| {
            inner.asset = Some(Arc::clone(&asset));
            inner.state = SessionState::MetadataPending;

            self.emit(SessionEvent::StateChanged {
                asset: Some(id),
                state: SessionState::MetadataPending,
            });
        })?;

        let extract_bytes = asset.shared_bytes();
        let extraction = task::spawn_blocking(move || MetadataExtractor::extract(&extract_bytes));

        let decode_asset = Arc::clone(&asset);
        let decoding = task::spawn_blocking(move || decode_asset.decode());

        let metadata = match extraction.await {
            Ok(metadata) => metadata,
            Err(e) => return Err(self.reject(id, e.into())),
        };

        let partial = self.scorer.score(&metadata, asset.declared_format(), None);
        log::info!(
            "asset {} partial risk score {} (metadata found: {})",
            id,
            partial.score(),
            metadata.found
        );

        self.with_current(id, |inner| {
            inner.metadata = Some(metadata.clone());
            inner.assessment = Some(partial.clone());
            inner.state = SessionState::Assessed;

            self.emit(SessionEvent::AssessmentUpdated {
                asset: id,
                assessment: partial.clone(),
            });
            self.emit(SessionEvent::StateChanged {
                asset: Some(id),
                state: SessionState::Assessed,
            });
        })?;

        let decoded = decoding
            .await
            .map_err(ForensicsError::from)
            .and_then(|decoded| decoded);

        let pixels = match decoded {
            Ok(pixels) => pixels,
            Err(e) => return Err(self.reject(id, e)),
        };

        let refreshed = self
            .scorer
            .score(&metadata, asset.declared_format(), Some(pixels.dimensions()));
        log::info!("asset {} final risk score {}", id, refreshed.score());

        // Refresh in place: the state stays Assessed.
        self.with_current(id, |inner| {
            debug_assert!(
                inner
                    .assessment
                    .as_ref()
                    .is_none_or(|prior| refreshed.score() >= prior.score())
            );

            inner.pixels = Some(Arc::new(pixels));
            inner.assessment = Some(refreshed.clone());

            self.emit(SessionEvent::AssessmentUpdated {
                asset: id,
                assessment: refreshed,
            });
        })?;

        Ok(id)
    }

    /// Runs Error Level Analysis on the current image. At most one run per image at a time.
    pub async fn run_deep_scan(&self) -> Result<Arc<ElaHeatmap>> {
        let (id, pixels) = {
            let mut inner = self.inner.lock();

            match inner.state {
                SessionState::Assessed | SessionState::ElaReady => {}
                SessionState::ElaPending => return Err(ForensicsError::ElaInProgress),
                state => return Err(ForensicsError::InvalidState(state)),
            }

            let pixels = inner.pixels.clone().ok_or(ForensicsError::NotDecoded)?;
            let id = AssetId(inner.generation);

            inner.heatmap = None;
            inner.heatmap_visible = false;
            inner.last_error = None;
            inner.state = SessionState::ElaPending;

            self.emit(SessionEvent::StateChanged {
                asset: Some(id),
                state: SessionState::ElaPending,
            });

            (id, pixels)
        };

        log::info!("deep scan started for asset {}", id);

        let expected = pixels.dimensions();
        let engine = Arc::clone(&self.engine);
        let outcome = task::spawn_blocking(move || engine.run(&pixels))
            .await
            .map_err(ForensicsError::from)
            .and_then(|outcome| outcome);

        let mut inner = self.inner.lock();

        if inner.generation != id.0 {
            log::debug!("discarding deep scan of superseded asset {}", id);
            return Err(ForensicsError::Superseded(id.0));
        }

        match outcome {
            Ok(heatmap) => {
                assert_eq!(heatmap.dimensions(), expected, "heatmap must match its source");

                log::info!(
                    "deep scan finished for asset {}: max delta {:.3}",
                    id,
                    heatmap.max_delta
                );

                let heatmap = Arc::new(heatmap);
                inner.heatmap = Some(Arc::clone(&heatmap));
                inner.state = SessionState::ElaReady;

                self.emit(SessionEvent::HeatmapReady {
                    asset: id,
                    max_delta: heatmap.max_delta,
                });
                self.emit(SessionEvent::StateChanged {
                    asset: Some(id),
                    state: SessionState::ElaReady,
                });

                Ok(heatmap)
            }
            Err(e) => {
                log::warn!("deep scan failed for asset {}: {}", id, e);

                inner.state = SessionState::Assessed;
                inner.last_error = Some(e.to_string());

                self.emit(SessionEvent::Failed {
                    asset: Some(id),
                    message: e.to_string(),
                });
                self.emit(SessionEvent::StateChanged {
                    asset: Some(id),
                    state: SessionState::Assessed,
                });

                Err(e)
            }
        }
    }

    /// Ends the session's current image. In-flight work for it is discarded.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.clear_asset();
        inner.last_error = None;

        self.emit(SessionEvent::StateChanged {
            asset: None,
            state: SessionState::Empty,
        });
    }

    pub fn set_heatmap_visible(&self, visible: bool) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.heatmap.is_none() {
            return Err(ForensicsError::InvalidState(inner.state));
        }

        inner.heatmap_visible = visible;
        Ok(())
    }

    /// Flips heatmap visibility and returns the new value.
    pub fn toggle_heatmap(&self) -> Result<bool> {
        let mut inner = self.inner.lock();

        if inner.heatmap.is_none() {
            return Err(ForensicsError::InvalidState(inner.state));
        }

        inner.heatmap_visible = !inner.heatmap_visible;
        Ok(inner.heatmap_visible)
    }

    pub fn controls(&self) -> Controls {
        let inner = self.inner.lock();

        Controls {
            can_run_deep_scan: matches!(inner.state, SessionState::Assessed | SessionState::ElaReady)
                && inner.pixels.is_some(),
            can_reveal_heatmap: inner.heatmap.is_some(),
            heatmap_visible: inner.heatmap_visible,
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn current_asset(&self) -> Option<AssetId> {
        self.inner.lock().current_id()
    }

    pub fn metadata(&self) -> Option<CaptureMetadata> {
        self.inner.lock().metadata.clone()
    }

    pub fn assessment(&self) -> Option<RiskAssessment> {
        self.inner.lock().assessment.clone()
    }

    pub fn heatmap(&self) -> Option<Arc<ElaHeatmap>> {
        self.inner.lock().heatmap.clone()
    }

    pub fn decoded_pixels(&self) -> Option<Arc<RgbaImage>> {
        self.inner.lock().pixels.clone()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.inner.lock().pixels.as_ref().map(|pixels| pixels.dimensions())
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();

        SessionSnapshot {
            asset: inner.current_id(),
            mime_type: inner.asset.as_ref().map(|asset| asset.mime_type().to_string()),
            state: inner.state,
            dimensions: inner.pixels.as_ref().map(|pixels| pixels.dimensions()),
            metadata: inner.metadata.clone(),
            assessment: inner.assessment.clone(),
            heatmap: inner.heatmap.clone(),
            heatmap_visible: inner.heatmap_visible,
            last_error: inner.last_error.clone(),
        }
    }
}

impl Default for ForensicsSession {
    fn default() -> Self {
        Self::new()
    }
}
