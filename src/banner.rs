use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Instant,
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
    art::TextArt,
    engine::FitEngine,
    fit::ScaleFactor,
    glyph_metrics::MeasurementError,
    loader::{ArtProvider, DeliveryOutcome, LoadTicket},
    viewport::{DebounceConfig, ResizeDebouncer, SubscriptionId, ViewportSource},
};

/// Receives measurement failures raised from event-driven passes.
pub type ErrorCallback = Arc<dyn Fn(&MeasurementError) + Send + Sync>;

/// State reachable from listeners and load tickets.
pub(crate) struct Shared {
    engine: Mutex<FitEngine>,
    alive: AtomicBool,
    generation: AtomicU64,
    debouncer: Option<Mutex<ResizeDebouncer>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

impl Shared {
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn deliver_art(&self, generation: u64, art: TextArt) -> DeliveryOutcome {
        if !self.is_alive() {
            return DeliveryOutcome::TornDown;
        }

        let mut engine = self.engine.lock();
        // Checked under the engine lock so a newer load cannot slip in between.
        if generation != self.generation.load(Ordering::Acquire) {
            log::debug!("Dropping stale art load {}.", generation);
            return DeliveryOutcome::Stale;
        }

        match engine.set_art(art) {
            Ok(factor) => DeliveryOutcome::Applied(factor),
            Err(e) => {
                drop(engine);
                self.report(&e);
                DeliveryOutcome::MeasurementFailed(e)
            }
        }
    }

    fn resized(&self) {
        if !self.is_alive() {
            return;
        }

        match &self.debouncer {
            Some(debouncer) => debouncer.lock().record(Instant::now()),
            None => {
                self.engine.lock().on_viewport_change();
            }
        }
    }

    /// Runs the callback outside the lock so it may call back into the banner.
    fn report(&self, error: &MeasurementError) {
        let callback = self.on_error.lock().clone();
        if let Some(callback) = callback {
            callback(error);
        } else {
            log::error!("Unhandled banner measurement error: {}", error);
        }
    }
}

/// Owns a [`FitEngine`] together with its event sources.
///
/// Creating a banner subscribes to the engine's viewport and starts loading
/// the art; [`Banner::teardown`] (or dropping the banner) releases the
/// subscription and makes any load still in flight a no-op.
pub struct Banner {
    shared: Arc<Shared>,
    viewport: Arc<dyn ViewportSource>,
    provider: Arc<dyn ArtProvider>,
    query: String,
    subscription: Option<SubscriptionId>,
}

impl Banner {
    /// Refits on every resize notification.
    pub fn new(
        engine: FitEngine,
        provider: Arc<dyn ArtProvider>,
        query: impl Into<String>,
    ) -> Self {
        Self::build(engine, provider, query.into(), None)
    }

    /// Coalesces resize notifications; the host drives passes with
    /// [`Banner::tick`].
    pub fn with_debounce(
        engine: FitEngine,
        provider: Arc<dyn ArtProvider>,
        query: impl Into<String>,
        config: DebounceConfig,
    ) -> Self {
        Self::build(
            engine,
            provider,
            query.into(),
            Some(Mutex::new(ResizeDebouncer::new(config))),
        )
    }

    fn build(
        engine: FitEngine,
        provider: Arc<dyn ArtProvider>,
        query: String,
        debouncer: Option<Mutex<ResizeDebouncer>>,
    ) -> Self {
        let viewport = Arc::clone(engine.viewport());
        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            alive: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            debouncer,
            on_error: Mutex::new(None),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let subscription = viewport.subscribe(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.resized();
            }
        }));

        let banner = Self {
            shared,
            viewport,
            provider,
            query,
            subscription: Some(subscription),
        };
        banner.reload();
        banner
    }
}

/// events
impl Banner {
    /// Fetches the art again. Any load still in flight becomes stale.
    pub fn reload(&self) {
        if !self.is_alive() {
            log::warn!("Reload called after banner teardown.");
            return;
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let ticket = LoadTicket {
            shared: Arc::downgrade(&self.shared),
            generation,
        };
        self.provider.fetch_art(&self.query, ticket);
    }

    /// Runs a debounced resize pass once it is due.
    ///
    /// Without debouncing resizes are applied immediately and this returns
    /// `None`.
    pub fn tick(&self, now: Instant) -> Option<ScaleFactor> {
        let debouncer = self.shared.debouncer.as_ref()?;
        if !self.is_alive() || !debouncer.lock().poll(now) {
            return None;
        }

        self.shared.engine.lock().on_viewport_change()
    }

    /// Re-measures the glyph after a font, zoom or DPI change.
    ///
    /// Errors are reported to the error callback and returned. Does nothing
    /// after teardown.
    pub fn invalidate_metrics(&self) -> Result<Option<ScaleFactor>, MeasurementError> {
        if !self.is_alive() {
            log::warn!("Invalidate called after banner teardown.");
            return Ok(None);
        }

        let result = self.shared.engine.lock().invalidate_metrics();
        if let Err(e) = &result {
            self.shared.report(e);
        }
        result
    }

    /// Installs the callback that receives measurement failures.
    pub fn on_error(&self, callback: impl Fn(&MeasurementError) + Send + Sync + 'static) {
        *self.shared.on_error.lock() = Some(Arc::new(callback));
    }
}

/// access and teardown
impl Banner {
    /// Locks the engine for direct access.
    ///
    /// Resize notifications and load deliveries lock the same engine, so do
    /// not hold the guard while resizing the viewport or delivering a ticket
    /// on this thread: the lock is not reentrant.
    pub fn engine(&self) -> MutexGuard<'_, FitEngine> {
        self.shared.engine.lock()
    }

    /// Query passed to the art provider on every load.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// `false` once [`Banner::teardown`] ran.
    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Unsubscribes from the viewport and drops loads still in flight.
    ///
    /// Calling it more than once is harmless.
    pub fn teardown(&mut self) {
        self.shared.alive.store(false, Ordering::Release);
        if let Some(id) = self.subscription.take() {
            self.viewport.unsubscribe(id);
        }
    }
}

impl Drop for Banner {
    fn drop(&mut self) {
        self.teardown();
    }
}
