//! Viewport width source and resize notifications.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// Callback invoked after the viewport was resized.
pub type ResizeListener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ViewportSource::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Live viewport the art is fitted into.
pub trait ViewportSource: Send + Sync {
    /// Current available width in device pixels.
    fn width(&self) -> f32;
    fn subscribe(&self, listener: ResizeListener) -> SubscriptionId;
    /// Returns `false` if `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// In-memory viewport driven by the host's resize events.
pub struct SharedViewport {
    inner: Mutex<ViewportInner>,
}

struct ViewportInner {
    width: f32,
    next_id: u64,
    listeners: HashMap<SubscriptionId, ResizeListener, fxhash::FxBuildHasher>,
}

impl SharedViewport {
    /// Creates a viewport with no listeners.
    pub fn new(width: f32) -> Self {
        Self {
            inner: Mutex::new(ViewportInner {
                width,
                next_id: 0,
                listeners: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            }),
        }
    }

    /// Stores the new width and notifies every listener.
    ///
    /// Listeners run after the lock is released so they may read the width or
    /// unsubscribe.
    pub fn set_width(&self, width: f32) {
        let listeners: Vec<ResizeListener> = {
            let mut inner = self.inner.lock();
            inner.width = width;
            inner.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener();
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl ViewportSource for SharedViewport {
    fn width(&self) -> f32 {
        self.inner.lock().width
    }

    fn subscribe(&self, listener: ResizeListener) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.lock().listeners.remove(&id).is_some()
    }
}

/// Timing for [`ResizeDebouncer`].
#[derive(Clone, Debug, PartialEq)]
pub struct DebounceConfig {
    /// Quiet time after the last resize before a pass runs.
    pub delay: Duration,
    /// Upper bound on how long a burst can postpone a pass.
    pub hard_deadline: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(16),
            hard_deadline: Duration::from_millis(100),
        }
    }
}

/// Coalesces a burst of resize events into a single fit pass.
///
/// Only the fact that a resize happened is tracked: the pass reads the live
/// width when it runs, so the latest size always wins.
#[derive(Debug)]
pub struct ResizeDebouncer {
    config: DebounceConfig,
    first_pending: Option<Instant>,
    last_event: Option<Instant>,
    coalesced: u64,
}

impl ResizeDebouncer {
    /// Creates a debouncer with nothing pending.
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            first_pending: None,
            last_event: None,
            coalesced: 0,
        }
    }

    /// Records a resize event at `now`.
    pub fn record(&mut self, now: Instant) {
        if self.first_pending.is_some() {
            self.coalesced += 1;
        } else {
            self.first_pending = Some(now);
        }
        self.last_event = Some(now);
    }

    /// Returns `true` once when the pending resize should be applied.
    pub fn poll(&mut self, now: Instant) -> bool {
        let (Some(first), Some(last)) = (self.first_pending, self.last_event) else {
            return false;
        };

        let quiet = now.saturating_duration_since(last) >= self.config.delay;
        let overdue = now.saturating_duration_since(first) >= self.config.hard_deadline;

        if quiet || overdue {
            self.first_pending = None;
            self.last_event = None;
            true
        } else {
            false
        }
    }

    /// `true` while a resize waits for [`ResizeDebouncer::poll`].
    pub fn is_pending(&self) -> bool {
        self.first_pending.is_some()
    }

    /// Number of events folded into an earlier pending one.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}
