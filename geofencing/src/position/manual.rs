//! In-process position source fed by the application.
//!
//! Useful when fixes come from somewhere the library does not know about
//! (a GPS daemon, a replayed track file, a simulator). Fixes pushed while the
//! source is not listening are dropped, matching how a real provider behaves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    BoxFuture, FixSender, ListenSettings, ListenerId, PositionFix, PositionSource,
    PositionSourceError,
};

/// A position source driven by explicit [`push`](Self::push) calls.
///
/// # Example
///
/// ```ignore
/// let source = Arc::new(ManualPositionSource::new());
/// let engine = GeofenceEngine::new(source.clone(), GeofenceConfig::default());
///
/// let mut sub = engine.when_region_status_changed().subscribe().await?;
/// source.push(51.5074, -0.1278);
/// ```
#[derive(Debug, Default)]
pub struct ManualPositionSource {
    listeners: Mutex<HashMap<ListenerId, FixSender>>,
    next_id: AtomicU64,
    listening: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    last_settings: Mutex<Option<ListenSettings>>,
    fail_next_start: Mutex<Option<String>>,
    next_start_delay: Mutex<Option<Duration>>,
    start_delay: Option<Duration>,
}

impl ManualPositionSource {
    /// Create a stopped source with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `start_listening` acknowledgment by `delay`.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    /// Delay only the next `start_listening` acknowledgment by `delay`.
    pub fn delay_next_start(&self, delay: Duration) {
        *self.next_start_delay.lock() = Some(delay);
    }

    /// Make the next `start_listening` call fail with `reason`.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        *self.fail_next_start.lock() = Some(reason.into());
    }

    /// Deliver a fix to every attached listener.
    ///
    /// Returns the number of listeners the fix reached. Nothing is delivered
    /// while the source is stopped.
    pub fn push(&self, latitude: f64, longitude: f64) -> usize {
        self.push_fix(PositionFix::new(latitude, longitude))
    }

    /// Deliver a fix to every attached listener.
    pub fn push_fix(&self, fix: PositionFix) -> usize {
        if !self.is_listening() {
            trace!(?fix, "Dropping fix, source not listening");
            return 0;
        }

        let listeners = self.listeners.lock();
        listeners
            .values()
            .filter(|sender| sender.send(fix).is_ok())
            .count()
    }

    /// Drop every attached sender, as if the provider went away.
    pub fn disconnect_all(&self) {
        self.listeners.lock().clear();
    }

    /// Whether the last start succeeded and no stop followed it.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Number of `start_listening` calls, including failed ones.
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::Acquire)
    }

    /// Number of `stop_listening` calls.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::Acquire)
    }

    /// Settings passed to the most recent `start_listening` call.
    pub fn last_settings(&self) -> Option<ListenSettings> {
        *self.last_settings.lock()
    }
}

impl PositionSource for ManualPositionSource {
    fn attach(&self, sender: FixSender) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, sender);
        debug!(%id, "Listener attached");
        id
    }

    fn detach(&self, id: ListenerId) {
        if self.listeners.lock().remove(&id).is_some() {
            debug!(%id, "Listener detached");
        }
    }

    fn start_listening(
        &self,
        settings: ListenSettings,
    ) -> BoxFuture<'_, Result<(), PositionSourceError>> {
        Box::pin(async move {
            self.start_calls.fetch_add(1, Ordering::AcqRel);
            *self.last_settings.lock() = Some(settings);

            let delay = self.next_start_delay.lock().take().or(self.start_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(reason) = self.fail_next_start.lock().take() {
                return Err(PositionSourceError::StartFailed(reason));
            }

            self.listening.store(true, Ordering::Release);
            Ok(())
        })
    }

    fn stop_listening(&self) -> BoxFuture<'_, Result<(), PositionSourceError>> {
        Box::pin(async move {
            self.stop_calls.fetch_add(1, Ordering::AcqRel);
            self.listening.store(false, Ordering::Release);
            Ok(())
        })
    }
}
