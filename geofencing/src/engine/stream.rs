//! Reference-counted status event stream.
//!
//! # State Machine
//!
//! ```text
//! Idle   --[first subscribe]-------> Active   attach, spawn pump, start_listening
//! Active --[subscribe]-------------> Active   observers + 1
//! Active --[unsubscribe, n > 1]----> Active   observers - 1
//! Active --[last unsubscribe]------> Idle     stop_listening, detach, cancel pump
//! Active --[shutdown]--------------> Idle     (outstanding subscriptions go stale)
//! Active --[source disconnect]-----> Dead     Err(Disconnected) to observers
//! Dead   --[subscribe]-------------> Active   stop, detach, then a fresh activation
//! Dead   --[last unsubscribe]------> Idle     stop_listening, detach
//! ```
//!
//! The observer count and the upstream handle live behind one async mutex,
//! which is held across `start_listening`. Concurrent first subscribers
//! therefore produce exactly one start call, and only a real zero crossing
//! produces a stop call.
//!
//! Events are multicast through a `tokio::sync::broadcast` channel. Observers
//! see only events sent after they subscribed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::EngineInner;
use crate::fence::GeofenceStatusEvent;
use crate::position::{ListenSettings, ListenerId, PositionFix, PositionSource, PositionSourceError};

/// Item delivered to subscribers: a status event or a stream-level error.
pub type StatusItem = Result<GeofenceStatusEvent, PositionSourceError>;

/// Upstream resources held while the stream is active.
struct ActiveUpstream {
    listener: ListenerId,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Upstream {
    observers: usize,
    /// Bumped by `shutdown` so releases from older subscriptions are ignored.
    generation: u64,
    active: Option<ActiveUpstream>,
}

/// Undoes a partially completed activation unless disarmed.
///
/// Covers both a failed `start_listening` and the subscribe future being
/// dropped while the start acknowledgment is pending.
struct ActivationGuard {
    source: Arc<dyn PositionSource>,
    upstream: Arc<Mutex<Upstream>>,
    listener: ListenerId,
    cancel: CancellationToken,
    armed: bool,
    stop_on_rollback: bool,
}

impl ActivationGuard {
    fn disarm(mut self) -> ActiveUpstream {
        self.armed = false;
        ActiveUpstream {
            listener: self.listener,
            cancel: self.cancel.clone(),
        }
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        self.cancel.cancel();
        self.source.detach(self.listener);

        // start_listening may have taken effect before we were dropped. The
        // stop runs under the upstream lock and is skipped if a newer
        // activation already owns the source.
        if self.stop_on_rollback {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let source = Arc::clone(&self.source);
                let upstream = Arc::clone(&self.upstream);
                handle.spawn(async move {
                    let upstream = upstream.lock().await;
                    if upstream.active.is_some() {
                        debug!("Skipping stop after abandoned activation, source reactivated");
                        return;
                    }
                    if let Err(err) = source.stop_listening().await {
                        warn!(error = %err, "Stop after abandoned activation failed");
                    }
                });
            }
        }

        debug!(listener = %self.listener, "Rolled back stream activation");
    }
}

/// Shared stream state owned by the engine.
pub(crate) struct StreamShared {
    engine: Arc<EngineInner>,
    source: Arc<dyn PositionSource>,
    settings: ListenSettings,
    upstream: Arc<Mutex<Upstream>>,
    observers: AtomicUsize,
    /// Pump token of the current activation, readable without the async lock.
    current: parking_lot::Mutex<Option<CancellationToken>>,
}

impl StreamShared {
    pub(crate) fn new(
        engine: Arc<EngineInner>,
        source: Arc<dyn PositionSource>,
        settings: ListenSettings,
    ) -> Self {
        Self {
            engine,
            source,
            settings,
            upstream: Arc::new(Mutex::new(Upstream::default())),
            observers: AtomicUsize::new(0),
            current: parking_lot::Mutex::new(None),
        }
    }

    /// Attach to the source, spawn the pump and start listening.
    async fn activate(&self) -> Result<ActiveUpstream, PositionSourceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = self.source.attach(tx);
        let cancel = CancellationToken::new();

        let mut guard = ActivationGuard {
            source: Arc::clone(&self.source),
            upstream: Arc::clone(&self.upstream),
            listener,
            cancel: cancel.clone(),
            armed: true,
            stop_on_rollback: true,
        };

        tokio::spawn(pump(Arc::clone(&self.engine), rx, cancel));

        match self.source.start_listening(self.settings).await {
            Ok(()) => {
                info!(
                    %listener,
                    min_interval_ms = self.settings.min_interval.as_millis() as u64,
                    min_distance_m = self.settings.min_distance.total_meters(),
                    high_accuracy = self.settings.high_accuracy,
                    "Position subscription started"
                );
                Ok(guard.disarm())
            }
            Err(err) => {
                // Source never started, so the guard only needs to detach
                guard.stop_on_rollback = false;
                warn!(error = %err, "Position source failed to start");
                Err(err)
            }
        }
    }

    async fn deactivate(&self, active: ActiveUpstream) {
        if let Err(err) = self.source.stop_listening().await {
            warn!(error = %err, "Position source failed to stop");
        }
        self.source.detach(active.listener);
        active.cancel.cancel();
        info!(listener = %active.listener, "Position subscription released");
    }

    /// Blocking variant used when a subscription is dropped outside a runtime.
    fn deactivate_blocking(&self, active: ActiveUpstream) {
        if let Err(err) = futures::executor::block_on(self.source.stop_listening()) {
            warn!(error = %err, "Position source failed to stop");
        }
        self.source.detach(active.listener);
        active.cancel.cancel();
        info!(listener = %active.listener, "Position subscription released");
    }

    async fn acquire(&self) -> Result<u64, PositionSourceError> {
        let mut upstream = self.upstream.lock().await;

        // The pump cancels its own token when the source drops the channel
        let disconnected = upstream
            .active
            .as_ref()
            .is_some_and(|active| active.cancel.is_cancelled());
        if disconnected {
            if let Some(stale) = self.take_active(&mut upstream) {
                info!(listener = %stale.listener, "Reactivating position source after disconnect");
                self.deactivate(stale).await;
            }
        }

        if upstream.active.is_none() {
            let active = self.activate().await?;
            *self.current.lock() = Some(active.cancel.clone());
            upstream.active = Some(active);
        }
        upstream.observers += 1;
        self.observers.store(upstream.observers, Ordering::Release);
        debug!(observers = upstream.observers, "Status observer attached");
        Ok(upstream.generation)
    }

    /// Decrement the count for a subscription taken in `generation`.
    ///
    /// Returns the upstream to tear down if this was the last observer.
    fn release_locked(&self, upstream: &mut Upstream, generation: u64) -> Option<ActiveUpstream> {
        if generation != upstream.generation || upstream.observers == 0 {
            return None;
        }
        upstream.observers -= 1;
        self.observers.store(upstream.observers, Ordering::Release);
        debug!(observers = upstream.observers, "Status observer detached");

        if upstream.observers == 0 {
            self.take_active(upstream)
        } else {
            None
        }
    }

    fn take_active(&self, upstream: &mut Upstream) -> Option<ActiveUpstream> {
        *self.current.lock() = None;
        upstream.active.take()
    }

    /// Whether the source is held and its fix channel is still open.
    fn is_live(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|cancel| !cancel.is_cancelled())
    }

    async fn release(&self, generation: u64) {
        let mut upstream = self.upstream.lock().await;
        if let Some(active) = self.release_locked(&mut upstream, generation) {
            self.deactivate(active).await;
        }
    }

    fn release_blocking(&self, generation: u64) {
        let mut upstream = self.upstream.blocking_lock();
        if let Some(active) = self.release_locked(&mut upstream, generation) {
            self.deactivate_blocking(active);
        }
    }

    pub(crate) async fn shutdown(&self) {
        let mut upstream = self.upstream.lock().await;
        upstream.generation += 1;
        upstream.observers = 0;
        self.observers.store(0, Ordering::Release);
        if let Some(active) = self.take_active(&mut upstream) {
            self.deactivate(active).await;
        }
    }
}

/// Forward fixes from the source to the engine until cancelled.
async fn pump(
    engine: Arc<EngineInner>,
    mut rx: mpsc::UnboundedReceiver<PositionFix>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Position pump cancelled");
                break;
            }

            fix = rx.recv() => {
                match fix {
                    Some(fix) => engine.handle_fix(fix),
                    None => {
                        warn!("Position source dropped its fix channel");
                        cancel.cancel();
                        engine.report_error(PositionSourceError::Disconnected);
                        break;
                    }
                }
            }
        }
    }
}

/// Handle to the engine's status event stream.
///
/// Cheap to clone; every clone refers to the same underlying subscription.
#[derive(Clone)]
pub struct RegionStatusStream {
    shared: Arc<StreamShared>,
}

impl RegionStatusStream {
    pub(crate) fn new(shared: Arc<StreamShared>) -> Self {
        Self { shared }
    }

    /// Attach an observer.
    ///
    /// The first observer activates the position source and waits for its
    /// start acknowledgment. If the source fails to start, the error is
    /// returned and nothing stays attached.
    pub async fn subscribe(&self) -> Result<RegionStatusSubscription, PositionSourceError> {
        // Receiver first, so events produced right after activation are not lost
        let rx = self.shared.engine.subscribe_events();
        let generation = self.shared.acquire().await?;
        Ok(RegionStatusSubscription {
            rx,
            shared: Some(Arc::clone(&self.shared)),
            generation,
        })
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.shared.observers.load(Ordering::Acquire)
    }

    /// Whether the position source is currently held and delivering fixes.
    ///
    /// False after the source disconnects, until the next subscribe
    /// reactivates it.
    pub fn is_active(&self) -> bool {
        self.shared.is_live()
    }
}

/// One observer of the status event stream.
///
/// Call [`unsubscribe`](Self::unsubscribe) to detach deterministically.
/// Dropping the subscription also detaches it: inside a tokio runtime the
/// release runs as a spawned task, outside one it runs inline.
pub struct RegionStatusSubscription {
    rx: broadcast::Receiver<StatusItem>,
    shared: Option<Arc<StreamShared>>,
    generation: u64,
}

impl RegionStatusSubscription {
    /// Wait for the next item.
    ///
    /// Returns `None` if the event channel has closed. An observer that
    /// falls behind skips the missed events.
    pub async fn recv(&mut self) -> Option<StatusItem> {
        loop {
            match self.rx.recv().await {
                Ok(item) => return Some(item),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status observer lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return the next item if one is already queued.
    pub fn try_recv(&mut self) -> Option<StatusItem> {
        loop {
            match self.rx.try_recv() {
                Ok(item) => return Some(item),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status observer lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Adapt into a `futures::Stream`. Dropping the stream detaches.
    pub fn into_stream(self) -> impl Stream<Item = StatusItem> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|item| (item, sub))
        })
    }

    /// Detach this observer, releasing the position source if it was the last.
    pub async fn unsubscribe(mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release(self.generation).await;
        }
    }
}

impl Drop for RegionStatusSubscription {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        let generation = self.generation;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    shared.release(generation).await;
                });
            }
            Err(_) => shared.release_blocking(generation),
        }
    }
}
