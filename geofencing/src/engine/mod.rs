//! Geofence engine.
//!
//! The [`GeofenceEngine`] owns the fence registry and the last known
//! position. Fixes from the position source are applied one at a time under
//! a single lock:
//!
//! ```text
//! PositionSource ──fix──► pump task ──► EngineInner::apply_fix
//!                                         │ cache last position
//!                                         │ for each fence: is_inside → status
//!                                         └──► broadcast ──► subscriptions
//! ```
//!
//! The position source is only active while at least one subscription to
//! [`GeofenceEngine::when_region_status_changed`] exists; see [`stream`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geofencing::{GeofenceConfig, GeofenceEngine, GeofenceRegion, ManualPositionSource};
//!
//! let source = Arc::new(ManualPositionSource::new());
//! let engine = GeofenceEngine::new(source.clone(), GeofenceConfig::default());
//!
//! engine.start_monitoring(GeofenceRegion::from_degrees("office", 51.5074, -0.1278, 150.0))?;
//!
//! let mut events = engine.when_region_status_changed().subscribe().await?;
//! source.push(51.5074, -0.1278);
//! while let Some(Ok(event)) = events.recv().await {
//!     println!("{}", event);
//! }
//! ```

pub mod stream;

pub use stream::{RegionStatusStream, RegionStatusSubscription, StatusItem};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::config::{EmitPolicy, GeofenceConfig};
use crate::coord::{Coordinate, DistanceCalculator, HaversineDistance};
use crate::fence::{is_inside, FenceState, GeofenceStatus, GeofenceStatusEvent};
use crate::position::{PositionFix, PositionSource, PositionSourceError};
use crate::region::{GeofenceRegion, InvalidRegionError};

use stream::StreamShared;

/// Registry and position cache, guarded together.
#[derive(Debug, Default)]
struct EngineState {
    fences: HashMap<String, FenceState>,
    last_position: Option<Coordinate>,
}

/// State shared between the engine handle and the pump task.
pub(crate) struct EngineInner {
    state: Mutex<EngineState>,
    distance: Arc<dyn DistanceCalculator>,
    emit_policy: EmitPolicy,
    events: broadcast::Sender<StatusItem>,
}

impl EngineInner {
    fn new(distance: Arc<dyn DistanceCalculator>, config: &GeofenceConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: Mutex::new(EngineState::default()),
            distance,
            emit_policy: config.emit_policy,
            events,
        }
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<StatusItem> {
        self.events.subscribe()
    }

    /// Report a stream-level error to every observer.
    pub(crate) fn report_error(&self, err: PositionSourceError) {
        // No receivers is not an error here
        let _ = self.events.send(Err(err));
    }

    /// Validate a raw fix and apply it, reporting malformed fixes to observers.
    pub(crate) fn handle_fix(&self, fix: PositionFix) {
        match fix.to_coordinate() {
            Ok(point) => {
                let emitted = self.apply_fix(point);
                trace!(%point, emitted, "Applied position fix");
            }
            Err(err) => {
                warn!(error = %err, "Ignoring malformed position fix");
                self.report_error(PositionSourceError::MalformedFix {
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                });
            }
        }
    }

    /// Cache `point` and re-evaluate every fence against it.
    ///
    /// Events are sent while the state lock is held so that concurrent
    /// callers cannot interleave their emissions. Returns the number of
    /// events emitted.
    fn apply_fix(&self, point: Coordinate) -> usize {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.last_position = Some(point);

        let mut emitted = 0;
        for fence in state.fences.values_mut() {
            let inside = match is_inside(&point, fence, self.distance.as_ref()) {
                Ok(inside) => inside,
                Err(err) => {
                    warn!(error = %err, "Skipping fence for this fix");
                    continue;
                }
            };

            let previous = fence.status();
            let status = GeofenceStatus::from_inside(inside);
            fence.set_status(status);

            if self.should_emit(previous, status) {
                let event = GeofenceStatusEvent::new(Arc::clone(fence.region()), status);
                debug!(identifier = %event.identifier(), %status, "Fence status event");
                let _ = self.events.send(Ok(event));
                emitted += 1;
            }
        }

        emitted
    }

    fn should_emit(&self, previous: GeofenceStatus, current: GeofenceStatus) -> bool {
        match previous {
            // First observation establishes the baseline silently
            GeofenceStatus::Unknown => false,
            _ => match self.emit_policy {
                EmitPolicy::EveryUpdate => true,
                EmitPolicy::TransitionsOnly => previous != current,
            },
        }
    }
}

/// Monitors circular regions against a live position stream.
///
/// Cloning the engine yields another handle to the same registry and stream.
#[derive(Clone)]
pub struct GeofenceEngine {
    inner: Arc<EngineInner>,
    stream: Arc<StreamShared>,
}

impl GeofenceEngine {
    /// Create an engine using great-circle distance.
    pub fn new(source: Arc<dyn PositionSource>, config: GeofenceConfig) -> Self {
        Self::with_distance(source, Arc::new(HaversineDistance), config)
    }

    /// Create an engine with a custom distance function.
    pub fn with_distance(
        source: Arc<dyn PositionSource>,
        distance: Arc<dyn DistanceCalculator>,
        config: GeofenceConfig,
    ) -> Self {
        let inner = Arc::new(EngineInner::new(distance, &config));
        let stream = Arc::new(StreamShared::new(Arc::clone(&inner), source, config.listen));
        Self { inner, stream }
    }

    /// Start monitoring a region.
    ///
    /// If a position is already known the fence is classified against it
    /// immediately, without emitting an event. Registering an identifier
    /// that is already monitored replaces the previous fence and its status.
    pub fn start_monitoring(&self, region: GeofenceRegion) -> Result<(), InvalidRegionError> {
        region.validate()?;

        let mut fence = FenceState::new(region);
        let mut state = self.inner.state.lock();

        if let Some(point) = state.last_position {
            match is_inside(&point, &fence, self.inner.distance.as_ref()) {
                Ok(inside) => fence.set_status(GeofenceStatus::from_inside(inside)),
                Err(err) => warn!(error = %err, "Could not seed fence status, leaving Unknown"),
            }
        }

        let identifier = fence.region().identifier.clone();
        let status = fence.status();
        if state.fences.insert(identifier.clone(), fence).is_some() {
            debug!(%identifier, %status, "Replaced monitored region");
        } else {
            debug!(%identifier, %status, "Monitoring region");
        }

        Ok(())
    }

    /// Stop monitoring a region. Unknown regions are ignored.
    ///
    /// Returns true if the region was being monitored.
    pub fn stop_monitoring(&self, region: &GeofenceRegion) -> bool {
        self.stop_monitoring_id(&region.identifier)
    }

    /// Stop monitoring the region with the given identifier.
    pub fn stop_monitoring_id(&self, identifier: &str) -> bool {
        let removed = self.inner.state.lock().fences.remove(identifier).is_some();
        if removed {
            debug!(%identifier, "Stopped monitoring region");
        }
        removed
    }

    /// Stop monitoring every region.
    pub fn stop_all_monitoring(&self) {
        let mut state = self.inner.state.lock();
        let count = state.fences.len();
        state.fences.clear();
        debug!(count, "Stopped monitoring all regions");
    }

    /// Snapshot of the monitored regions, ordered by identifier.
    pub fn monitored_regions(&self) -> Vec<GeofenceRegion> {
        let state = self.inner.state.lock();
        let mut regions: Vec<GeofenceRegion> = state
            .fences
            .values()
            .map(|fence| GeofenceRegion::clone(fence.region()))
            .collect();
        regions.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        regions
    }

    /// Current status of a monitored region.
    pub fn status_of(&self, identifier: &str) -> Option<GeofenceStatus> {
        self.inner
            .state
            .lock()
            .fences
            .get(identifier)
            .map(FenceState::status)
    }

    /// The most recent valid position, if any fix has been applied.
    pub fn last_known_position(&self) -> Option<Coordinate> {
        self.inner.state.lock().last_position
    }

    /// The shared status event stream.
    pub fn when_region_status_changed(&self) -> RegionStatusStream {
        RegionStatusStream::new(Arc::clone(&self.stream))
    }

    /// Release the position source regardless of outstanding subscriptions.
    ///
    /// Existing subscriptions stay open but receive no further events until
    /// the stream is subscribed to again.
    pub async fn shutdown(&self) {
        self.stream.shutdown().await;
    }
}
