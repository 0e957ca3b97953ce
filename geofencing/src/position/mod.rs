//! Position source abstraction.
//!
//! The engine does not own a location provider. It is handed a
//! [`PositionSource`] at construction and drives it through a small control
//! surface:
//!
//! ```text
//! Engine                         PositionSource
//!   │ attach(tx) ──────────────────► │  (returns ListenerId)
//!   │ start_listening(settings) ───► │  (async ack / failure)
//!   │ ◄──────────── PositionFix ──── │  (via tx, any number)
//!   │ stop_listening() ────────────► │
//!   │ detach(id) ──────────────────► │
//! ```
//!
//! Fixes travel over a channel the engine owns, so the engine decides when
//! the handler goes away rather than relying on the source to forget it.

mod manual;

pub use manual::ManualPositionSource;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::coord::{CoordError, Coordinate};
use crate::units::Distance;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sender half the source pushes fixes into.
pub type FixSender = mpsc::UnboundedSender<PositionFix>;

/// Default minimum time between fixes.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Default minimum movement between fixes, in meters.
pub const DEFAULT_MIN_DISTANCE_METERS: f64 = 10.0;

/// A raw position report from the source.
///
/// Fixes are not validated by the source; the engine rejects out-of-range
/// values as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionFix {
    /// Create a fix from raw degrees.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Validate the fix and convert it to a coordinate.
    pub fn to_coordinate(&self) -> Result<Coordinate, CoordError> {
        Coordinate::try_new(self.latitude, self.longitude)
    }
}

impl From<Coordinate> for PositionFix {
    fn from(coord: Coordinate) -> Self {
        Self::new(coord.latitude, coord.longitude)
    }
}

/// Parameters passed to [`PositionSource::start_listening`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenSettings {
    /// Minimum time between fixes.
    pub min_interval: Duration,
    /// Minimum movement before a new fix is reported.
    pub min_distance: Distance,
    /// Request high-accuracy (higher power) positioning.
    pub high_accuracy: bool,
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            min_distance: Distance::from_meters(DEFAULT_MIN_DISTANCE_METERS),
            high_accuracy: false,
        }
    }
}

impl ListenSettings {
    /// Set the minimum time between fixes.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set the minimum movement between fixes.
    pub fn with_min_distance(mut self, distance: Distance) -> Self {
        self.min_distance = distance;
        self
    }

    /// Request high-accuracy positioning.
    pub fn with_high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.high_accuracy = high_accuracy;
        self
    }
}

/// Handle identifying an attached fix channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Errors from the position source, delivered to stream observers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionSourceError {
    /// The source refused or failed to start.
    #[error("position source failed to start: {0}")]
    StartFailed(String),

    /// The source failed to stop.
    #[error("position source failed to stop: {0}")]
    StopFailed(String),

    /// A fix with out-of-range coordinates was delivered.
    #[error("malformed position fix ({latitude}, {longitude})")]
    MalformedFix { latitude: f64, longitude: f64 },

    /// The source dropped its end of the fix channel while still active.
    #[error("position source disconnected")]
    Disconnected,
}

/// A device location provider.
///
/// Implementations must be `Send + Sync`; the engine calls them from the
/// async runtime. Async methods return [`BoxFuture`] so the trait stays
/// usable as `Arc<dyn PositionSource>`.
pub trait PositionSource: Send + Sync {
    /// Register a channel to receive fixes.
    fn attach(&self, sender: FixSender) -> ListenerId;

    /// Remove a previously attached channel. Unknown ids are ignored.
    fn detach(&self, id: ListenerId);

    /// Begin producing fixes.
    ///
    /// The engine awaits this without a timeout; the source owns any timeout
    /// semantics.
    fn start_listening(
        &self,
        settings: ListenSettings,
    ) -> BoxFuture<'_, Result<(), PositionSourceError>>;

    /// Stop producing fixes.
    fn stop_listening(&self) -> BoxFuture<'_, Result<(), PositionSourceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_settings() {
        let settings = ListenSettings::default();
        assert_eq!(settings.min_interval, Duration::from_secs(1));
        assert_eq!(settings.min_distance.total_meters(), 10.0);
        assert!(!settings.high_accuracy);
    }

    #[test]
    fn test_listen_settings_builder() {
        let settings = ListenSettings::default()
            .with_min_interval(Duration::from_millis(250))
            .with_min_distance(Distance::from_meters(3.0))
            .with_high_accuracy(true);

        assert_eq!(settings.min_interval, Duration::from_millis(250));
        assert_eq!(settings.min_distance.total_meters(), 3.0);
        assert!(settings.high_accuracy);
    }

    #[test]
    fn test_fix_to_coordinate() {
        assert!(PositionFix::new(45.0, 90.0).to_coordinate().is_ok());
        assert!(PositionFix::new(95.0, 0.0).to_coordinate().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = PositionSourceError::MalformedFix {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert_eq!(err.to_string(), "malformed position fix (91, 0)");
        assert_eq!(
            PositionSourceError::StartFailed("permission denied".to_string()).to_string(),
            "position source failed to start: permission denied"
        );
    }
}
