//! Geofencing - circular region monitoring over a live position stream
//!
//! This library tracks whether a device is inside or outside a set of
//! registered circular regions and reports status changes to any number of
//! observers. It does not talk to location hardware itself: the application
//! supplies a [`PositionSource`], and the engine activates it only while
//! someone is listening for events.
//!
//! # Modules
//!
//! - [`coord`] - coordinates, bounds, distance functions
//! - [`units`] - the [`Distance`] value type
//! - [`region`] - [`GeofenceRegion`] and fence files
//! - [`fence`] - per-fence status and the containment test
//! - [`position`] - the position source contract
//! - [`engine`] - the [`GeofenceEngine`] and its event stream
//! - [`config`] - engine configuration and INI loading
//! - [`logging`] - tracing subscriber setup for binaries

pub mod config;
pub mod coord;
pub mod engine;
pub mod fence;
pub mod logging;
pub mod position;
pub mod region;
pub mod units;

pub use config::{EmitPolicy, GeofenceConfig};
pub use coord::{Coordinate, DistanceCalculator, HaversineDistance};
pub use engine::{GeofenceEngine, RegionStatusStream, RegionStatusSubscription, StatusItem};
pub use fence::{GeofenceStatus, GeofenceStatusEvent};
pub use position::{ManualPositionSource, PositionFix, PositionSource, PositionSourceError};
pub use region::{GeofenceRegion, InvalidRegionError};
pub use units::Distance;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
