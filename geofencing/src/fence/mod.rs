//! Fence state and containment evaluation.
//!
//! # State Machine
//!
//! ```text
//! Unknown --[first fix]--> Inside | Outside   (silent)
//! Inside  --[fix]-------> Inside | Outside    (event, per EmitPolicy)
//! Outside --[fix]-------> Inside | Outside    (event, per EmitPolicy)
//! ```
//!
//! A fence never returns to `Unknown`. The first classification only
//! establishes a baseline, so subscribers do not get a spurious "entered"
//! for every fence the device happens to be in at startup.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{Coordinate, DistanceCalculator};
use crate::region::GeofenceRegion;

/// Whether the device is inside a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeofenceStatus {
    /// No fix has been evaluated against this fence yet.
    Unknown,
    /// Device is within the radius (boundary inclusive).
    Inside,
    /// Device is beyond the radius.
    Outside,
}

impl GeofenceStatus {
    /// Map a containment result to a known status.
    pub fn from_inside(inside: bool) -> Self {
        if inside {
            GeofenceStatus::Inside
        } else {
            GeofenceStatus::Outside
        }
    }

    /// True for `Inside` and `Outside`.
    pub fn is_known(&self) -> bool {
        !matches!(self, GeofenceStatus::Unknown)
    }

    /// Display name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceStatus::Unknown => "Unknown",
            GeofenceStatus::Inside => "Inside",
            GeofenceStatus::Outside => "Outside",
        }
    }
}

impl fmt::Display for GeofenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-fence bookkeeping owned by the engine.
#[derive(Debug, Clone)]
pub struct FenceState {
    region: Arc<GeofenceRegion>,
    status: GeofenceStatus,
}

impl FenceState {
    /// Create a fence in the `Unknown` state.
    pub fn new(region: GeofenceRegion) -> Self {
        Self {
            region: Arc::new(region),
            status: GeofenceStatus::Unknown,
        }
    }

    /// The monitored region, shared with emitted events.
    pub fn region(&self) -> &Arc<GeofenceRegion> {
        &self.region
    }

    /// The fence center.
    pub fn anchor(&self) -> &Coordinate {
        &self.region.center
    }

    /// Current status.
    pub fn status(&self) -> GeofenceStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: GeofenceStatus) {
        self.status = status;
    }
}

/// A status change delivered to subscribers.
///
/// `status` is always `Inside` or `Outside`; the region is shared with the
/// engine's registry entry at the time the event was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceStatusEvent {
    pub region: Arc<GeofenceRegion>,
    pub status: GeofenceStatus,
}

impl GeofenceStatusEvent {
    /// Create an event. `status` must be known.
    pub fn new(region: Arc<GeofenceRegion>, status: GeofenceStatus) -> Self {
        debug_assert!(status.is_known(), "events never carry Unknown");
        Self { region, status }
    }

    /// Identifier of the region this event is about.
    pub fn identifier(&self) -> &str {
        &self.region.identifier
    }
}

impl fmt::Display for GeofenceStatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.region.identifier, self.status)
    }
}

/// A fence could not be evaluated against a fix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The distance function returned a negative or non-finite value.
    #[error("fence '{identifier}': distance function returned {distance}")]
    InvalidDistance { identifier: String, distance: f64 },

    /// The fence radius is negative or not finite.
    #[error("fence '{identifier}': corrupt radius {radius}")]
    InvalidRadius { identifier: String, radius: f64 },
}

/// Returns true if `point` lies within the fence radius.
///
/// The boundary is inclusive: a point exactly `radius` meters from the center
/// is inside.
pub fn is_inside(
    point: &Coordinate,
    fence: &FenceState,
    distance: &dyn DistanceCalculator,
) -> Result<bool, EvaluationError> {
    let region = fence.region();
    let radius = region.radius.total_meters();
    if !radius.is_finite() || radius < 0.0 {
        return Err(EvaluationError::InvalidRadius {
            identifier: region.identifier.clone(),
            radius,
        });
    }

    let meters = distance.distance_meters(fence.anchor(), point);
    if !meters.is_finite() || meters < 0.0 {
        return Err(EvaluationError::InvalidDistance {
            identifier: region.identifier.clone(),
            distance: meters,
        });
    }

    Ok(meters <= radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(radius: f64) -> FenceState {
        FenceState::new(GeofenceRegion::from_degrees("f", 0.0, 0.0, radius))
    }

    fn fixed(meters: f64) -> impl Fn(&Coordinate, &Coordinate) -> f64 + Send + Sync {
        move |_: &Coordinate, _: &Coordinate| meters
    }

    const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);

    #[test]
    fn test_new_fence_is_unknown() {
        assert_eq!(fence(10.0).status(), GeofenceStatus::Unknown);
    }

    #[test]
    fn test_inside_when_closer_than_radius() {
        assert_eq!(is_inside(&ORIGIN, &fence(1000.0), &fixed(500.0)), Ok(true));
    }

    #[test]
    fn test_outside_when_farther_than_radius() {
        assert_eq!(is_inside(&ORIGIN, &fence(1000.0), &fixed(1500.0)), Ok(false));
    }

    #[test]
    fn test_boundary_is_inside() {
        assert_eq!(is_inside(&ORIGIN, &fence(1000.0), &fixed(1000.0)), Ok(true));
    }

    #[test]
    fn test_zero_radius_only_contains_center() {
        assert_eq!(is_inside(&ORIGIN, &fence(0.0), &fixed(0.0)), Ok(true));
        assert_eq!(is_inside(&ORIGIN, &fence(0.0), &fixed(0.001)), Ok(false));
    }

    #[test]
    fn test_nan_distance_is_error() {
        let result = is_inside(&ORIGIN, &fence(10.0), &fixed(f64::NAN));
        assert!(matches!(result, Err(EvaluationError::InvalidDistance { .. })));
    }

    #[test]
    fn test_negative_distance_is_error() {
        let result = is_inside(&ORIGIN, &fence(10.0), &fixed(-1.0));
        assert!(matches!(result, Err(EvaluationError::InvalidDistance { .. })));
    }

    #[test]
    fn test_corrupt_radius_is_error() {
        let result = is_inside(&ORIGIN, &fence(f64::INFINITY), &fixed(1.0));
        assert!(matches!(result, Err(EvaluationError::InvalidRadius { .. })));
    }

    #[test]
    fn test_distance_measured_from_anchor() {
        let state = FenceState::new(GeofenceRegion::from_degrees("f", 10.0, 20.0, 5.0));
        let seen_anchor = |a: &Coordinate, _: &Coordinate| {
            if a.latitude == 10.0 && a.longitude == 20.0 {
                0.0
            } else {
                f64::NAN
            }
        };
        assert_eq!(is_inside(&ORIGIN, &state, &seen_anchor), Ok(true));
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(GeofenceStatus::from_inside(true), GeofenceStatus::Inside);
        assert_eq!(GeofenceStatus::from_inside(false), GeofenceStatus::Outside);
        assert!(!GeofenceStatus::Unknown.is_known());
        assert_eq!(GeofenceStatus::Outside.to_string(), "Outside");
    }

    #[test]
    fn test_event_display() {
        let state = fence(1.0);
        let event = GeofenceStatusEvent::new(Arc::clone(state.region()), GeofenceStatus::Inside);
        assert_eq!(event.to_string(), "f: Inside");
        assert_eq!(event.identifier(), "f");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_inside_iff_distance_within_radius(
                radius in 0.0..100_000.0_f64,
                meters in 0.0..200_000.0_f64,
            ) {
                let inside = is_inside(&ORIGIN, &fence(radius), &fixed(meters))?;
                prop_assert_eq!(inside, meters <= radius);
            }

            #[test]
            fn test_exact_radius_always_inside(radius in 0.0..1.0e7_f64) {
                prop_assert!(is_inside(&ORIGIN, &fence(radius), &fixed(radius))?);
            }
        }
    }
}
