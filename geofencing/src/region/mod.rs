//! Circular geofence regions.
//!
//! A [`GeofenceRegion`] is an immutable value: an identifier, a center point
//! and a radius. Regions are validated when they are handed to the engine,
//! not when they are constructed, so that invalid input surfaces as an
//! [`InvalidRegionError`] at the registration call site.

mod file;

pub use file::{load_regions, parse_regions, RegionFileError, RegionRecord};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{CoordError, Coordinate};
use crate::units::Distance;

/// Errors raised when a region fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRegionError {
    /// Identifier is empty or whitespace.
    #[error("No identifier set")]
    MissingIdentifier,

    /// Center latitude outside [-90, 90].
    #[error("Invalid latitude value - {0}")]
    InvalidLatitude(f64),

    /// Center longitude outside [-180, 180].
    #[error("Invalid longitude value - {0}")]
    InvalidLongitude(f64),

    /// Radius is negative or not finite.
    #[error("Invalid radius value - {0} m")]
    InvalidRadius(f64),
}

impl From<CoordError> for InvalidRegionError {
    fn from(err: CoordError) -> Self {
        match err {
            CoordError::InvalidLatitude(lat) => InvalidRegionError::InvalidLatitude(lat),
            CoordError::InvalidLongitude(lon) => InvalidRegionError::InvalidLongitude(lon),
        }
    }
}

/// A named circular region.
///
/// The identifier is the registry key: two regions with the same identifier
/// are the same fence as far as the engine is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRegion {
    /// Unique key for this fence.
    pub identifier: String,
    /// Center of the circle.
    pub center: Coordinate,
    /// Radius of the circle.
    pub radius: Distance,
}

impl GeofenceRegion {
    /// Create a region. No validation is performed here.
    pub fn new(identifier: impl Into<String>, center: Coordinate, radius: Distance) -> Self {
        Self {
            identifier: identifier.into(),
            center,
            radius,
        }
    }

    /// Convenience constructor taking raw degrees and a radius in meters.
    pub fn from_degrees(
        identifier: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius_meters: f64,
    ) -> Self {
        Self::new(
            identifier,
            Coordinate::new(latitude, longitude),
            Distance::from_meters(radius_meters),
        )
    }

    /// Check identifier, center bounds and radius.
    pub fn validate(&self) -> Result<(), InvalidRegionError> {
        if self.identifier.trim().is_empty() {
            return Err(InvalidRegionError::MissingIdentifier);
        }

        self.center.validate()?;

        let radius = self.radius.total_meters();
        if !radius.is_finite() || radius < 0.0 {
            return Err(InvalidRegionError::InvalidRadius(radius));
        }

        Ok(())
    }
}

impl fmt::Display for GeofenceRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} r={}", self.identifier, self.center, self.radius)
    }
}
