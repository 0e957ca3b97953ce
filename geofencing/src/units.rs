//! Distance value type.
//!
//! Radii are stored in meters; the conversions exist so callers can express
//! fences in whatever unit their source data uses.

use std::fmt;

use serde::{Deserialize, Serialize};

const METERS_PER_KILOMETER: f64 = 1000.0;
const KILOMETERS_PER_MILE: f64 = 1.609344;

/// A length, stored in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance {
    meters: f64,
}

impl Distance {
    /// Zero length.
    pub const ZERO: Distance = Distance { meters: 0.0 };

    /// Create from meters.
    pub const fn from_meters(meters: f64) -> Self {
        Self { meters }
    }

    /// Create from kilometers.
    pub fn from_kilometers(km: f64) -> Self {
        Self {
            meters: km * METERS_PER_KILOMETER,
        }
    }

    /// Create from statute miles.
    pub fn from_miles(miles: f64) -> Self {
        Self::from_kilometers(miles * KILOMETERS_PER_MILE)
    }

    /// Length in meters.
    pub const fn total_meters(&self) -> f64 {
        self.meters
    }

    /// Length in kilometers.
    pub fn total_kilometers(&self) -> f64 {
        self.meters / METERS_PER_KILOMETER
    }

    /// Length in statute miles.
    pub fn total_miles(&self) -> f64 {
        self.total_kilometers() / KILOMETERS_PER_MILE
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.meters >= METERS_PER_KILOMETER {
            write!(f, "{:.2} km", self.total_kilometers())
        } else {
            write!(f, "{:.0} m", self.meters)
        }
    }
}
