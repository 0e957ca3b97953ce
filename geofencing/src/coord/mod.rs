//! Geographic coordinates and distance calculation
//!
//! Provides the validated [`Coordinate`] value type and the
//! [`DistanceCalculator`] abstraction the engine uses for containment tests.
//! The engine treats distance as a black box; [`HaversineDistance`] is the
//! default great-circle implementation.

mod types;

pub use types::{CoordError, Coordinate, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Computes the distance in meters between two coordinates.
///
/// Implementations must be pure: the same inputs always produce the same
/// result and no side effects occur. Results are expected to be finite and
/// non-negative; the fence evaluator rejects anything else.
///
/// Any `Fn(&Coordinate, &Coordinate) -> f64` closure implements this trait,
/// which keeps test doubles short:
///
/// ```
/// use geofencing::coord::{Coordinate, DistanceCalculator};
///
/// let fixed = |_: &Coordinate, _: &Coordinate| 500.0;
/// let a = Coordinate::new(0.0, 0.0);
/// assert_eq!(fixed.distance_meters(&a, &a), 500.0);
/// ```
pub trait DistanceCalculator: Send + Sync {
    /// Distance in meters from `a` to `b`.
    fn distance_meters(&self, a: &Coordinate, b: &Coordinate) -> f64;
}

impl<F> DistanceCalculator for F
where
    F: Fn(&Coordinate, &Coordinate) -> f64 + Send + Sync,
{
    fn distance_meters(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        self(a, b)
    }
}

/// Great-circle distance on a spherical Earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineDistance;

impl DistanceCalculator for HaversineDistance {
    fn distance_meters(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        haversine_meters(a, b)
    }
}

/// Great-circle distance between two points using the haversine formula.
#[inline]
pub fn haversine_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp guards against h drifting just above 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const METERS_PER_DEGREE: f64 = EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0;

    #[test]
    fn test_zero_distance() {
        let p = Coordinate::new(40.7128, -74.0060);
        assert_eq!(haversine_meters(&p, &p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let d = haversine_meters(&a, &b);
        assert!((d - METERS_PER_DEGREE).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_one_degree_longitude_at_equator() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let d = haversine_meters(&a, &b);
        assert!((d - METERS_PER_DEGREE).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_antipodal_points() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let d = haversine_meters(&a, &b);
        let half_circumference = EARTH_RADIUS_METERS * std::f64::consts::PI;
        assert!((d - half_circumference).abs() < 1.0);
    }

    #[test]
    fn test_london_to_paris() {
        // London 51.5074°N 0.1278°W, Paris 48.8566°N 2.3522°E: ~343.5 km
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        let km = haversine_meters(&london, &paris) / 1000.0;
        assert!((km - 343.5).abs() < 1.5, "got {} km", km);
    }

    #[test]
    fn test_closure_as_calculator() {
        let calc = |a: &Coordinate, b: &Coordinate| (a.latitude - b.latitude).abs();
        let a = Coordinate::new(3.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        assert_eq!(calc.distance_meters(&a, &b), 2.0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_symmetric(
                lat1 in -90.0..=90.0_f64,
                lon1 in -180.0..=180.0_f64,
                lat2 in -90.0..=90.0_f64,
                lon2 in -180.0..=180.0_f64,
            ) {
                let a = Coordinate::new(lat1, lon1);
                let b = Coordinate::new(lat2, lon2);
                let ab = HaversineDistance.distance_meters(&a, &b);
                let ba = HaversineDistance.distance_meters(&b, &a);
                prop_assert!((ab - ba).abs() < 1e-6, "ab={} ba={}", ab, ba);
            }

            #[test]
            fn test_non_negative_and_bounded(
                lat1 in -90.0..=90.0_f64,
                lon1 in -180.0..=180.0_f64,
                lat2 in -90.0..=90.0_f64,
                lon2 in -180.0..=180.0_f64,
            ) {
                let d = haversine_meters(&Coordinate::new(lat1, lon1), &Coordinate::new(lat2, lon2));
                prop_assert!(d >= 0.0);
                prop_assert!(d <= EARTH_RADIUS_METERS * std::f64::consts::PI + 1e-6);
            }
        }
    }
}
