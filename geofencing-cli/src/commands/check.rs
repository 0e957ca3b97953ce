//! Check command - evaluate a single point against every fence.

use std::path::PathBuf;

use geofencing::coord::{Coordinate, DistanceCalculator, HaversineDistance};
use geofencing::fence::{is_inside, FenceState};
use geofencing::{Distance, GeofenceRegion, GeofenceStatus};

use super::common::load_fences;
use crate::error::CliError;

/// Arguments for the check command.
pub struct CheckArgs {
    pub fences: PathBuf,
    pub latitude: f64,
    pub longitude: f64,
}

/// Containment result for one fence.
#[derive(Debug, Clone, PartialEq)]
pub struct FenceReport {
    pub identifier: String,
    pub status: GeofenceStatus,
    pub distance: Distance,
}

/// Run the check command.
pub fn run(args: CheckArgs) -> Result<(), CliError> {
    let point = Coordinate::try_new(args.latitude, args.longitude)?;
    let regions = load_fences(&args.fences)?;

    println!("Position {}", point);
    for report in evaluate(regions, &point)? {
        println!(
            "{}\t{}\t{} from center",
            report.identifier, report.status, report.distance
        );
    }
    Ok(())
}

/// Evaluate `point` against each region, in file order.
pub fn evaluate(
    regions: Vec<GeofenceRegion>,
    point: &Coordinate,
) -> Result<Vec<FenceReport>, CliError> {
    let calculator = HaversineDistance;
    regions
        .into_iter()
        .map(|region| -> Result<FenceReport, CliError> {
            let fence = FenceState::new(region);
            let inside = is_inside(point, &fence, &calculator)?;
            Ok(FenceReport {
                identifier: fence.region().identifier.clone(),
                status: GeofenceStatus::from_inside(inside),
                distance: Distance::from_meters(calculator.distance_meters(fence.anchor(), point)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_inside_and_outside() {
        let regions = vec![
            GeofenceRegion::from_degrees("near", 0.0, 0.0, 500.0),
            GeofenceRegion::from_degrees("far", 1.0, 1.0, 500.0),
        ];
        let reports = evaluate(regions, &Coordinate::new(0.001, 0.0)).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].identifier, "near");
        assert_eq!(reports[0].status, GeofenceStatus::Inside);
        assert!((reports[0].distance.total_meters() - 111.2).abs() < 1.0);
        assert_eq!(reports[1].status, GeofenceStatus::Outside);
    }

    #[test]
    fn test_evaluate_boundary_is_inside() {
        let regions = vec![GeofenceRegion::from_degrees("zero", 10.0, 10.0, 0.0)];
        let reports = evaluate(regions, &Coordinate::new(10.0, 10.0)).unwrap();
        assert_eq!(reports[0].status, GeofenceStatus::Inside);
    }

    #[test]
    fn test_run_rejects_bad_point() {
        let args = CheckArgs {
            fences: PathBuf::from("unused.json"),
            latitude: 95.0,
            longitude: 0.0,
        };
        assert!(matches!(run(args), Err(CliError::InvalidPoint(_))));
    }
}
