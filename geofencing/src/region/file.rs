//! JSON fence files.
//!
//! A fence file is a JSON array of flat records:
//!
//! ```json
//! [
//!   { "identifier": "office", "latitude": 51.5074, "longitude": -0.1278, "radius_m": 150 }
//! ]
//! ```
//!
//! Records are converted to [`GeofenceRegion`] values without validation;
//! validation happens when the regions are registered with the engine.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::GeofenceRegion;

/// Errors reading a fence file.
#[derive(Debug, Error)]
pub enum RegionFileError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid fence file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// On-disk representation of a single fence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub identifier: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl From<RegionRecord> for GeofenceRegion {
    fn from(record: RegionRecord) -> Self {
        GeofenceRegion::from_degrees(
            record.identifier,
            record.latitude,
            record.longitude,
            record.radius_m,
        )
    }
}

impl From<&GeofenceRegion> for RegionRecord {
    fn from(region: &GeofenceRegion) -> Self {
        Self {
            identifier: region.identifier.clone(),
            latitude: region.center.latitude,
            longitude: region.center.longitude,
            radius_m: region.radius.total_meters(),
        }
    }
}

/// Parse fence records from a JSON string.
pub fn parse_regions(json: &str) -> Result<Vec<GeofenceRegion>, RegionFileError> {
    let records: Vec<RegionRecord> = serde_json::from_str(json)?;
    Ok(records.into_iter().map(GeofenceRegion::from).collect())
}

/// Load fence records from a JSON file.
pub fn load_regions(path: &Path) -> Result<Vec<GeofenceRegion>, RegionFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| RegionFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_regions(&content)
}
