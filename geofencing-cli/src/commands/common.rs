//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use geofencing::config::ConfigFile;
use geofencing::region::load_regions;
use geofencing::{GeofenceConfig, GeofenceRegion, PositionFix};

use crate::error::CliError;

/// Resolve engine configuration: explicit path > default path > built-in defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<GeofenceConfig, CliError> {
    let file = match path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_or_default()?,
    };
    Ok(file.config)
}

/// Load fences and validate every one of them up front.
pub fn load_fences(path: &Path) -> Result<Vec<GeofenceRegion>, CliError> {
    let regions = load_regions(path)?;
    for region in &regions {
        region.validate().map_err(|source| CliError::InvalidFence {
            identifier: region.identifier.clone(),
            source,
        })?;
    }
    Ok(regions)
}

/// Load a recorded track: a JSON array of `{latitude, longitude}` objects.
pub fn load_track(path: &Path) -> Result<Vec<PositionFix>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|e| track_error(path, e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| track_error(path, e.to_string()))
}

fn track_error(path: &Path, message: String) -> CliError {
    CliError::Track {
        path: PathBuf::from(path),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_track() {
        let file = write_temp(r#"[{"latitude": 1.5, "longitude": 2.5}, {"latitude": 0, "longitude": 0}]"#);
        let track = load_track(file.path()).unwrap();
        assert_eq!(track, vec![PositionFix::new(1.5, 2.5), PositionFix::new(0.0, 0.0)]);
    }

    #[test]
    fn test_load_track_bad_json() {
        let file = write_temp("not json");
        assert!(matches!(
            load_track(file.path()),
            Err(CliError::Track { .. })
        ));
    }

    #[test]
    fn test_load_fences_rejects_invalid() {
        let file = write_temp(
            r#"[{"identifier": "ok", "latitude": 0, "longitude": 0, "radius_m": 5},
                {"identifier": "bad", "latitude": 0, "longitude": 200, "radius_m": 5}]"#,
        );
        match load_fences(file.path()) {
            Err(CliError::InvalidFence { identifier, .. }) => assert_eq!(identifier, "bad"),
            other => panic!("expected InvalidFence, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_config_from_file() {
        let file = write_temp("[events]\nemit_policy = transitions_only\n");
        let config = resolve_config(Some(file.path())).unwrap();
        assert_eq!(
            config.emit_policy,
            geofencing::EmitPolicy::TransitionsOnly
        );
    }
}
