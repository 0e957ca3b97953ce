//! Replay command - feed a recorded track through the engine and print events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use geofencing::{
    EmitPolicy, GeofenceConfig, GeofenceEngine, GeofenceRegion, GeofenceStatusEvent,
    ManualPositionSource, PositionFix, PositionSourceError,
};

use super::common::{load_fences, load_track, resolve_config};
use crate::error::CliError;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub fences: PathBuf,
    pub track: PathBuf,
    pub config: Option<PathBuf>,
    pub transitions_only: bool,
    pub interval: Duration,
}

/// Outcome of a replay.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub fixes: usize,
    pub events: Vec<GeofenceStatusEvent>,
    pub rejected: Vec<PositionSourceError>,
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let mut config = resolve_config(args.config.as_deref())?;
    if args.transitions_only {
        config = config.with_emit_policy(EmitPolicy::TransitionsOnly);
    }

    let regions = load_fences(&args.fences)?;
    let track = load_track(&args.track)?;
    info!(
        fences = regions.len(),
        fixes = track.len(),
        policy = %config.emit_policy,
        "Replaying track"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let report = runtime.block_on(replay(regions, track, config, args.interval))?;

    for event in &report.events {
        println!("{}\t{}", event.identifier(), event.status);
    }
    for err in &report.rejected {
        eprintln!("warning: {}", err);
    }
    println!(
        "Replayed {} fixes: {} events, {} rejected",
        report.fixes,
        report.events.len(),
        report.rejected.len()
    );
    Ok(())
}

/// Drive `track` through a fresh engine watching `regions`.
///
/// The source is disconnected after the last fix; the resulting
/// `Disconnected` item marks the end of the replay.
pub async fn replay(
    regions: Vec<GeofenceRegion>,
    track: Vec<PositionFix>,
    config: GeofenceConfig,
    interval: Duration,
) -> Result<ReplayReport, CliError> {
    // Room for every possible event plus the end marker, so the reader never lags.
    let worst_case = track.len() * regions.len().max(1) + 1;
    let capacity = config.event_capacity.max(worst_case);
    let config = config.with_event_capacity(capacity);

    let source = Arc::new(ManualPositionSource::new());
    let engine = GeofenceEngine::new(source.clone(), config);
    for region in regions {
        let identifier = region.identifier.clone();
        engine
            .start_monitoring(region)
            .map_err(|source| CliError::InvalidFence { identifier, source })?;
    }

    let mut subscription = engine.when_region_status_changed().subscribe().await?;

    let fixes = track.len();
    let feeder = {
        let source = Arc::clone(&source);
        tokio::spawn(async move {
            for fix in track {
                source.push_fix(fix);
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }
            source.disconnect_all();
        })
    };

    let mut report = ReplayReport {
        fixes,
        ..ReplayReport::default()
    };
    while let Some(item) = subscription.recv().await {
        match item {
            Ok(event) => report.events.push(event),
            Err(PositionSourceError::Disconnected) => break,
            Err(err) => report.rejected.push(err),
        }
    }

    if let Err(e) = feeder.await {
        warn!(error = %e, "Track feeder did not finish cleanly");
    }
    subscription.unsubscribe().await;
    engine.shutdown().await;

    Ok(report)
}
