//! Geofencing CLI - replay tracks and check points against circular fences.

mod commands;
mod error;

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

use geofencing::logging::{init_logging, LoggingConfig};

use commands::check::CheckArgs;
use commands::replay::ReplayArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geofencing")]
#[command(version = geofencing::VERSION)]
#[command(about = "Circular geofence monitoring over recorded position tracks", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a recorded track through the engine and print status events
    Replay {
        /// JSON fence file: [{"identifier", "latitude", "longitude", "radius_m"}]
        #[arg(long, value_name = "FILE")]
        fences: PathBuf,

        /// JSON track file: [{"latitude", "longitude"}]
        #[arg(long, value_name = "FILE")]
        track: PathBuf,

        /// INI configuration file (defaults to the user config directory)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Only report fences whose status changed
        #[arg(long)]
        transitions_only: bool,

        /// Delay between fixes in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 0)]
        interval_ms: u64,
    },

    /// Report which fences contain a single position
    Check {
        /// JSON fence file
        #[arg(long, value_name = "FILE")]
        fences: PathBuf,

        /// Latitude in decimal degrees
        #[arg(long = "lat", allow_negative_numbers = true)]
        latitude: f64,

        /// Longitude in decimal degrees
        #[arg(long = "lng", allow_negative_numbers = true)]
        longitude: f64,
    },
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

fn main() {
    let code = match run(Cli::parse()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut logging = LoggingConfig::default().with_level(cli.log_level());
    if let Some(path) = cli.log_file.clone() {
        logging = logging.with_file(path);
    }
    // Flushes the log file when run() returns.
    let _guard = init_logging(&logging)?;

    match cli.command {
        Commands::Replay {
            fences,
            track,
            config,
            transitions_only,
            interval_ms,
        } => commands::replay::run(ReplayArgs {
            fences,
            track,
            config,
            transitions_only,
            interval: Duration::from_millis(interval_ms),
        }),
        Commands::Check {
            fences,
            latitude,
            longitude,
        } => commands::check::run(CheckArgs {
            fences,
            latitude,
            longitude,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_check_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "geofencing", "check", "--fences", "f.json", "--lat", "-33.86", "--lng", "151.21",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                latitude,
                longitude,
                ..
            } => {
                assert_eq!(latitude, -33.86);
                assert_eq!(longitude, 151.21);
            }
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::try_parse_from([
            "geofencing", "-vv", "replay", "--fences", "f.json", "--track", "t.json",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), Level::DEBUG);

        let cli = Cli::try_parse_from([
            "geofencing", "replay", "--fences", "f.json", "--track", "t.json", "-q",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), Level::ERROR);
    }

    #[test]
    fn test_replay_defaults() {
        let cli = Cli::try_parse_from([
            "geofencing", "replay", "--fences", "f.json", "--track", "t.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay {
                config,
                transitions_only,
                interval_ms,
                ..
            } => {
                assert!(config.is_none());
                assert!(!transitions_only);
                assert_eq!(interval_ms, 0);
            }
            _ => panic!("expected replay"),
        }
    }
}
