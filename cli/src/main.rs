//! Composite schedule resolver (CLI)
//!
//! Headless front end for the resolution engine: reads a charging-profile
//! set from JSON, resolves the composite schedule for a window and prints
//! the result.
//!
//! ```sh
//! # Resolve the next 24 hours from a profile dump
//! composite-schedule profiles.json
//!
//! # One hour in Watts, with a running session
//! composite-schedule profiles.json --duration 3600 --unit W \
//!     --session-start 2024-01-01T07:45:00Z
//!
//! # Machine-readable output, custom engine defaults
//! composite-schedule profiles.json --json --config engine.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tracing::error;

use smart_charging::{
    resolve_composite_schedule, ChargingProfile, RateUnit, Resolution, ScheduleConfig,
};

/// Resolve a set of charging profiles into one composite schedule.
#[derive(Parser, Debug)]
#[command(
    name = "composite-schedule",
    version,
    about = "Composite schedule resolver for EV charging profiles"
)]
struct Cli {
    /// Path to a JSON file with an array of charging profiles.
    profiles: PathBuf,

    /// Window length in seconds.
    #[arg(short, long, default_value_t = 86_400)]
    duration: i64,

    /// Output rate unit: A (Amps) or W (Watts).
    #[arg(short, long, default_value = "A")]
    unit: String,

    /// Window start (RFC 3339); defaults to the current time.
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Charging session start (RFC 3339), for Relative profiles.
    #[arg(long)]
    session_start: Option<DateTime<Utc>>,

    /// Path to an engine config file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the schedule as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ScheduleConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                error!(path = %path.display(), %err, "cannot load config");
                return ExitCode::FAILURE;
            }
        },
        None => ScheduleConfig::default(),
    };

    let profiles: Vec<ChargingProfile> = match std::fs::read_to_string(&cli.profiles)
        .map_err(|err| err.to_string())
        .and_then(|raw| serde_json::from_str(&raw).map_err(|err| err.to_string()))
    {
        Ok(profiles) => profiles,
        Err(err) => {
            error!(path = %cli.profiles.display(), %err, "cannot load profiles");
            return ExitCode::FAILURE;
        }
    };

    let rate_unit = match cli.unit.to_uppercase().as_str() {
        "A" => RateUnit::Amps,
        "W" => RateUnit::Watts,
        other => {
            error!(unit = other, "unknown rate unit, expected A or W");
            return ExitCode::FAILURE;
        }
    };

    let now = cli.now.unwrap_or_else(Utc::now);
    let window_end = now + Duration::seconds(cli.duration.max(0));

    let resolution = resolve_composite_schedule(
        now,
        window_end,
        cli.session_start,
        &profiles,
        rate_unit,
        &config,
    );

    for warning in &resolution.warnings {
        eprintln!("warning: {warning}");
    }

    if cli.json {
        match serde_json::to_string_pretty(&resolution.schedule) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(%err, "cannot serialize schedule");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_table(&resolution);
    }

    ExitCode::SUCCESS
}

fn print_table(resolution: &Resolution) {
    let schedule = &resolution.schedule;
    let unit = match schedule.rate_unit {
        RateUnit::Amps => "A",
        RateUnit::Watts => "W",
    };
    println!(
        "schedule start {}  duration {}s  unit {}",
        schedule.schedule_start.to_rfc3339(),
        schedule.duration,
        unit
    );
    for period in &schedule.periods {
        let mut line = format!("  +{:>6}s  limit {:.1} {}", period.start_period, period.limit, unit);
        if let Some(phases) = period.number_phases {
            line.push_str(&format!("  phases {phases}"));
        }
        if let Some(setpoint) = period.setpoint {
            line.push_str(&format!("  setpoint {setpoint:.1} {unit}"));
        }
        if let Some(discharge) = period.discharge_limit {
            line.push_str(&format!("  discharge {discharge:.1} {unit}"));
        }
        println!("{line}");
    }
}
