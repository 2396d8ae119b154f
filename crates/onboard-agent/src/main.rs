//! Onboarding agent binary.
//!
//! Runs the selected phases once and exits. Transient controller failures are
//! retried indefinitely; only local misconfiguration ends the process early.

use clap::Parser;
use onboard_agent::{load_config, Agent, ThreadSleeper};
use onboard_types::{Phase, PhaseSet};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "onboard-agent", version, about = "Device onboarding agent")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ONBOARD_CONFIG_PATH")]
    config: Option<String>,

    /// Directory holding the device's credentials and state.
    dir: Option<PathBuf>,

    /// Phases to run (default: self-register lookup-param).
    phases: Vec<Phase>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("onboard-agent: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = cli.dir {
        config.device.base_dir = dir;
    }

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        path = cli.config.as_deref().unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let phases = PhaseSet::from_phases(cli.phases);
    match Agent::new(config, phases, ThreadSleeper).run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "onboarding failed");
            ExitCode::FAILURE
        }
    }
}
