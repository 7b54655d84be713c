//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use evap_core::Setpoint;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "evap", version, about = "EVC evaporator controller CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/evap.toml")]
    pub config: PathBuf,

    /// Print results and logs as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Log level (error|warn|info|debug|trace); defaults to logging.level, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serial device, overriding link.port from the config
    #[arg(long, value_name = "DEVICE")]
    pub port: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Setpoints the operator may change.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ParamArg {
    /// High voltage (V)
    Hv,
    /// Emission current (mA)
    Emis,
}

impl From<ParamArg> for Setpoint {
    fn from(p: ParamArg) -> Self {
        match p {
            ParamArg::Hv => Setpoint::Hv,
            ParamArg::Emis => Setpoint::Emis,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read every parameter once and print the status block
    Status,
    /// Poll the controller periodically and record flux and emission
    Monitor {
        /// Stop after this many polls (default: until Ctrl-C)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Write the sample log here on exit (overrides monitor.log_path)
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
    },
    /// Change a setpoint in one bounded step
    Set {
        #[arg(long, value_enum)]
        param: ParamArg,
        /// Absolute target value
        #[arg(long, allow_negative_numbers = true)]
        target: f64,
    },
    /// Ramp a setpoint to a target over a duration (Ctrl-C cancels)
    Degas {
        /// Absolute target value
        #[arg(long, allow_negative_numbers = true)]
        target: f64,
        /// Ramp duration in seconds
        #[arg(long = "duration-s", value_name = "SECS")]
        duration_s: f64,
        #[arg(long, value_enum, default_value = "emis")]
        param: ParamArg,
        /// Write the sample log recorded during the ramp here
        #[arg(long, value_name = "FILE")]
        log: Option<PathBuf>,
    },
    /// Query every parameter once and report which answered
    SelfCheck,
}
