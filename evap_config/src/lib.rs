#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the evaporator controller.
//!
//! `Config` and sub-structs are deserialized from TOML and validated. Only
//! `[link]` is mandatory; the device path is deployment-specific, every other
//! section carries the controller's known-safe defaults.
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Link {
    /// Serial device path, e.g. "/dev/ttyUSB0"
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Upper bound on a single reply read (ms)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// A reply is complete after this long without new bytes (ms)
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,
    /// Minimum wait after a GET before reading (ms)
    #[serde(default = "default_get_settle_ms")]
    pub get_settle_ms: u64,
    /// Minimum wait after a SET before draining (ms)
    #[serde(default = "default_set_settle_ms")]
    pub set_settle_ms: u64,
}

const fn default_baud() -> u32 {
    57_600
}
const fn default_read_timeout_ms() -> u64 {
    1000
}
const fn default_quiet_ms() -> u64 {
    20
}
const fn default_get_settle_ms() -> u64 {
    10
}
const fn default_set_settle_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Controller {
    /// Raw flux units to nA. 1e9 or 1e10 depending on firmware revision.
    pub flux_scale: f64,
    /// Largest HV change accepted in one SET (V)
    pub max_hv_step_v: f64,
    /// Largest emission change accepted in one SET (mA)
    pub max_emis_step_ma: f64,
    /// Emission must read above this before it may be raised (mA)
    pub min_emis_for_raise_ma: f64,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            flux_scale: 1.0e9,
            max_hv_step_v: 20.0,
            max_emis_step_ma: 1.5,
            min_emis_for_raise_ma: 3.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ramp {
    /// Magnitude of each emission ramp (degas) step (mA)
    pub step_size: f64,
    /// Magnitude of each high-voltage ramp step (V)
    pub hv_step_v: f64,
    /// The controller must not be commanded faster than this (ms)
    pub min_step_interval_ms: u64,
}

impl Default for Ramp {
    fn default() -> Self {
        Self {
            step_size: 0.1,
            hv_step_v: 5.0,
            min_step_interval_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub poll_interval_ms: u64,
    /// Where `monitor` flushes the sample log on exit
    pub log_path: Option<PathBuf>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            log_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub link: Link,
    #[serde(default)]
    pub controller: Controller,
    #[serde(default)]
    pub ramp: Ramp,
    #[serde(default)]
    pub monitor: Monitor,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Smallest change the controller's SET command can carry (one decimal).
pub const SET_RESOLUTION: f64 = 0.1;

#[inline]
fn positive_finite(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Link
        if self.link.port.trim().is_empty() {
            eyre::bail!("link.port must not be empty");
        }
        if self.link.baud == 0 {
            eyre::bail!("link.baud must be > 0");
        }
        if self.link.read_timeout_ms == 0 {
            eyre::bail!("link.read_timeout_ms must be >= 1");
        }
        if self.link.quiet_ms == 0 {
            eyre::bail!("link.quiet_ms must be >= 1");
        }
        if self.link.quiet_ms > self.link.read_timeout_ms {
            eyre::bail!("link.quiet_ms must not exceed link.read_timeout_ms");
        }
        if self.link.set_settle_ms > 10_000 || self.link.get_settle_ms > 10_000 {
            eyre::bail!("link settle delays are unreasonably large (>10s)");
        }

        // Controller
        if !positive_finite(self.controller.flux_scale) {
            eyre::bail!("controller.flux_scale must be a positive number");
        }
        if !positive_finite(self.controller.max_hv_step_v) {
            eyre::bail!("controller.max_hv_step_v must be > 0");
        }
        if !positive_finite(self.controller.max_emis_step_ma) {
            eyre::bail!("controller.max_emis_step_ma must be > 0");
        }
        if !self.controller.min_emis_for_raise_ma.is_finite()
            || self.controller.min_emis_for_raise_ma < 0.0
        {
            eyre::bail!("controller.min_emis_for_raise_ma must be >= 0");
        }

        // Ramp
        if !positive_finite(self.ramp.step_size) {
            eyre::bail!("ramp.step_size must be > 0");
        }
        if self.ramp.step_size < SET_RESOLUTION {
            eyre::bail!("ramp.step_size must be >= {SET_RESOLUTION} (SET resolution)");
        }
        if self.ramp.step_size > self.controller.max_emis_step_ma {
            eyre::bail!("ramp.step_size must not exceed controller.max_emis_step_ma");
        }
        if !positive_finite(self.ramp.hv_step_v) {
            eyre::bail!("ramp.hv_step_v must be > 0");
        }
        if self.ramp.hv_step_v < SET_RESOLUTION {
            eyre::bail!("ramp.hv_step_v must be >= {SET_RESOLUTION} (SET resolution)");
        }
        if self.ramp.hv_step_v > self.controller.max_hv_step_v {
            eyre::bail!("ramp.hv_step_v must not exceed controller.max_hv_step_v");
        }
        if self.ramp.min_step_interval_ms == 0 {
            eyre::bail!("ramp.min_step_interval_ms must be >= 1");
        }

        // Monitor
        if self.monitor.poll_interval_ms == 0 {
            eyre::bail!("monitor.poll_interval_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
