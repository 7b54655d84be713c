//! Runtime configuration for the controller stack.
//!
//! These are separate from the TOML-deserialized config in `evap_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use crate::param::Setpoint;

/// Protocol timing and unit conversion for `ControllerClient`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerCfg {
    /// Raw flux units to nA (1e9 or 1e10 depending on firmware).
    pub flux_scale: f64,
    /// Minimum wait after a GET before reading the reply.
    pub get_settle: Duration,
    /// Minimum wait after a SET before draining.
    pub set_settle: Duration,
}

impl Default for ControllerCfg {
    fn default() -> Self {
        Self {
            flux_scale: 1.0e9,
            get_settle: Duration::from_millis(10),
            set_settle: Duration::from_millis(100),
        }
    }
}

/// Limits applied before any SET reaches the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyCfg {
    pub max_hv_step_v: f64,
    pub max_emis_step_ma: f64,
    /// Emission may only be raised while it reads above this.
    pub min_emis_for_raise_ma: f64,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            max_hv_step_v: 20.0,
            max_emis_step_ma: 1.5,
            min_emis_for_raise_ma: 3.0,
        }
    }
}

impl SafetyCfg {
    pub fn max_step(&self, setpoint: Setpoint) -> f64 {
        match setpoint {
            Setpoint::Hv => self.max_hv_step_v,
            Setpoint::Emis => self.max_emis_step_ma,
        }
    }
}

/// Ramp step sizes and the controller's command-rate floor.
#[derive(Debug, Clone, PartialEq)]
pub struct RampCfg {
    pub emis_step_ma: f64,
    pub hv_step_v: f64,
    pub min_step_interval: Duration,
}

impl Default for RampCfg {
    fn default() -> Self {
        Self {
            emis_step_ma: 0.1,
            hv_step_v: 5.0,
            min_step_interval: Duration::from_millis(1500),
        }
    }
}

impl RampCfg {
    pub fn step_for(&self, setpoint: Setpoint) -> f64 {
        match setpoint {
            Setpoint::Hv => self.hv_step_v,
            Setpoint::Emis => self.emis_step_ma,
        }
    }
}
