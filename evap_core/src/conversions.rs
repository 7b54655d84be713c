//! `From` implementations bridging `evap_config` types to `evap_core` types.

use std::time::Duration;

use crate::config::{ControllerCfg, RampCfg, SafetyCfg};
use crate::runner::MonitorParams;

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&evap_config::Config> for ControllerCfg {
    fn from(c: &evap_config::Config) -> Self {
        Self {
            flux_scale: c.controller.flux_scale,
            get_settle: Duration::from_millis(c.link.get_settle_ms),
            set_settle: Duration::from_millis(c.link.set_settle_ms),
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&evap_config::Controller> for SafetyCfg {
    fn from(c: &evap_config::Controller) -> Self {
        Self {
            max_hv_step_v: c.max_hv_step_v,
            max_emis_step_ma: c.max_emis_step_ma,
            min_emis_for_raise_ma: c.min_emis_for_raise_ma,
        }
    }
}

// ── RampCfg ──────────────────────────────────────────────────────────────────

impl From<&evap_config::Ramp> for RampCfg {
    fn from(c: &evap_config::Ramp) -> Self {
        Self {
            emis_step_ma: c.step_size,
            hv_step_v: c.hv_step_v,
            min_step_interval: Duration::from_millis(c.min_step_interval_ms),
        }
    }
}

// ── MonitorParams ────────────────────────────────────────────────────────────

impl From<&evap_config::Monitor> for MonitorParams {
    fn from(c: &evap_config::Monitor) -> Self {
        Self {
            interval: Duration::from_millis(c.poll_interval_ms),
            max_ticks: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_config_file_units() {
        let cfg = evap_config::load_toml(
            r#"
[link]
port = "/dev/ttyUSB0"
get_settle_ms = 15

[controller]
flux_scale = 1e10

[ramp]
min_step_interval_ms = 2000
"#,
        )
        .unwrap();
        let ctl = ControllerCfg::from(&cfg);
        assert_eq!(ctl.flux_scale, 1.0e10);
        assert_eq!(ctl.get_settle, Duration::from_millis(15));
        let ramp = RampCfg::from(&cfg.ramp);
        assert_eq!(ramp.min_step_interval, Duration::from_secs(2));
        assert_eq!(ramp.emis_step_ma, 0.1);
        let mon = MonitorParams::from(&cfg.monitor);
        assert_eq!(mon.interval, Duration::from_secs(2));
    }
}
