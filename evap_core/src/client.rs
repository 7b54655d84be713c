//! GET/SET text protocol on top of a `Link`.
//!
//! The link sits behind a mutex owned by the client: one exchange is one
//! critical section, so a background ramp and the foreground refresh can
//! share a client without their requests and replies interleaving.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use evap_traits::Link;
use tracing::{debug, info, warn};

use crate::config::ControllerCfg;
use crate::error::{EvapError, EvapResult};
use crate::hw_error::map_hw_error;
use crate::param::{EmissionMode, Param, Setpoint};

/// What a successful SET put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    pub command: String,
    /// Delta as encoded, rounded to one decimal.
    pub delta: f64,
    /// `reference + delta`: where the setpoint now stands.
    pub value: f64,
    /// Raw bytes drained after the command. The controller's acknowledgement
    /// format is undocumented, so this is diagnostic only and never parsed.
    pub reply: String,
}

pub struct ControllerClient<L: Link> {
    link: Arc<Mutex<L>>,
    cfg: ControllerCfg,
}

impl<L: Link> Clone for ControllerClient<L> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            cfg: self.cfg.clone(),
        }
    }
}

impl<L: Link> core::fmt::Debug for ControllerClient<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControllerClient")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

/// Round a delta to the one decimal the SET command carries.
pub fn quantize_delta(delta: f64) -> f64 {
    (delta * 10.0).round() / 10.0
}

/// Format a SET command. The controller takes signed deltas, not absolute
/// setpoints.
pub fn encode_set(setpoint: Setpoint, delta: f64) -> String {
    let delta = quantize_delta(delta);
    let sign = if delta < 0.0 { '-' } else { '+' };
    format!("SET {} {}{:3.1}", setpoint.wire_name(), sign, delta.abs())
}

/// Parse a GET reply. Empty, non-numeric and non-finite replies are rejected.
pub fn parse_reading(reply: &str) -> Option<f64> {
    let t = reply.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

impl<L: Link> ControllerClient<L> {
    pub fn new(link: L, cfg: ControllerCfg) -> Self {
        Self {
            link: Arc::new(Mutex::new(link)),
            cfg,
        }
    }

    pub fn config(&self) -> &ControllerCfg {
        &self.cfg
    }

    fn exchange(&self, command: &str, settle: Duration) -> EvapResult<String> {
        let mut link = self
            .link
            .lock()
            .map_err(|_| EvapError::Hardware("controller link lock poisoned".into()))?;
        let reply = link
            .exchange(command, settle)
            .map_err(|e| map_hw_error(&*e))?;
        debug!(command, reply = %reply.escape_default(), "controller exchange");
        Ok(reply)
    }

    /// Read one parameter. FLUX comes back scaled to nA.
    pub fn get(&self, param: Param) -> EvapResult<f64> {
        let reply = self.exchange(&format!("GET {}", param.wire_name()), self.cfg.get_settle)?;
        let value = parse_reading(&reply).ok_or_else(|| EvapError::MalformedReply {
            param,
            reply: reply.clone(),
        })?;
        Ok(match param {
            Param::Flux => value * self.cfg.flux_scale,
            _ => value,
        })
    }

    pub fn emission_mode(&self) -> EvapResult<EmissionMode> {
        self.get(Param::Emiscon).map(EmissionMode::from_reading)
    }

    /// Move `setpoint` from `reference` to `target` with one signed delta.
    ///
    /// Refused with `StepTooLarge`, and nothing written, when
    /// `|target - reference| > max_step`. A non-zero change that rounds to
    /// `+0.0` on the wire is refused as unsafe rather than sent as a no-op.
    pub fn set(
        &self,
        setpoint: Setpoint,
        target: f64,
        reference: f64,
        max_step: f64,
    ) -> EvapResult<SetOutcome> {
        let delta = target - reference;
        if !delta.is_finite() {
            return Err(EvapError::UnsafeOperation(format!(
                "non-finite {setpoint} change from {reference} to {target}"
            )));
        }
        if delta.abs() > max_step {
            warn!(%setpoint, target, reference, max_step, "SET refused: step too large");
            return Err(EvapError::StepTooLarge {
                setpoint,
                delta,
                max_step,
            });
        }
        let sent = quantize_delta(delta);
        if sent == 0.0 && delta != 0.0 {
            warn!(%setpoint, target, reference, "SET refused: change below wire resolution");
            return Err(EvapError::UnsafeOperation(format!(
                "{setpoint} change of {delta} rounds to zero at one decimal"
            )));
        }
        let command = encode_set(setpoint, sent);
        let reply = self.exchange(&command, self.cfg.set_settle)?;
        if !reply.trim().is_empty() {
            info!(command = %command, reply = %reply.trim(), "controller replied to SET");
        }
        Ok(SetOutcome {
            command,
            delta: sent,
            value: reference + sent,
            reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sign_and_one_decimal() {
        assert_eq!(encode_set(Setpoint::Hv, 20.0), "SET HV +20.0");
        assert_eq!(encode_set(Setpoint::Emis, -1.26), "SET EMIS -1.3");
        assert_eq!(encode_set(Setpoint::Emis, 0.1), "SET EMIS +0.1");
        assert_eq!(encode_set(Setpoint::Hv, 0.0), "SET HV +0.0");
        assert_eq!(encode_set(Setpoint::Emis, -0.04), "SET EMIS +0.0");
    }

    #[test]
    fn quantized_delta_matches_the_wire() {
        for (delta, wire) in [(0.25, "+0.3"), (-0.16, "-0.2"), (0.3 - 0.2, "+0.1"), (19.96, "+20.0")] {
            let q = quantize_delta(delta);
            assert_eq!(encode_set(Setpoint::Hv, delta), format!("SET HV {wire}"));
            assert_eq!(format!("{:+.1}", q), wire);
        }
    }

    #[test]
    fn parses_trimmed_numbers_only() {
        assert_eq!(parse_reading(" 1.804\r\n"), Some(1.804));
        assert_eq!(parse_reading("3.2e-9"), Some(3.2e-9));
        assert_eq!(parse_reading(""), None);
        assert_eq!(parse_reading("\r\n"), None);
        assert_eq!(parse_reading("ERR"), None);
        assert_eq!(parse_reading("NaN"), None);
    }
}
