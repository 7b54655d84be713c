//! In-process EVC controller emulator.
//!
//! Speaks the same `GET <NAME>` / `SET <NAME> <±delta>` text protocol as the
//! real unit so the whole stack can run without a serial device.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evap_traits::Link;

use crate::error::HwError;

/// Physical state of the simulated evaporator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub fil_a: f64,
    pub emis_ma: f64,
    /// Ion current in raw controller units (amperes).
    pub flux_raw: f64,
    pub hv_v: f64,
    pub temp_c: f64,
    /// 0 = emission controlled, 1 = filament controlled.
    pub emiscon: f64,
}

impl Default for SimState {
    fn default() -> Self {
        let mut s = Self {
            fil_a: 0.0,
            emis_ma: 0.0,
            flux_raw: 0.0,
            hv_v: 0.0,
            temp_c: 22.0,
            emiscon: 1.0,
        };
        s.settle();
        s
    }
}

impl SimState {
    /// Derive the dependent readings from the emission and HV setpoints.
    fn settle(&mut self) {
        self.emis_ma = self.emis_ma.max(0.0);
        self.hv_v = self.hv_v.max(0.0);
        self.fil_a = if self.emis_ma > 0.0 {
            1.6 + 0.04 * self.emis_ma
        } else {
            0.0
        };
        self.flux_raw = self.emis_ma * self.hv_v * 1.0e-11;
        self.temp_c = 22.0 + 0.1 * self.emis_ma * self.hv_v / 100.0;
        self.emiscon = if self.emis_ma > 3.0 { 0.0 } else { 1.0 };
    }

    fn get(&self, name: &str) -> Option<f64> {
        match name {
            "FIL" => Some(self.fil_a),
            "EMIS" => Some(self.emis_ma),
            "FLUX" => Some(self.flux_raw),
            "HV" => Some(self.hv_v),
            "TEMP" => Some(self.temp_c),
            "EMISCON" => Some(self.emiscon),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SimState,
    commands: Vec<String>,
    /// One-shot canned replies keyed by upper-case parameter name.
    injected: HashMap<String, String>,
}

/// Simulated controller. Clones share state, so a test can keep a handle
/// while the link itself is owned by the client.
#[derive(Debug, Clone, Default)]
pub struct SimulatedEvc {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedEvc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with given emission and high-voltage setpoints.
    pub fn with_setpoints(emis_ma: f64, hv_v: f64) -> Self {
        let mut state = SimState {
            emis_ma,
            hv_v,
            ..SimState::default()
        };
        state.settle();
        Self::with_state(state)
    }

    pub fn with_state(state: SimState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                ..Inner::default()
            })),
        }
    }

    pub fn state(&self) -> SimState {
        self.inner
            .lock()
            .map(|g| g.state.clone())
            .unwrap_or_default()
    }

    /// Every command received so far, without the line terminator.
    pub fn commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|g| g.commands.clone())
            .unwrap_or_default()
    }

    /// Commands that changed a setpoint.
    pub fn set_commands(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with("SET "))
            .collect()
    }

    /// Answer the next `GET <name>` with `reply` instead of the state value.
    pub fn inject_reply(&self, name: &str, reply: &str) {
        if let Ok(mut g) = self.inner.lock() {
            g.injected
                .insert(name.to_ascii_uppercase(), reply.to_string());
        }
    }

    fn handle(inner: &mut Inner, command: &str) -> Result<String, HwError> {
        inner.commands.push(command.to_string());
        let mut parts = command.split_whitespace();
        let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
        let name = parts.next().unwrap_or_default().to_ascii_uppercase();
        match verb.as_str() {
            "GET" => {
                if let Some(reply) = inner.injected.remove(&name) {
                    return Ok(reply);
                }
                Ok(inner
                    .state
                    .get(&name)
                    .map(|v| format!("{v}\r\n"))
                    .unwrap_or_default())
            }
            "SET" => {
                let delta: f64 = parts
                    .next()
                    .and_then(|d| d.parse().ok())
                    .ok_or_else(|| HwError::Protocol(format!("bad SET argument: {command}")))?;
                match name.as_str() {
                    "HV" => inner.state.hv_v += delta,
                    "EMIS" => inner.state.emis_ma += delta,
                    _ => return Err(HwError::Protocol(format!("unknown SET target: {name}"))),
                }
                inner.state.settle();
                Ok(String::new())
            }
            _ => Ok(String::new()),
        }
    }
}

impl Link for SimulatedEvc {
    fn exchange(
        &mut self,
        command: &str,
        _settle: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| HwError::Protocol("simulator state poisoned".into()))?;
        let reply = Self::handle(&mut inner, command)?;
        tracing::debug!(command, reply = %reply.escape_default(), "sim exchange");
        Ok(reply)
    }
}
