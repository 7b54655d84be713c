//! Cached parameter readings and the safety rules that guard every SET.

use std::sync::{Mutex, MutexGuard, PoisonError};

use evap_traits::Link;
use tracing::{info, warn};

use crate::client::{ControllerClient, SetOutcome};
use crate::config::SafetyCfg;
use crate::error::{EvapError, EvapResult};
use crate::param::{EmissionMode, Param, ParameterSnapshot, Reading, Setpoint};

/// Last-known controller state plus the validated setter built on it.
///
/// All methods take `&self` so the state can be shared (`Arc`) between the
/// polling loop and a background ramp.
pub struct ParameterState<L: Link> {
    client: ControllerClient<L>,
    safety: SafetyCfg,
    cache: Mutex<ParameterSnapshot>,
}

impl<L: Link> core::fmt::Debug for ParameterState<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ParameterState")
            .field("safety", &self.safety)
            .field("cache", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl<L: Link> ParameterState<L> {
    pub fn new(client: ControllerClient<L>, safety: SafetyCfg) -> Self {
        Self {
            client,
            safety,
            cache: Mutex::new(ParameterSnapshot::default()),
        }
    }

    pub fn client(&self) -> &ControllerClient<L> {
        &self.client
    }

    pub fn safety(&self) -> &SafetyCfg {
        &self.safety
    }

    fn cache(&self) -> MutexGuard<'_, ParameterSnapshot> {
        // The snapshot is plain data; a panic elsewhere cannot leave it torn.
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached snapshot, without touching the controller.
    pub fn snapshot(&self) -> ParameterSnapshot {
        *self.cache()
    }

    fn read(&self, param: Param) -> Reading {
        match self.client.get(param) {
            Ok(v) => Reading::Known(v),
            Err(e) => {
                warn!(%param, error = %e, "reading unavailable");
                Reading::Unknown
            }
        }
    }

    /// Re-read every parameter (FIL, EMIS, FLUX, HV, TEMP, EMISCON).
    ///
    /// A failing field becomes `Unknown`; the others are still read.
    pub fn refresh(&self) -> ParameterSnapshot {
        // Held for the whole pass: a SET that lands mid-refresh must not be
        // overwritten by a reading taken before it.
        let mut cache = self.cache();
        let snap = ParameterSnapshot {
            filament_current: self.read(Param::Fil),
            emission_current: self.read(Param::Emis),
            flux: self.read(Param::Flux),
            high_voltage: self.read(Param::Hv),
            temperature: self.read(Param::Temp),
            emission_mode: self.read(Param::Emiscon).map(EmissionMode::from_reading),
        };
        *cache = snap;
        snap
    }

    /// Command `setpoint` to `target`, using the cached reading as reference.
    ///
    /// On success the cache holds the value actually commanded (reference
    /// plus the delta as encoded), so consecutive commands compose without a
    /// refresh in between.
    pub fn set_immediate(&self, setpoint: Setpoint, target: f64) -> EvapResult<SetOutcome> {
        // Held across the exchange: reference, command and cache update are
        // one step with respect to other setters.
        let mut cache = self.cache();
        let reference = cache
            .setpoint(setpoint)
            .value()
            .ok_or(EvapError::UnknownReference(setpoint))?;

        if setpoint == Setpoint::Emis
            && target > reference
            && reference <= self.safety.min_emis_for_raise_ma
        {
            warn!(
                reference,
                target,
                min = self.safety.min_emis_for_raise_ma,
                "emission raise refused: controller is filament-controlled"
            );
            return Err(EvapError::UnsafeOperation(format!(
                "emission {reference} mA is not above {} mA; raising it is forbidden in filament control",
                self.safety.min_emis_for_raise_ma
            )));
        }

        let outcome =
            self.client
                .set(setpoint, target, reference, self.safety.max_step(setpoint))?;
        cache.set_setpoint(setpoint, Reading::Known(outcome.value));
        info!(%setpoint, reference, target, value = outcome.value, command = %outcome.command, "setpoint changed");
        Ok(outcome)
    }
}
