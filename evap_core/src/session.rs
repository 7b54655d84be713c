//! One operator session: the controller state, its sample log and ramps.
//!
//! Everything the polling loop and the ramp worker share is constructed
//! here once and handed out explicitly.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use evap_traits::{Clock, Link, MonotonicClock};
use tracing::{debug, info};

use crate::client::{ControllerClient, SetOutcome};
use crate::config::{ControllerCfg, RampCfg, SafetyCfg};
use crate::error::{BuildError, EvapError, EvapResult, Result};
use crate::param::{Param, ParameterSnapshot, Setpoint};
use crate::plan::RampPlan;
use crate::ramp::{RampHandle, RampScheduler};
use crate::sample_log::SampleLog;
use crate::state::ParameterState;

pub struct EvapSessionBuilder<L> {
    link: Option<L>,
    controller: ControllerCfg,
    safety: SafetyCfg,
    ramp: RampCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl<L> Default for EvapSessionBuilder<L> {
    fn default() -> Self {
        Self {
            link: None,
            controller: ControllerCfg::default(),
            safety: SafetyCfg::default(),
            ramp: RampCfg::default(),
            clock: None,
        }
    }
}

impl<L: Link + Send + 'static> EvapSessionBuilder<L> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, link: L) -> Self {
        self.link = Some(link);
        self
    }

    /// Take every runtime setting from a validated config file.
    pub fn apply_config(mut self, cfg: &evap_config::Config) -> Self {
        self.controller = ControllerCfg::from(cfg);
        self.safety = SafetyCfg::from(&cfg.controller);
        self.ramp = RampCfg::from(&cfg.ramp);
        self
    }

    pub fn controller(mut self, c: ControllerCfg) -> Self {
        self.controller = c;
        self
    }

    pub fn safety(mut self, s: SafetyCfg) -> Self {
        self.safety = s;
        self
    }

    pub fn ramp(mut self, r: RampCfg) -> Self {
        self.ramp = r;
        self
    }

    /// Inject a clock (tests use `ManualClock`).
    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<EvapSession<L>> {
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.safety.max_hv_step_v) || !positive(self.safety.max_emis_step_ma) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max step sizes must be > 0",
            )));
        }
        if !positive(self.controller.flux_scale) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "flux_scale must be > 0",
            )));
        }
        for sp in [Setpoint::Hv, Setpoint::Emis] {
            let step = self.ramp.step_for(sp);
            if !positive(step) || step > self.safety.max_step(sp) {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "ramp step must be > 0 and within the SET safety bound",
                )));
            }
            if step < evap_config::SET_RESOLUTION {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "ramp step is finer than the SET resolution",
                )));
            }
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let client = ControllerClient::new(link, self.controller);
        let state = Arc::new(ParameterState::new(client, self.safety));
        Ok(EvapSession {
            state,
            log: SampleLog::new(Arc::clone(&clock)),
            ramps: RampScheduler::new(Arc::clone(&clock)),
            ramp_cfg: self.ramp,
            paused: false,
            clock,
        })
    }
}

pub struct EvapSession<L: Link> {
    state: Arc<ParameterState<L>>,
    log: SampleLog,
    ramps: RampScheduler,
    ramp_cfg: RampCfg,
    paused: bool,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<L: Link + Send + 'static> EvapSession<L> {
    pub fn builder() -> EvapSessionBuilder<L> {
        EvapSessionBuilder::new()
    }

    /// Verify the controller answers before entering the control loop.
    ///
    /// Only a link-level failure is fatal; a garbled reply still proves the
    /// device is there.
    pub fn connect(&self) -> EvapResult<ParameterSnapshot> {
        match self.state.client().get(Param::Hv) {
            Ok(_) | Err(EvapError::MalformedReply { .. }) => Ok(self.state.refresh()),
            Err(e @ (EvapError::LinkUnavailable(_) | EvapError::Timeout)) => Err(e),
            Err(EvapError::Hardware(msg)) | Err(EvapError::Io(msg)) => {
                Err(EvapError::LinkUnavailable(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// One poll: refresh every field and log `(flux, emission)`.
    ///
    /// While paused the controller is left alone and the cached snapshot is
    /// returned for redraw.
    pub fn tick(&mut self) -> ParameterSnapshot {
        if self.paused {
            debug!("paused: skipping refresh");
            return self.state.snapshot();
        }
        let snap = self.state.refresh();
        self.log.append(
            snap.flux.value().unwrap_or(f64::NAN),
            snap.emission_current.value().unwrap_or(f64::NAN),
        );
        snap
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            info!(paused, "acquisition pause toggled");
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.state.snapshot()
    }

    pub fn refresh(&self) -> ParameterSnapshot {
        self.state.refresh()
    }

    pub fn set_immediate(&self, setpoint: Setpoint, target: f64) -> EvapResult<SetOutcome> {
        if self.ramps.is_active(setpoint) {
            return Err(EvapError::RampAlreadyActive(setpoint));
        }
        self.state.set_immediate(setpoint, target)
    }

    /// Plan a ramp of `setpoint` from its cached reading to `target`.
    pub fn plan_ramp(
        &self,
        setpoint: Setpoint,
        target: f64,
        duration: Duration,
    ) -> EvapResult<RampPlan> {
        let start = self
            .state
            .snapshot()
            .setpoint(setpoint)
            .value()
            .ok_or(EvapError::UnknownReference(setpoint))?;
        RampPlan::new(
            start,
            target,
            duration,
            self.ramp_cfg.step_for(setpoint),
            self.ramp_cfg.min_step_interval,
        )
    }

    /// Start a background ramp (degas) that applies each step through
    /// `set_immediate`, so every step passes the same safety checks.
    pub fn start_ramp(
        &self,
        setpoint: Setpoint,
        target: f64,
        duration: Duration,
    ) -> EvapResult<RampHandle> {
        let plan = self.plan_ramp(setpoint, target, duration)?;
        let state = Arc::clone(&self.state);
        self.ramps.start(setpoint, plan, move |value| {
            state.set_immediate(setpoint, value).map(|o| o.value)
        })
    }

    pub fn cancel_ramp(&self, setpoint: Setpoint) -> bool {
        self.ramps.cancel(setpoint)
    }

    pub fn ramps(&self) -> &RampScheduler {
        &self.ramps
    }

    pub fn log(&self) -> &SampleLog {
        &self.log
    }

    pub fn flush_log(&self, path: &Path) -> EvapResult<()> {
        self.log.flush_to(path)
    }

    pub fn state(&self) -> &Arc<ParameterState<L>> {
        &self.state
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }
}

impl<L: Link> core::fmt::Debug for EvapSession<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EvapSession")
            .field("state", &self.state)
            .field("log", &self.log)
            .field("ramps", &self.ramps)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
