//! Background ramp execution.
//!
//! A ramp owns one worker thread that walks a [`RampPlan`]: sleep one step
//! interval, apply the next value, repeat. Cancellation is cooperative and
//! observed between steps (and while sleeping), never mid-exchange.
//!
//! At most one ramp runs per [`Setpoint`]; a second `start` for the same
//! setpoint is refused with `RampAlreadyActive` while the first is running.
//!
//! Each `RampHandle` cancels and joins its thread on drop, so a ramp never
//! outlives the code that started it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use evap_traits::Clock;
use tracing::{debug, info, warn};

use crate::error::{EvapError, EvapResult};
use crate::param::Setpoint;
use crate::plan::RampPlan;
use crate::status::RampState;
use crate::util::sleep_unless;

/// State shared between a ramp worker and its observers.
#[derive(Debug)]
pub struct RampShared {
    state: AtomicU8,
    applied: AtomicUsize,
    cancel: AtomicBool,
}

impl Default for RampShared {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(RampState::Idle as u8),
            applied: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
        }
    }
}

impl RampShared {
    pub fn state(&self) -> RampState {
        RampState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, s: RampState) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// Steps successfully applied so far.
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// How a ramp ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RampReport {
    pub setpoint: Setpoint,
    pub state: RampState,
    pub applied: usize,
    pub planned: usize,
    /// Value the instrument was left at, if any step succeeded.
    pub last_applied: Option<f64>,
    pub error: Option<EvapError>,
}

/// Drive `plan` through `apply` on the calling thread. `apply` returns the
/// value the instrument was actually left at.
///
/// Used by the scheduler's worker; callable directly for synchronous ramps.
pub fn run_plan<C, F>(
    setpoint: Setpoint,
    plan: &RampPlan,
    clock: &C,
    shared: &RampShared,
    mut apply: F,
) -> RampReport
where
    C: Clock + ?Sized,
    F: FnMut(f64) -> EvapResult<f64>,
{
    let values = plan.values();
    let mut report = RampReport {
        setpoint,
        state: RampState::Running,
        applied: 0,
        planned: values.len(),
        last_applied: None,
        error: None,
    };

    if let Err(e) = plan.check() {
        shared.set_state(RampState::Failed);
        report.state = RampState::Failed;
        report.error = Some(e);
        return report;
    }

    shared.set_state(RampState::Running);
    let interval = plan.step_interval();
    for value in values {
        if shared.is_cancelled() || !sleep_unless(clock, interval, &shared.cancel) {
            info!(%setpoint, applied = report.applied, "ramp cancelled");
            shared.set_state(RampState::Cancelled);
            report.state = RampState::Cancelled;
            return report;
        }
        match apply(value) {
            Ok(reached) => {
                report.applied += 1;
                report.last_applied = Some(reached);
                shared.applied.store(report.applied, Ordering::Release);
                debug!(%setpoint, value, reached, step = report.applied, "ramp step applied");
            }
            Err(e) => {
                warn!(%setpoint, value, error = %e, "ramp step failed; abandoning ramp");
                shared.set_state(RampState::Failed);
                report.state = RampState::Failed;
                report.error = Some(e);
                return report;
            }
        }
    }

    info!(%setpoint, applied = report.applied, "ramp completed");
    shared.set_state(RampState::Completed);
    report.state = RampState::Completed;
    report
}

/// Handle to a running ramp.
pub struct RampHandle {
    setpoint: Setpoint,
    shared: Arc<RampShared>,
    join: Option<JoinHandle<RampReport>>,
}

impl RampHandle {
    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    /// Request cancellation; takes effect before the next step.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn state(&self) -> RampState {
        self.shared.state()
    }

    pub fn applied(&self) -> usize {
        self.shared.applied()
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the ramp ends.
    pub fn wait(mut self) -> RampReport {
        self.join_inner()
    }

    fn join_inner(&mut self) -> RampReport {
        let fallback = |error: EvapError| RampReport {
            setpoint: self.setpoint,
            state: RampState::Failed,
            applied: self.shared.applied(),
            planned: 0,
            last_applied: None,
            error: Some(error),
        };
        match self.join.take() {
            Some(handle) => match handle.join() {
                Ok(report) => report,
                Err(_) => {
                    self.shared.set_state(RampState::Failed);
                    fallback(EvapError::Hardware("ramp worker panicked".into()))
                }
            },
            None => fallback(EvapError::Hardware("ramp already joined".into())),
        }
    }
}

impl core::fmt::Debug for RampHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RampHandle")
            .field("setpoint", &self.setpoint)
            .field("state", &self.state())
            .field("applied", &self.applied())
            .finish()
    }
}

impl Drop for RampHandle {
    fn drop(&mut self) {
        if self.join.is_none() {
            return;
        }
        self.shared.cancel();
        let report = self.join_inner();
        debug!(setpoint = %report.setpoint, state = %report.state, "ramp handle dropped");
    }
}

/// Starts ramps and enforces one active ramp per setpoint.
pub struct RampScheduler {
    clock: Arc<dyn Clock + Send + Sync>,
    active: Mutex<HashMap<Setpoint, Arc<RampShared>>>,
}

impl RampScheduler {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            clock,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn active(&self) -> MutexGuard<'_, HashMap<Setpoint, Arc<RampShared>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a ramp for `setpoint` is currently running.
    pub fn is_active(&self, setpoint: Setpoint) -> bool {
        self.active()
            .get(&setpoint)
            .is_some_and(|s| !s.state().is_terminal())
    }

    /// Cancel the running ramp for `setpoint`, if any.
    pub fn cancel(&self, setpoint: Setpoint) -> bool {
        match self.active().get(&setpoint) {
            Some(s) if !s.state().is_terminal() => {
                s.cancel();
                true
            }
            _ => false,
        }
    }

    /// Spawn a worker that walks `plan`, calling `apply` for every value.
    ///
    /// Refuses collapsed plans with the plan's own error and a second ramp
    /// on a setpoint that is still running with `RampAlreadyActive`.
    pub fn start<F>(&self, setpoint: Setpoint, plan: RampPlan, apply: F) -> EvapResult<RampHandle>
    where
        F: FnMut(f64) -> EvapResult<f64> + Send + 'static,
    {
        plan.check()?;

        let shared = Arc::new(RampShared::default());
        {
            let mut active = self.active();
            if active
                .get(&setpoint)
                .is_some_and(|s| !s.state().is_terminal())
            {
                return Err(EvapError::RampAlreadyActive(setpoint));
            }
            // Marked running before the thread exists so a racing start sees it.
            shared.set_state(RampState::Running);
            active.insert(setpoint, Arc::clone(&shared));
        }

        info!(
            %setpoint,
            start = plan.start(),
            end = plan.end(),
            steps = plan.step_count(),
            interval_ms = crate::util::millis_u64(plan.step_interval()),
            "ramp started"
        );

        let clock = Arc::clone(&self.clock);
        let worker_shared = Arc::clone(&shared);
        let spawned = std::thread::Builder::new()
            .name(format!("ramp-{setpoint}"))
            .spawn(move || run_plan(setpoint, &plan, clock.as_ref(), &worker_shared, apply));

        match spawned {
            Ok(join) => Ok(RampHandle {
                setpoint,
                shared,
                join: Some(join),
            }),
            Err(e) => {
                shared.set_state(RampState::Failed);
                Err(EvapError::Hardware(format!("failed to spawn ramp worker: {e}")))
            }
        }
    }
}

impl core::fmt::Debug for RampScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let active: Vec<Setpoint> = self
            .active()
            .iter()
            .filter(|(_, s)| !s.state().is_terminal())
            .map(|(k, _)| *k)
            .collect();
        f.debug_struct("RampScheduler")
            .field("active", &active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evap_traits::ManualClock;
    use std::time::Duration;

    fn plan(start: f64, end: f64, secs: u64) -> RampPlan {
        RampPlan::new(
            start,
            end,
            Duration::from_secs(secs),
            1.0,
            Duration::from_millis(100),
        )
        .unwrap()
    }

    #[test]
    fn run_plan_applies_every_value_in_order() {
        let clock = ManualClock::new();
        let shared = RampShared::default();
        let mut seen = Vec::new();
        let report = run_plan(Setpoint::Hv, &plan(0.0, 3.0, 3), &clock, &shared, |v| {
            seen.push(v);
            Ok(v)
        });
        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
        assert_eq!(report.state, RampState::Completed);
        assert_eq!(report.last_applied, Some(3.0));
        assert_eq!(shared.state(), RampState::Completed);
        assert!(clock.offset() >= Duration::from_secs(3));
    }

    #[test]
    fn failure_abandons_remaining_steps() {
        let clock = ManualClock::new();
        let shared = RampShared::default();
        let mut calls = 0;
        let report = run_plan(Setpoint::Emis, &plan(4.0, 8.0, 4), &clock, &shared, |v| {
            calls += 1;
            if calls == 2 {
                Err(EvapError::Timeout)
            } else {
                Ok(v)
            }
        });
        assert_eq!(calls, 2);
        assert_eq!(report.state, RampState::Failed);
        assert_eq!(report.applied, 1);
        assert_eq!(report.last_applied, Some(5.0));
        assert_eq!(report.error, Some(EvapError::Timeout));
    }

    #[test]
    fn pre_cancelled_applies_nothing() {
        let clock = ManualClock::new();
        let shared = RampShared::default();
        shared.cancel();
        let report = run_plan(Setpoint::Hv, &plan(0.0, 2.0, 2), &clock, &shared, |_| {
            panic!("must not apply")
        });
        assert_eq!(report.state, RampState::Cancelled);
        assert_eq!(report.applied, 0);
    }

    #[test]
    fn last_applied_is_what_the_instrument_reached() {
        let clock = ManualClock::new();
        let shared = RampShared::default();
        let report = run_plan(Setpoint::Hv, &plan(0.0, 2.0, 2), &clock, &shared, |v| {
            Ok(v - 0.5)
        });
        assert_eq!(report.last_applied, Some(1.5));
    }
}
