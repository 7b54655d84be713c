//! Linear setpoint ramps computed up front.
//!
//! A plan moves from `start` towards `end` in steps of `step_size`:
//! `step_count = floor(|end - start| / step_size)` and
//! `step_interval = duration / step_count`. The last value is
//! `start ± step_count * step_size`, which may stop short of `end`.
//!
//! When `step_interval` falls below `min_step_interval` the controller would
//! be commanded faster than it reliably accepts, so the plan collapses to the
//! single value `[start]` and `check()` reports `StepTooSmall`.

use std::time::Duration;

use crate::error::{EvapError, EvapResult};
use crate::util::millis_u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Ready,
    /// `duration / step_count < min_step_interval`
    IntervalTooShort,
    /// `end` lies within one step of `start`.
    NoMovement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RampPlan {
    start: f64,
    end: f64,
    duration: Duration,
    step_size: f64,
    min_step_interval: Duration,
    step_count: u64,
    step_interval: Duration,
    status: PlanStatus,
}

/// `floor(ratio)`, tolerating representation error just below an integer,
/// e.g. `(1.0 - 0.7) / 0.1 == 2.9999999999999996`.
#[inline]
fn truncate_steps(ratio: f64) -> u64 {
    let nudged = ratio + ratio * 4.0 * f64::EPSILON;
    nudged.floor() as u64
}

impl RampPlan {
    /// `step_size` is a magnitude; direction comes from `end - start`.
    pub fn new(
        start: f64,
        end: f64,
        duration: Duration,
        step_size: f64,
        min_step_interval: Duration,
    ) -> EvapResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(EvapError::InvalidRamp("start and end must be finite"));
        }
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(EvapError::InvalidRamp("step size must be > 0"));
        }
        if duration.is_zero() {
            return Err(EvapError::InvalidRamp("duration must be > 0"));
        }

        let step_count = truncate_steps((end - start).abs() / step_size);
        let (status, step_interval) = if step_count == 0 {
            (PlanStatus::NoMovement, Duration::ZERO)
        } else {
            let nanos = duration.as_nanos() / u128::from(step_count);
            let interval = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
            if interval < min_step_interval {
                (PlanStatus::IntervalTooShort, interval)
            } else {
                (PlanStatus::Ready, interval)
            }
        };

        Ok(Self {
            start,
            end,
            duration,
            step_size,
            min_step_interval,
            step_count,
            step_interval,
            status,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }
    pub fn end(&self) -> f64 {
        self.end
    }
    pub fn duration(&self) -> Duration {
        self.duration
    }
    pub fn step_size(&self) -> f64 {
        self.step_size
    }
    pub fn min_step_interval(&self) -> Duration {
        self.min_step_interval
    }
    /// Steps implied by the span, even when the plan collapsed.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }
    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }
    pub fn status(&self) -> PlanStatus {
        self.status
    }
    pub fn is_ready(&self) -> bool {
        self.status == PlanStatus::Ready
    }

    /// Step size with the direction of travel.
    pub fn signed_step(&self) -> f64 {
        if self.end < self.start {
            -self.step_size
        } else {
            self.step_size
        }
    }

    /// Values to apply, in order. A collapsed plan yields `[start]`.
    pub fn values(&self) -> Vec<f64> {
        if !self.is_ready() {
            return vec![self.start];
        }
        let step = self.signed_step();
        (1..=self.step_count)
            .map(|i| self.start + (i as f64) * step)
            .collect()
    }

    /// Ok for a runnable plan, otherwise the condition that collapsed it.
    pub fn check(&self) -> EvapResult<()> {
        match self.status {
            PlanStatus::Ready => Ok(()),
            PlanStatus::IntervalTooShort => Err(EvapError::StepTooSmall {
                interval_ms: millis_u64(self.step_interval),
                min_ms: millis_u64(self.min_step_interval),
            }),
            PlanStatus::NoMovement => Err(EvapError::EmptyRamp),
        }
    }
}
