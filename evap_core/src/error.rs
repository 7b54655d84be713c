use thiserror::Error;

use crate::param::{Param, Setpoint};

/// Failure kinds of controller operations.
///
/// Refresh absorbs per-field failures; every other operation surfaces them
/// to its caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvapError {
    #[error("link unavailable: {0}")]
    LinkUnavailable(String),
    #[error("malformed reply to GET {param}: {reply:?}")]
    MalformedReply { param: Param, reply: String },
    #[error("step too large for {setpoint}: |{delta:.3}| exceeds {max_step}")]
    StepTooLarge {
        setpoint: Setpoint,
        delta: f64,
        max_step: f64,
    },
    #[error("unsafe operation refused: {0}")]
    UnsafeOperation(String),
    #[error("no reading of {0} to compute a delta from; refresh first")]
    UnknownReference(Setpoint),
    #[error("a ramp is already active for {0}")]
    RampAlreadyActive(Setpoint),
    #[error("ramp time step too small: {interval_ms} ms < minimum {min_ms} ms")]
    StepTooSmall { interval_ms: u64, min_ms: u64 },
    #[error("ramp target is within one step of the start value")]
    EmptyRamp,
    #[error("invalid ramp: {0}")]
    InvalidRamp(&'static str),
    #[error("link timeout")]
    Timeout,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("io error: {0}")]
    Io(String),
}

impl EvapError {
    /// Refused before anything was written to the controller.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::StepTooLarge { .. } | Self::UnsafeOperation(_) | Self::UnknownReference(_)
        )
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing controller link")]
    MissingLink,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Result of a single controller operation.
pub type EvapResult<T> = std::result::Result<T, EvapError>;

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
