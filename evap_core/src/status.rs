//! Ramp lifecycle states.

/// `Idle -> Running -> {Completed, Cancelled, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RampState {
    Idle = 0,
    Running = 1,
    /// Every planned step was applied.
    Completed = 2,
    /// Stopped by the operator; the instrument stays at the last applied value.
    Cancelled = 3,
    /// A step was refused or the link failed; remaining steps were abandoned.
    Failed = 4,
}

impl RampState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RampState::Completed | RampState::Cancelled | RampState::Failed
        )
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => RampState::Running,
            2 => RampState::Completed,
            3 => RampState::Cancelled,
            4 => RampState::Failed,
            _ => RampState::Idle,
        }
    }
}

impl core::fmt::Display for RampState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            RampState::Idle => "idle",
            RampState::Running => "running",
            RampState::Completed => "completed",
            RampState::Cancelled => "cancelled",
            RampState::Failed => "failed",
        })
    }
}
