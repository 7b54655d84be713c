//! Transports for the EVC evaporator controller.
//!
//! - `SerialLink` talks to the real unit over a serial port (feature `hardware`).
//! - `SimulatedEvc` emulates the controller in-process.
//! - `framing` holds the quiet-period reply reader both share with tests.
pub mod error;
pub mod framing;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;

pub use error::HwError;
pub use framing::{ReplyTiming, read_reply};
#[cfg(feature = "hardware")]
pub use serial::SerialLink;
pub use sim::{SimState, SimulatedEvc};

/// Device path and line timing for a serial controller link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    pub port: String,
    pub baud: u32,
    pub timing: ReplyTiming,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 57_600,
            timing: ReplyTiming::default(),
        }
    }
}
