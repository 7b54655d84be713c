#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Evaporator control core (hardware-agnostic).
//!
//! Every controller exchange goes through `evap_traits::Link`; time comes
//! from `evap_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Client**: GET/SET protocol encoding and reply parsing (`client`)
//! - **State**: cached readings, partial-failure refresh and SET safety rules (`state`)
//! - **Plan**: linear step sequences with a command-rate floor (`plan`)
//! - **Ramp**: cancellable background execution of a plan (`ramp`)
//! - **Log**: session-relative sample records and file flush (`sample_log`)
//! - **Session**: wires the above together for one operator session (`session`)
//!
//! The link is serialized inside `ControllerClient`: one exchange is one
//! critical section, so the polling loop and a ramp worker can share it.

pub mod client;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod param;
pub mod plan;
pub mod ramp;
pub mod runner;
pub mod sample_log;
pub mod session;
pub mod state;
pub mod status;
pub mod util;

pub use client::{ControllerClient, SetOutcome};
pub use config::{ControllerCfg, RampCfg, SafetyCfg};
pub use error::{BuildError, EvapError, EvapResult, Report, Result};
pub use param::{EmissionMode, Param, ParameterSnapshot, Reading, Setpoint};
pub use plan::{PlanStatus, RampPlan};
pub use ramp::{RampHandle, RampReport, RampScheduler, RampShared, run_plan};
pub use runner::{MonitorParams, run_monitor};
pub use sample_log::{SampleLog, SampleRecord};
pub use session::{EvapSession, EvapSessionBuilder};
pub use state::ParameterState;
pub use status::RampState;
