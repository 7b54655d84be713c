//! Periodic acquisition loop.
//!
//! The loop owns no timer thread: it ticks the session, hands the snapshot to
//! an observer, then sleeps on the session clock until the next poll. A
//! shutdown flag (Ctrl-C in the CLI) is honoured within `STOP_POLL`.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use evap_traits::Link;
use tracing::{debug, info};

use crate::param::ParameterSnapshot;
use crate::session::EvapSession;
use crate::util::sleep_unless;

/// Polling cadence for `run_monitor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorParams {
    pub interval: Duration,
    /// Stop after this many ticks; `None` runs until shutdown.
    pub max_ticks: Option<u64>,
}

impl Default for MonitorParams {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_ticks: None,
        }
    }
}

/// Tick `session` every `params.interval` until `shutdown` is set, the tick
/// budget runs out, or `on_tick` breaks. Returns the number of ticks run.
///
/// `on_tick` receives the 1-based tick number and the snapshot to display;
/// while the session is paused that is the cached snapshot.
pub fn run_monitor<L, F>(
    session: &mut EvapSession<L>,
    params: MonitorParams,
    shutdown: &AtomicBool,
    mut on_tick: F,
) -> u64
where
    L: Link + Send + 'static,
    F: FnMut(u64, &ParameterSnapshot) -> ControlFlow<()>,
{
    let clock = std::sync::Arc::clone(session.clock());
    let mut ticks = 0u64;
    info!(interval_ms = crate::util::millis_u64(params.interval), "monitor started");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("monitor received shutdown signal");
            break;
        }
        if params.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        let snap = session.tick();
        ticks += 1;
        if on_tick(ticks, &snap).is_break() {
            break;
        }
        if params.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        if !sleep_unless(clock.as_ref(), params.interval, shutdown) {
            break;
        }
    }
    info!(ticks, records = session.log().len(), "monitor stopped");
    ticks
}
