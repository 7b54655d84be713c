//! Common time helpers for evap_core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use evap_traits::Clock;

/// Granularity at which long waits re-check their stop flag.
pub const STOP_POLL: Duration = Duration::from_millis(50);

/// Whole seconds, rounded to nearest.
#[inline]
pub fn round_secs(d: Duration) -> u64 {
    d.as_secs_f64().round() as u64
}

/// Milliseconds, saturating at u64::MAX.
#[inline]
pub fn millis_u64(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Sleep for `d` on `clock` in `STOP_POLL` slices.
/// Returns false as soon as `stop` is observed set.
pub fn sleep_unless<C: Clock + ?Sized>(clock: &C, d: Duration, stop: &AtomicBool) -> bool {
    let deadline = clock.now() + d;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = clock.now();
        if now >= deadline {
            return true;
        }
        clock.sleep((deadline - now).min(STOP_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evap_traits::ManualClock;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_secs(Duration::from_millis(1499)), 1);
        assert_eq!(round_secs(Duration::from_millis(1500)), 2);
        assert_eq!(round_secs(Duration::ZERO), 0);
    }

    #[test]
    fn sleep_unless_runs_to_deadline() {
        let clock = ManualClock::new();
        let stop = AtomicBool::new(false);
        assert!(sleep_unless(&clock, Duration::from_millis(620), &stop));
        assert_eq!(clock.offset(), Duration::from_millis(620));
    }

    #[test]
    fn sleep_unless_honours_preset_stop() {
        let clock = ManualClock::new();
        let stop = AtomicBool::new(true);
        assert!(!sleep_unless(&clock, Duration::from_secs(5), &stop));
        assert_eq!(clock.offset(), Duration::ZERO);
    }
}
