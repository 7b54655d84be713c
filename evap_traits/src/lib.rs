pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Line-oriented request/response channel to an instrument controller.
///
/// One call is one exchange: the implementation writes `command` followed by
/// `"\r\n"`, waits at least `settle`, then returns whatever reply text it
/// drained (possibly empty). Replies are matched to requests purely by call
/// order, so callers must never interleave exchanges on the same link.
pub trait Link {
    fn exchange(
        &mut self,
        command: &str,
        settle: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn exchange(
        &mut self,
        command: &str,
        settle: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        (**self).exchange(command, settle)
    }
}
