//! Framed reply reads for line-oriented controllers.
//!
//! The controller does not length-prefix its replies and does not promise a
//! terminator, so a reply ends when a line terminator arrives, or when the
//! channel stays quiet for `quiet`. The whole read is bounded by `timeout`;
//! a channel that keeps streaming past it is reported as `HwError::Timeout`.
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::{HwError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTiming {
    /// End the reply once no new bytes arrived for this long.
    pub quiet: Duration,
    /// Hard bound on a single reply read.
    pub timeout: Duration,
    /// Sleep between polls while nothing is buffered.
    pub poll: Duration,
}

impl Default for ReplyTiming {
    fn default() -> Self {
        Self {
            quiet: Duration::from_millis(20),
            timeout: Duration::from_secs(1),
            poll: Duration::from_millis(2),
        }
    }
}

#[inline]
fn is_idle(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// A reply is complete once it carries content followed by a newline.
#[inline]
fn is_terminated(buf: &[u8]) -> bool {
    buf.last() == Some(&b'\n') && buf.iter().any(|b| !b.is_ascii_whitespace())
}

/// Read one reply from `reader`. Returns an empty string if nothing arrived
/// within the quiet window.
pub fn read_reply<R: Read + ?Sized>(reader: &mut R, timing: &ReplyTiming) -> Result<String> {
    let start = Instant::now();
    let deadline = start + timing.timeout;
    let mut last_activity = start;
    let mut buf: Vec<u8> = Vec::with_capacity(32);
    let mut chunk = [0u8; 256];

    loop {
        let got = match reader.read(&mut chunk) {
            Ok(0) => false,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                last_activity = Instant::now();
                true
            }
            Err(e) if is_idle(&e) => false,
            Err(e) => return Err(HwError::Io(e)),
        };

        if got && is_terminated(&buf) {
            break;
        }
        let now = Instant::now();
        if !got && now.saturating_duration_since(last_activity) >= timing.quiet {
            break;
        }
        if now >= deadline {
            trace!(bytes = buf.len(), "reply still streaming at deadline");
            return Err(HwError::Timeout);
        }
        if !got {
            std::thread::sleep(timing.poll);
        }
    }

    let text = String::from_utf8_lossy(&buf).into_owned();
    trace!(reply = %text.escape_default(), "reply framed");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_needs_content() {
        assert!(!is_terminated(b"\r\n"));
        assert!(is_terminated(b"12.5\r\n"));
        assert!(!is_terminated(b"12.5"));
    }
}
