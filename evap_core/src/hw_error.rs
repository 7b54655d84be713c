//! Maps `Box<dyn Error>` from the `Link` boundary to typed `EvapError`.
//!
//! `evap_traits::Link` returns `Box<dyn Error + Send + Sync>` so any transport
//! can plug in; this module converts those to our typed error enum, with an
//! optional feature-gated path for `evap_hardware::HwError` downcasting.

use crate::error::EvapError;

/// Map a trait-boundary error to a typed `EvapError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EvapError {
    #[cfg(feature = "hardware-errors")]
    {
        use evap_hardware::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => EvapError::Timeout,
                HwError::LinkUnavailable { .. } => EvapError::LinkUnavailable(hw.to_string()),
                other => EvapError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        EvapError::Timeout
    } else {
        EvapError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_fallback_detects_timeouts() {
        let e: Box<dyn std::error::Error + Send + Sync> = "serial read timed out".into();
        assert_eq!(map_hw_error(&*e), EvapError::Timeout);
        let e: Box<dyn std::error::Error + Send + Sync> = "framing error".into();
        assert!(matches!(map_hw_error(&*e), EvapError::Hardware(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn downcasts_hw_errors() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(evap_hardware::HwError::LinkUnavailable {
                port: "/dev/ttyUSB0".into(),
                reason: "permission denied".into(),
            });
        assert!(matches!(map_hw_error(&*e), EvapError::LinkUnavailable(_)));
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(evap_hardware::HwError::Timeout);
        assert_eq!(map_hw_error(&*e), EvapError::Timeout);
    }
}
