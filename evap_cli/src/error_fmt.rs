//! Human-readable error descriptions and structured JSON error formatting.

use evap_core::error::{BuildError, EvapError};

/// Stable name of an error kind for JSON output.
pub fn error_kind_name(e: &EvapError) -> &'static str {
    match e {
        EvapError::LinkUnavailable(_) => "LinkUnavailable",
        EvapError::MalformedReply { .. } => "MalformedReply",
        EvapError::StepTooLarge { .. } => "StepTooLarge",
        EvapError::UnsafeOperation(_) => "UnsafeOperation",
        EvapError::UnknownReference(_) => "UnknownReference",
        EvapError::RampAlreadyActive(_) => "RampAlreadyActive",
        EvapError::StepTooSmall { .. } => "StepTooSmall",
        EvapError::EmptyRamp => "EmptyRamp",
        EvapError::InvalidRamp(_) => "InvalidRamp",
        EvapError::Timeout => "Timeout",
        EvapError::Hardware(_) => "Hardware",
        EvapError::Io(_) => "Io",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No controller link was provided to the session.\nLikely causes: The serial link failed to open before the session was assembled.\nHow to fix: Check the device path (link.port or --port) and permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<EvapError>() {
        return match de {
            EvapError::LinkUnavailable(msg) => format!(
                "What happened: The controller link is unavailable ({msg}).\nLikely causes: Wrong device path, cable unplugged, controller off, or the port is held by another program.\nHow to fix: Check link.port (or --port), the cable and power, then rerun."
            ),
            EvapError::Timeout => "What happened: The controller did not answer in time.\nLikely causes: Controller busy or off, wrong baud rate, or link.read_timeout_ms too low.\nHow to fix: Verify link.baud matches the controller and consider raising link.read_timeout_ms.".to_string(),
            EvapError::StepTooLarge { setpoint, delta, max_step } => format!(
                "What happened: Refused to change {setpoint} by {delta:+.1}; a single step may not exceed {max_step}.\nLikely causes: Target too far from the current value.\nHow to fix: Move in smaller steps or use `evap degas` to ramp."
            ),
            EvapError::UnsafeOperation(msg) => format!(
                "What happened: Refused an unsafe operation: {msg}.\nLikely causes: The controller is filament-controlled at low emission.\nHow to fix: Bring emission up from the controller front panel first; lowering is always allowed."
            ),
            EvapError::UnknownReference(sp) => format!(
                "What happened: The current {sp} value could not be read, so no safe step can be computed.\nLikely causes: A garbled or missing reply during the last refresh.\nHow to fix: Run `evap status` and retry once the value reads back."
            ),
            EvapError::StepTooSmall { interval_ms, min_ms } => format!(
                "What happened: Ramp rejected: one step every {interval_ms} ms is faster than the controller accepts ({min_ms} ms).\nLikely causes: Duration too short for the distance.\nHow to fix: Increase --duration-s or ramp.step_size."
            ),
            EvapError::EmptyRamp => "What happened: Ramp rejected: the target is within one step of the current value.\nHow to fix: Use `evap set` for small changes.".to_string(),
            EvapError::RampAlreadyActive(sp) => format!(
                "What happened: A ramp of {sp} is already running.\nHow to fix: Wait for it to finish or cancel it first."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Pass --config with the path to your TOML (default etc/evap.toml)."
        );
    }
    if lower.contains("parse config") || lower.contains("must") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing [link] section or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Exit codes: 2 refused, 3 ramp plan rejected, 6 link unavailable, 1 other.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<EvapError>() {
        Some(e) if e.is_refusal() => 2,
        Some(EvapError::RampAlreadyActive(_)) => 2,
        Some(EvapError::StepTooSmall { .. } | EvapError::EmptyRamp | EvapError::InvalidRamp(_)) => {
            3
        }
        Some(EvapError::LinkUnavailable(_) | EvapError::Timeout) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let message = humanize(err);
    let value = match err.downcast_ref::<EvapError>() {
        Some(EvapError::StepTooLarge {
            setpoint,
            delta,
            max_step,
        }) => json!({
            "reason": "StepTooLarge",
            "details": { "setpoint": setpoint.to_string(), "delta": delta, "max_step": max_step },
            "message": message,
        }),
        Some(EvapError::StepTooSmall {
            interval_ms,
            min_ms,
        }) => json!({
            "reason": "StepTooSmall",
            "details": { "interval_ms": interval_ms, "min_ms": min_ms },
            "message": message,
        }),
        Some(e) => json!({ "reason": error_kind_name(e), "message": message }),
        None if err.downcast_ref::<BuildError>().is_some() => {
            json!({ "reason": "InvalidConfig", "message": message })
        }
        None => json!({ "reason": "Error", "message": message }),
    };
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use evap_core::Setpoint;

    #[test]
    fn refusals_exit_two() {
        let e = eyre::Report::new(EvapError::StepTooLarge {
            setpoint: Setpoint::Hv,
            delta: 30.0,
            max_step: 20.0,
        });
        assert_eq!(exit_code_for_error(&e), 2);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "StepTooLarge");
        assert_eq!(v["details"]["max_step"], 20.0);
    }

    #[test]
    fn plan_and_link_codes() {
        assert_eq!(exit_code_for_error(&eyre::Report::new(EvapError::EmptyRamp)), 3);
        assert_eq!(
            exit_code_for_error(&eyre::Report::new(EvapError::LinkUnavailable("x".into()))),
            6
        );
        assert_eq!(exit_code_for_error(&eyre::eyre!("anything")), 1);
    }
}
