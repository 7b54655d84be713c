//! Subcommand execution: link assembly, session setup and output.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use evap_config::Config;
use evap_core::util::STOP_POLL;
use evap_core::{
    EvapError, EvapSession, MonitorParams, Param, ParameterSnapshot, RampReport, RampState,
    Reading, SetOutcome, Setpoint,
};
use evap_hardware::{LinkSettings, ReplyTiming};
use evap_traits::{Clock, Link};
use serde_json::json;

pub type BoxedLink = Box<dyn Link + Send>;

/// Map the TOML `[link]` table to transport settings.
pub fn link_settings(c: &evap_config::Link) -> LinkSettings {
    LinkSettings {
        port: c.port.clone(),
        baud: c.baud,
        timing: ReplyTiming {
            quiet: Duration::from_millis(c.quiet_ms),
            timeout: Duration::from_millis(c.read_timeout_ms),
            ..ReplyTiming::default()
        },
    }
}

#[cfg(feature = "hardware")]
pub fn open_link(cfg: &Config) -> eyre::Result<BoxedLink> {
    let settings = link_settings(&cfg.link);
    tracing::info!(port = %settings.port, baud = settings.baud, "opening serial link");
    let link = evap_hardware::SerialLink::open(&settings)
        .map_err(|e| eyre::Report::new(EvapError::LinkUnavailable(e.to_string())))?;
    Ok(Box::new(link))
}

/// Simulated backend. Initial setpoints come from `EVAP_SIM_EMIS_MA` and
/// `EVAP_SIM_HV_V` (defaults 5 mA, 800 V).
#[cfg(not(feature = "hardware"))]
pub fn open_link(cfg: &Config) -> eyre::Result<BoxedLink> {
    fn env_f64(key: &str, default: f64) -> eyre::Result<f64> {
        match std::env::var(key) {
            Ok(v) => v
                .trim()
                .parse()
                .wrap_err_with(|| format!("{key} must be a number, got {v:?}")),
            Err(_) => Ok(default),
        }
    }
    let settings = link_settings(&cfg.link);
    let emis = env_f64("EVAP_SIM_EMIS_MA", 5.0)?;
    let hv = env_f64("EVAP_SIM_HV_V", 800.0)?;
    tracing::info!(
        port = %settings.port,
        emis_ma = emis,
        hv_v = hv,
        "using simulated controller (serial port not opened)"
    );
    Ok(Box::new(evap_hardware::SimulatedEvc::with_setpoints(emis, hv)))
}

/// Assemble a session and make sure the controller answers.
pub fn connect(cfg: &Config, link: BoxedLink) -> eyre::Result<EvapSession<BoxedLink>> {
    let session = EvapSession::builder().link(link).apply_config(cfg).build()?;
    session.connect()?;
    Ok(session)
}

fn reading_json(r: Reading) -> serde_json::Value {
    r.value().map_or(serde_json::Value::Null, |v| json!(v))
}

pub fn snapshot_json(snap: &ParameterSnapshot) -> serde_json::Value {
    json!({
        "fil_a": reading_json(snap.filament_current),
        "emis_ma": reading_json(snap.emission_current),
        "flux_na": reading_json(snap.flux),
        "hv_v": reading_json(snap.high_voltage),
        "temp_c": reading_json(snap.temperature),
        "mode": snap.emission_mode.value().map(|m| m.to_string()),
    })
}

fn print_snapshot(json_mode: bool, tick: Option<u64>, snap: &ParameterSnapshot) {
    if json_mode {
        let mut v = snapshot_json(snap);
        if let (Some(t), Some(obj)) = (tick, v.as_object_mut()) {
            obj.insert("tick".into(), json!(t));
        }
        println!("{v}");
    } else {
        if let Some(t) = tick {
            println!("-- poll {t}");
        }
        println!("{snap}");
    }
}

pub fn run_status(cfg: &Config, link: BoxedLink, json_mode: bool) -> eyre::Result<()> {
    let session = connect(cfg, link)?;
    print_snapshot(json_mode, None, &session.snapshot());
    Ok(())
}

fn flush(session: &EvapSession<BoxedLink>, path: Option<&Path>, json_mode: bool) -> eyre::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    session
        .flush_log(path)
        .map_err(eyre::Report::new)
        .wrap_err_with(|| format!("{} samples kept in memory", session.log().len()))?;
    if !json_mode {
        println!("Wrote {} samples to {}", session.log().len(), path.display());
    }
    Ok(())
}

pub fn run_monitor(
    cfg: &Config,
    link: BoxedLink,
    ticks: Option<u64>,
    log: Option<PathBuf>,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let mut session = connect(cfg, link)?;
    let params = MonitorParams {
        max_ticks: ticks,
        ..MonitorParams::from(&cfg.monitor)
    };
    evap_core::run_monitor(&mut session, params, shutdown, |n, snap| {
        print_snapshot(json_mode, Some(n), snap);
        ControlFlow::Continue(())
    });
    let path = log.or_else(|| cfg.monitor.log_path.clone());
    flush(&session, path.as_deref(), json_mode)
}

fn print_set(json_mode: bool, setpoint: Setpoint, target: f64, out: &SetOutcome) {
    if json_mode {
        println!(
            "{}",
            json!({
                "setpoint": setpoint.to_string(),
                "target": target,
                "command": out.command,
                "delta": out.delta,
                "value": out.value,
                "reply": out.reply.trim(),
            })
        );
    } else {
        println!("{setpoint} -> {} ({})", out.value, out.command);
        if !out.reply.trim().is_empty() {
            println!("controller replied: {}", out.reply.trim());
        }
    }
}

pub fn run_set(
    cfg: &Config,
    link: BoxedLink,
    setpoint: Setpoint,
    target: f64,
    json_mode: bool,
) -> eyre::Result<()> {
    let session = connect(cfg, link)?;
    let out = session.set_immediate(setpoint, target)?;
    print_set(json_mode, setpoint, target, &out);
    Ok(())
}

fn print_report(json_mode: bool, r: &RampReport) {
    if json_mode {
        println!(
            "{}",
            json!({
                "setpoint": r.setpoint.to_string(),
                "state": r.state.to_string(),
                "applied": r.applied,
                "planned": r.planned,
                "last_applied": r.last_applied,
                "error": r.error.as_ref().map(ToString::to_string),
            })
        );
    } else {
        println!(
            "ramp {}: {} ({}/{} steps)",
            r.setpoint, r.state, r.applied, r.planned
        );
        if let Some(v) = r.last_applied {
            println!("left at {v:.1} {}", r.setpoint.unit());
        }
        if let Some(e) = &r.error {
            println!("reason: {e}");
        }
    }
}

/// Exit code for a finished ramp: 0 completed, 4 cancelled, 5 failed.
pub fn ramp_exit_code(state: RampState) -> i32 {
    match state {
        RampState::Completed => 0,
        RampState::Cancelled => 4,
        _ => 5,
    }
}

/// Run a ramp to completion while polling the controller.
#[allow(clippy::too_many_arguments)]
pub fn run_degas(
    cfg: &Config,
    link: BoxedLink,
    setpoint: Setpoint,
    target: f64,
    duration_s: f64,
    log: Option<PathBuf>,
    json_mode: bool,
    shutdown: &AtomicBool,
) -> eyre::Result<i32> {
    if !duration_s.is_finite() || duration_s <= 0.0 {
        return Err(eyre::Report::new(EvapError::InvalidRamp("duration must be > 0")));
    }
    let mut session = connect(cfg, link)?;
    let plan = session.plan_ramp(setpoint, target, Duration::from_secs_f64(duration_s))?;
    plan.check()?;
    if !json_mode {
        println!(
            "ramping {setpoint} {:.1} -> {:.1} in {} steps, one every {:.1} s",
            plan.start(),
            plan.start() + plan.step_count() as f64 * plan.signed_step(),
            plan.step_count(),
            plan.step_interval().as_secs_f64()
        );
    }
    let handle = session.start_ramp(setpoint, target, plan.duration())?;

    let clock = Arc::clone(session.clock());
    let poll = Duration::from_millis(cfg.monitor.poll_interval_ms);
    let mut tick = 0u64;
    while !handle.is_finished() {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(%setpoint, "cancel requested");
            handle.cancel();
            break;
        }
        tick += 1;
        let snap = session.tick();
        print_snapshot(json_mode, Some(tick), &snap);

        let deadline = clock.now() + poll;
        while !handle.is_finished() && !shutdown.load(Ordering::Relaxed) {
            let now = clock.now();
            if now >= deadline {
                break;
            }
            clock.sleep((deadline - now).min(STOP_POLL));
        }
    }

    let report = handle.wait();
    print_report(json_mode, &report);
    flush(&session, log.as_deref(), json_mode)?;
    Ok(ramp_exit_code(report.state))
}

/// Query every parameter once. Fails only if nothing answered.
pub fn run_self_check(cfg: &Config, link: BoxedLink, json_mode: bool) -> eyre::Result<()> {
    let session = EvapSession::builder().link(link).apply_config(cfg).build()?;
    let client = session.state().client();
    let mut answered = 0usize;
    let mut results = Vec::new();
    for p in Param::REFRESH_ORDER {
        let r = client.get(p);
        if r.is_ok() {
            answered += 1;
        }
        results.push((p, r));
    }

    if json_mode {
        let fields: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(p, r)| {
                let v = match r {
                    Ok(v) => json!({ "ok": true, "value": v }),
                    Err(e) => json!({ "ok": false, "error": e.to_string() }),
                };
                (p.to_string(), v)
            })
            .collect();
        println!("{}", json!({ "answered": answered, "params": fields }));
    } else {
        for (p, r) in &results {
            match r {
                Ok(v) => println!("{p:<8} ok      {v}"),
                Err(e) => println!("{p:<8} FAILED  {e}"),
            }
        }
        println!("{answered}/{} parameters answered", results.len());
    }

    if answered == 0 {
        return Err(eyre::Report::new(EvapError::LinkUnavailable(
            "no parameter answered".into(),
        )));
    }
    Ok(())
}
