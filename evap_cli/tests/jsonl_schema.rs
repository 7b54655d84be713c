use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[link]
port = "/dev/ttyUSB0"

[ramp]
min_step_interval_ms = 100

[monitor]
poll_interval_ms = 20
"#;
    let path = dir.path().join("evap.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn evap_json(cfg: &PathBuf, args: &[&str]) -> std::process::Output {
    Command::cargo_bin("evap")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg)
        .env_remove("RUST_LOG")
        .env("EVAP_SIM_EMIS_MA", "5.0")
        .env("EVAP_SIM_HV_V", "800")
        .args(args)
        .output()
        .unwrap()
}

fn last_json_line(bytes: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(bytes);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .expect("some output");
    serde_json::from_str(line).unwrap_or_else(|e| panic!("not JSON ({e}): {line}"))
}

#[test]
fn status_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = evap_json(&cfg, &["status"]);
    assert!(out.status.success());

    let v = last_json_line(&out.stdout);
    for key in ["fil_a", "emis_ma", "flux_na", "hv_v", "temp_c"] {
        assert!(v[key].is_number(), "{key} should be a number: {v}");
    }
    assert_eq!(v["emis_ma"], 5.0);
    assert_eq!(v["hv_v"], 800.0);
    assert_eq!(v["mode"], "emission");
}

#[test]
fn set_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = evap_json(&cfg, &["set", "--param", "emis", "--target", "5.5"]);
    assert!(out.status.success());

    let v = last_json_line(&out.stdout);
    assert_eq!(v["setpoint"], "EMIS");
    assert_eq!(v["command"], "SET EMIS +0.5");
    assert_eq!(v["delta"], 0.5);
    assert_eq!(v["value"], 5.5);
    assert!(v["reply"].is_string());
}

#[rstest]
#[case(&["set", "--param", "hv", "--target", "850"], 2, "StepTooLarge")]
#[case(&["degas", "--target", "15", "--duration-s", "1"], 3, "StepTooSmall")]
#[case(&["degas", "--target", "5", "--duration-s", "10"], 3, "EmptyRamp")]
fn error_schema(#[case] args: &[&str], #[case] code: i32, #[case] reason: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = evap_json(&cfg, args);
    assert_eq!(out.status.code(), Some(code));

    let v = last_json_line(&out.stderr);
    assert_eq!(v["reason"], reason);
    assert!(v["message"].as_str().is_some_and(|m| m.contains("What happened")));
}

#[test]
fn step_too_large_carries_details() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = evap_json(&cfg, &["set", "--param", "hv", "--target", "850"]);
    let v = last_json_line(&out.stderr);
    assert_eq!(v["details"]["setpoint"], "HV");
    assert_eq!(v["details"]["delta"], 50.0);
    assert_eq!(v["details"]["max_step"], 20.0);
}

#[test]
fn degas_report_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let out = evap_json(&cfg, &["degas", "--target", "5.2", "--duration-s", "0.4"]);
    assert!(out.status.success());

    let text = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<serde_json::Value> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let (report, ticks) = lines.split_last().unwrap();
    assert!(ticks.iter().all(|t| t["tick"].is_u64()));
    assert_eq!(report["state"], "completed");
    assert_eq!(report["applied"], 2);
    assert_eq!(report["planned"], 2);
    assert!(report["error"].is_null());
}
