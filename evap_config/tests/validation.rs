use evap_config::{load_file, load_toml};
use rstest::rstest;
use std::io::Write;

const MINIMAL: &str = r#"
[link]
port = "/dev/ttyUSB0"
"#;

#[test]
fn minimal_config_gets_controller_defaults() {
    let cfg = load_toml(MINIMAL).expect("parse TOML");
    cfg.validate().expect("minimal config should pass");
    assert_eq!(cfg.link.baud, 57_600);
    assert_eq!(cfg.link.read_timeout_ms, 1000);
    assert_eq!(cfg.link.get_settle_ms, 10);
    assert_eq!(cfg.link.set_settle_ms, 100);
    assert_eq!(cfg.controller.flux_scale, 1.0e9);
    assert_eq!(cfg.controller.max_hv_step_v, 20.0);
    assert_eq!(cfg.controller.max_emis_step_ma, 1.5);
    assert_eq!(cfg.controller.min_emis_for_raise_ma, 3.0);
    assert_eq!(cfg.ramp.min_step_interval_ms, 1500);
    assert_eq!(cfg.monitor.poll_interval_ms, 2000);
}

#[test]
fn missing_link_section_is_a_parse_error() {
    assert!(load_toml("[ramp]\nstep_size = 0.1\n").is_err());
}

#[rstest]
#[case("[controller]\nflux_scale = 0.0\n", "flux_scale")]
#[case("[controller]\nmax_hv_step_v = -1.0\n", "max_hv_step_v")]
#[case("[ramp]\nstep_size = 0.0\n", "step_size")]
#[case("[ramp]\nstep_size = 0.04\n", "step_size")]
#[case("[ramp]\nhv_step_v = 0.05\n", "hv_step_v")]
#[case("[ramp]\nmin_step_interval_ms = 0\n", "min_step_interval_ms")]
#[case("[ramp]\nstep_size = 2.0\n", "max_emis_step_ma")]
#[case("[ramp]\nhv_step_v = 50.0\n", "max_hv_step_v")]
#[case("[monitor]\npoll_interval_ms = 0\n", "poll_interval_ms")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn rejects_out_of_range(#[case] extra: &str, #[case] needle: &str) {
    let text = format!("{MINIMAL}\n{extra}");
    let cfg = load_toml(&text).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error {err} should mention {needle}"
    );
}

#[test]
fn quiet_longer_than_timeout_rejected() {
    let text = r#"
[link]
port = "/dev/ttyUSB0"
read_timeout_ms = 50
quiet_ms = 100
"#;
    let cfg = load_toml(text).expect("parse TOML");
    assert!(cfg.validate().is_err());
}

#[test]
fn firmware_flux_scale_is_configurable() {
    let text = format!("{MINIMAL}\n[controller]\nflux_scale = 1e10\n");
    let cfg = load_toml(&text).expect("parse TOML");
    cfg.validate().unwrap();
    assert_eq!(cfg.controller.flux_scale, 1.0e10);
}

#[test]
fn load_file_validates() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "[link]\nport = \"\"").unwrap();
    let err = load_file(f.path()).unwrap_err();
    assert!(format!("{err}").contains("link.port"));
}
