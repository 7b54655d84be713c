#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<evap_config::Config>(data) {
        if cfg.validate().is_ok() {
            // A validated config must assemble into runtime settings.
            let _ = evap_core::RampCfg::from(&cfg.ramp);
            let _ = evap_core::SafetyCfg::from(&cfg.controller);
        }
    }
});
