#![no_main]
use libfuzzer_sys::fuzz_target;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let timing = evap_hardware::ReplyTiming {
        quiet: Duration::from_millis(1),
        timeout: Duration::from_millis(5),
        poll: Duration::ZERO,
    };
    let mut reader = std::io::Cursor::new(data);
    if let Ok(reply) = evap_hardware::read_reply(&mut reader, &timing) {
        if let Some(v) = evap_core::client::parse_reading(&reply) {
            assert!(v.is_finite());
        }
    }
});
