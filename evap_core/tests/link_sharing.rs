use evap_core::{EvapSession, RampCfg, RampState, Setpoint};
use evap_hardware::SimulatedEvc;
use evap_traits::Link;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Simulator wrapper that counts exchanges entered while another is still
/// in flight.
#[derive(Clone)]
struct ExclusiveLink {
    sim: SimulatedEvc,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    exchanges: Arc<AtomicUsize>,
}

impl ExclusiveLink {
    fn new(sim: SimulatedEvc) -> Self {
        Self {
            sim,
            busy: Arc::new(AtomicBool::new(false)),
            overlaps: Arc::new(AtomicUsize::new(0)),
            exchanges: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Link for ExclusiveLink {
    fn exchange(
        &mut self,
        command: &str,
        settle: Duration,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        std::thread::sleep(Duration::from_micros(200));
        let reply = self.sim.exchange(command, settle);
        self.busy.store(false, Ordering::Release);
        reply
    }
}

#[test]
fn polling_and_ramp_never_overlap_on_the_link() {
    let sim = SimulatedEvc::with_setpoints(5.0, 800.0);
    let link = ExclusiveLink::new(sim.clone());
    let mut s = EvapSession::builder()
        .link(link.clone())
        .ramp(RampCfg {
            min_step_interval: Duration::from_millis(10),
            ..RampCfg::default()
        })
        .build()
        .expect("valid session");
    s.refresh();

    let handle = s
        .start_ramp(Setpoint::Emis, 6.0, Duration::from_millis(200))
        .unwrap();
    let mut ticks = 0;
    while !handle.is_finished() {
        s.tick();
        ticks += 1;
        std::thread::sleep(Duration::from_millis(1));
    }
    let report = handle.wait();

    assert_eq!(report.state, RampState::Completed);
    assert_eq!(report.applied, 10);
    assert!(ticks > 0);
    assert_eq!(s.log().len(), ticks);
    assert_eq!(link.overlaps.load(Ordering::Relaxed), 0);
    assert!(link.exchanges.load(Ordering::Relaxed) >= 6 * ticks + 10);
    assert!((sim.state().emis_ma - 6.0).abs() < 1e-6);
}
