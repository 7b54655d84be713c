use evap_core::mocks::ScriptedLink;
use evap_core::{ControllerCfg, ControllerClient, EvapError, Param, Setpoint};
use rstest::rstest;

fn client(link: &ScriptedLink) -> ControllerClient<ScriptedLink> {
    ControllerClient::new(link.clone(), ControllerCfg::default())
}

#[test]
fn hv_step_at_bound_is_sent_once() {
    let link = ScriptedLink::new();
    let out = client(&link)
        .set(Setpoint::Hv, 820.0, 800.0, 20.0)
        .expect("within bound");
    assert_eq!(out.command, "SET HV +20.0");
    assert_eq!(link.sets(), vec!["SET HV +20.0".to_string()]);
}

#[test]
fn hv_step_over_bound_writes_nothing() {
    let link = ScriptedLink::new();
    let err = client(&link)
        .set(Setpoint::Hv, 820.0, 800.0, 15.0)
        .unwrap_err();
    assert!(matches!(
        err,
        EvapError::StepTooLarge { setpoint: Setpoint::Hv, max_step, .. } if max_step == 15.0
    ));
    assert!(link.sent().is_empty());
}

#[rstest]
#[case(Setpoint::Emis, 4.0, 5.0, 1.5, "SET EMIS -1.0")]
#[case(Setpoint::Emis, 6.2, 5.0, 1.5, "SET EMIS +1.2")]
#[case(Setpoint::Hv, 790.0, 800.0, 20.0, "SET HV -10.0")]
fn sign_follows_delta(
    #[case] sp: Setpoint,
    #[case] target: f64,
    #[case] reference: f64,
    #[case] max: f64,
    #[case] expected: &str,
) {
    let link = ScriptedLink::new();
    client(&link).set(sp, target, reference, max).unwrap();
    assert_eq!(link.sets(), vec![expected.to_string()]);
}

#[rstest]
#[case(Setpoint::Emis, 3.4, 5.0, 1.5)]
#[case(Setpoint::Hv, 770.0, 800.0, 20.0)]
fn negative_deltas_are_bounded_too(
    #[case] sp: Setpoint,
    #[case] target: f64,
    #[case] reference: f64,
    #[case] max: f64,
) {
    let link = ScriptedLink::new();
    let err = client(&link).set(sp, target, reference, max).unwrap_err();
    assert!(matches!(err, EvapError::StepTooLarge { delta, .. } if delta < 0.0));
    assert!(link.sent().is_empty());
}

#[test]
fn set_reply_is_passed_through_raw() {
    let link = ScriptedLink::new().reply("SET HV +5.0", "OK\r\n");
    let out = client(&link).set(Setpoint::Hv, 805.0, 800.0, 20.0).unwrap();
    assert_eq!(out.reply, "OK\r\n");
}

#[test]
fn flux_is_scaled_to_nanoamps() {
    let link = ScriptedLink::new().reply("GET Flux", "1.5e-8\r\n");
    let v = client(&link).get(Param::Flux).unwrap();
    assert!((v - 15.0).abs() < 1e-9);
}

#[rstest]
#[case("")]
#[case("garbage")]
#[case("1.2.3")]
#[case("nan")]
fn unparseable_reply_is_malformed(#[case] reply: &str) {
    let link = ScriptedLink::new().reply("GET Temp", reply);
    let err = client(&link).get(Param::Temp).unwrap_err();
    assert!(matches!(err, EvapError::MalformedReply { param: Param::Temp, .. }));
}

#[test]
fn link_failure_does_not_poison_next_exchange() {
    let link = ScriptedLink::new().reply("GET HV", "800\r\n");
    link.fail("GET HV", "device disconnected");
    let c = client(&link);
    assert!(matches!(c.get(Param::Hv), Err(EvapError::Hardware(_))));
    assert_eq!(c.get(Param::Hv).unwrap(), 800.0);
}
