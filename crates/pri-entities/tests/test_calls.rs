mod common;

use pri_config::{InterfaceKind, TimerIdx};
use pri_core::{CallRef, NodeType, SwitchType, debug, sapi, tei};
use pri_entities::SetupRequest;
use pri_pdus::q921::{Q921Frame, Q921Header, UFrameKind};
use pri_pdus::q931::{CallState, MsgType};
use pri_saps::cc::PriEvent;

use common::{LinkedPair, decode_q931, default_test_config};

/// Places a call from the CPE and returns (cpe call, network call)
fn ring(pair: &mut LinkedPair, req: &SetupRequest) -> (CallRef, CallRef, PriEvent) {
    let ours = pair.cpe.pri.call(req).expect("SETUP goes out");
    pair.pump();
    let mut events = pair.net.take_events();
    let theirs = match events.first() {
        Some(PriEvent::Ring(ring)) => ring.call,
        _ => panic!("no RING on the network side: {:?}", events),
    };
    (ours, theirs, events.swap_remove(0))
}

fn active_call(pair: &mut LinkedPair) -> (CallRef, CallRef) {
    let req = SetupRequest::new("5551000", 0x21).channel(3, true, false);
    let (ours, theirs, ev) = ring(pair, &req);
    let PriEvent::Ring(ring) = ev else { unreachable!() };
    pair.net.pri.proceeding(theirs, ring.channel, false).unwrap();
    pair.net.pri.acknowledge(theirs, ring.channel, false).unwrap();
    pair.net.pri.answer(theirs, ring.channel, false).unwrap();
    pair.pump();
    (ours, theirs)
}

fn call_state(pair: &LinkedPair, net: bool, cr: CallRef) -> Option<CallState> {
    let side = if net { &pair.net } else { &pair.cpe };
    side.pri.call_control().and_then(|cc| cc.call(cr)).map(|c| c.our_state)
}

#[test]
fn test_call_reaches_active() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();

    let (ours, theirs) = active_call(&mut pair);
    let events = pair.cpe.take_events();
    assert!(
        matches!(events.as_slice(), [PriEvent::Proceeding(_), PriEvent::Ringing(_), PriEvent::Answer(_)]),
        "{:?}",
        events
    );
    let PriEvent::Proceeding(ev) = &events[0] else { unreachable!() };
    assert_eq!(ev.call, ours);
    assert_eq!(ev.channel & 0xff, 3);

    assert_eq!(call_state(&pair, false, ours), Some(CallState::Active));
    assert_eq!(call_state(&pair, true, theirs), Some(CallState::Active));
    assert!(pair.net.take_events().is_empty());

    let info = pair.cpe.pri.dump_info_str();
    assert!(info.contains("Q931 TX: 2\n"), "{}", info);
    assert!(info.contains("Q931 RX: 3\n"), "{}", info);
}

#[test]
fn test_disconnect_teardown() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();
    let (ours, theirs) = active_call(&mut pair);
    pair.cpe.take_events();

    // Network clears first, the CPE application is asked to hang up
    pair.net.pri.hangup(theirs, 16).unwrap();
    pair.pump();
    let events = pair.cpe.take_events();
    assert_eq!(events.len(), 1);
    let PriEvent::HangupReq(req) = &events[0] else { panic!("expected HANGUP_REQ, got {:?}", events) };
    assert_eq!(req.cause, 16);
    assert_eq!(req.call, ours);

    pair.cpe.pri.hangup(ours, 16).unwrap();
    pair.pump();
    let events = pair.net.take_events();
    assert!(matches!(events.as_slice(), [PriEvent::Hangup(ev)] if ev.call == theirs), "{:?}", events);

    pair.net.pri.hangup(theirs, 16).unwrap();
    pair.pump();
    let events = pair.cpe.take_events();
    assert!(matches!(events.as_slice(), [PriEvent::HangupAck(ev)] if ev.cause == 16), "{:?}", events);
    assert!(call_state(&pair, false, ours).is_none());
    assert!(call_state(&pair, true, theirs).is_none());
}

#[test]
fn test_setup_without_bearer_is_refused() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();

    // SETUP, call reference 5 from the user side, called number only
    let payload = vec![0x08, 0x02, 0x00, 0x05, 0x05, 0x70, 0x04, 0xa1, b'1', b'2', b'3'];
    let frame = Q921Frame::iframe(Q921Header::new(sapi::CALL_CTRL, false, tei::PRI), 0, 0, false, payload);
    pair.net.inject_frame(&frame);
    pair.net.pump();

    let replies: Vec<_> = pair.cpe.intercept().iter().filter_map(|raw| decode_q931(raw)).collect();
    assert_eq!(replies.len(), 1);
    let rc = &replies[0];
    assert_eq!(rc.msg_type, MsgType::ReleaseComplete as u8);
    assert_eq!(rc.header.call_ref(), 0x8005);
    assert!(rc.body.windows(4).any(|w| w[0] == 0x08 && w[1] == 0x02 && w[3] == 0x80 | 96), "{:02x?}", rc.body);
    assert!(pair.net.take_events().iter().all(|e| !matches!(e, PriEvent::Ring(_))));
    assert!(pair.net.pri.call_control().unwrap().calls().next().is_none());
}

#[test]
fn test_qsig_diversion_and_name_reach_the_ring() {
    debug::setup_logging_verbose();
    let mut net_cfg = default_test_config(NodeType::Network, SwitchType::Qsig, InterfaceKind::Pri);
    let mut cpe_cfg = default_test_config(NodeType::Cpe, SwitchType::Qsig, InterfaceKind::Pri);
    net_cfg.sendfacility = true;
    cpe_cfg.sendfacility = true;
    let mut pair = LinkedPair::from_configs(net_cfg, cpe_cfg);
    pair.establish_quiet();

    let req = SetupRequest::new("3000", 0x21)
        .channel(1, true, false)
        .caller("1000", "Alice", 0x21, 0)
        .redirecting("2001", 0x21, 0, 1);
    let (_, _, ev) = ring(&mut pair, &req);
    let PriEvent::Ring(ring) = ev else { unreachable!() };
    assert_eq!(ring.callednum, "3000");
    assert_eq!(ring.callingnum, "1000");
    assert_eq!(ring.callingname, "Alice");
    assert_eq!(ring.redirectingnum, "2001");
    assert_eq!(ring.origcallednum, "2001");
}

#[test]
fn test_unanswered_setup_is_sent_twice_then_cleared() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();
    let req = SetupRequest::new("5551000", 0x21).channel(3, true, false);
    let (ours, theirs, _) = ring(&mut pair, &req);

    // The network application never answers
    for _ in 0..9 {
        pair.advance(1000);
        pair.pump();
    }
    let events = pair.cpe.take_events();
    let hangups: Vec<_> = events.iter().filter_map(|e| if let PriEvent::Hangup(h) = e { Some(h) } else { None }).collect();
    assert_eq!(hangups.len(), 1, "{:?}", events);
    assert_eq!(hangups[0].cause, 102);
    assert_eq!(hangups[0].call, ours);

    // The repeated SETUP belongs to the call already ringing
    let net_events = pair.net.take_events();
    assert!(net_events.iter().all(|e| !matches!(e, PriEvent::Ring(_))), "{:?}", net_events);
    assert_eq!(call_state(&pair, true, theirs), Some(CallState::CallPresent));
}

/// Active call with T309 running on the user side, link knocked down by a DM
fn pair_with_dropped_link() -> (LinkedPair, CallRef) {
    let net_cfg = default_test_config(NodeType::Network, SwitchType::Ni2, InterfaceKind::Pri);
    let mut cpe_cfg = default_test_config(NodeType::Cpe, SwitchType::Ni2, InterfaceKind::Pri);
    cpe_cfg.timers.set(TimerIdx::T309, 6000).unwrap();
    let mut pair = LinkedPair::from_configs(net_cfg, cpe_cfg);
    pair.establish_quiet();
    let (ours, _) = active_call(&mut pair);
    pair.cpe.take_events();

    let dm = Q921Frame::uframe(Q921Header::new(sapi::CALL_CTRL, false, tei::PRI), UFrameKind::Dm, true, Vec::new());
    pair.cpe.inject_frame(&dm);
    pair.cpe.pump();
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanDown]);
    assert_eq!(call_state(&pair, false, ours), Some(CallState::Active));
    (pair, ours)
}

#[test]
fn test_t309_keeps_the_call_over_a_short_outage() {
    debug::setup_logging_verbose();
    let (mut pair, ours) = pair_with_dropped_link();

    pair.advance(1000);
    pair.pump();
    assert!(pair.cpe.is_up());
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanUp]);
    assert_eq!(call_state(&pair, false, ours), Some(CallState::Active));
    assert!(pair.cpe.pri.call_control().unwrap().call(ours).unwrap().retranstimer.is_none());

    pair.advance(6000);
    pair.pump();
    assert!(pair.cpe.take_events().iter().all(|e| !matches!(e, PriEvent::Hangup(_))));
    assert_eq!(call_state(&pair, false, ours), Some(CallState::Active));
}

#[test]
fn test_t309_expiry_clears_the_call() {
    debug::setup_logging_verbose();
    let (mut pair, ours) = pair_with_dropped_link();

    // The network never hears the SABMEs
    for _ in 0..7 {
        pair.advance(1000);
        pair.net.intercept();
    }
    let events = pair.cpe.take_events();
    let hangups: Vec<_> = events.iter().filter_map(|e| if let PriEvent::Hangup(h) = e { Some(h) } else { None }).collect();
    assert_eq!(hangups.len(), 1, "{:?}", events);
    assert_eq!(hangups[0].cause, 27);
    assert_eq!(hangups[0].call, ours);
    assert_eq!(call_state(&pair, false, ours), Some(CallState::Null));
}
