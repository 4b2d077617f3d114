mod common;

use std::collections::VecDeque;

use pri_config::InterfaceKind;
use pri_core::{SwitchType, debug, sapi, tei};
use pri_entities::SetupRequest;
use pri_pdus::q921::{Q921Control, TeiMgmtMsg, TeiMsgType, UFrameKind};
use pri_saps::cc::PriEvent;

use common::{LinkedPair, decode_frame};

fn dial(pair: &mut LinkedPair, number: &str) -> u16 {
    let req = SetupRequest::new(number, 0x21).channel(1, true, false);
    pair.cpe.pri.call(&req).expect("SETUP goes out")
}

#[test]
fn test_link_establishment() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);

    // The user side starts with SABME, the network waits for it
    assert!(pair.cpe.inbound.is_empty());
    let frames = pair.net.intercept();
    assert_eq!(frames.len(), 1);
    let sabme = decode_frame(&frames[0]);
    assert_eq!(sabme.header.sapi, sapi::CALL_CTRL);
    assert_eq!(sabme.header.tei, tei::PRI);
    assert!(!sabme.header.c_r, "user side commands carry C/R 0");
    assert_eq!(sabme.control, Q921Control::U { kind: UFrameKind::Sabme, p_f: true });

    pair.net.inject.send(frames[0].clone()).unwrap();
    pair.pump();
    assert!(pair.net.is_up());
    assert!(pair.cpe.is_up());
    assert_eq!(pair.net.take_events(), vec![PriEvent::DchanUp]);
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanUp]);

    let info = pair.net.pri.dump_info_str();
    assert!(info.contains("Q921 RX: 1\n"), "{}", info);
    assert!(info.contains("Q921 TX: 1\n"), "{}", info);
}

#[test]
fn test_network_polls_with_sabme_when_the_user_is_silent() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    // Lose the user's SABME
    pair.net.intercept();

    pair.advance(1000);
    let frames = pair.cpe.intercept();
    assert_eq!(frames.len(), 1);
    let sabme = decode_frame(&frames[0]);
    assert!(sabme.header.c_r, "network commands carry C/R 1");
    assert_eq!(sabme.control, Q921Control::U { kind: UFrameKind::Sabme, p_f: true });

    pair.cpe.inject.send(frames[0].clone()).unwrap();
    pair.pump();
    assert!(pair.net.is_up() && pair.cpe.is_up());
}

#[test]
fn test_window_never_exceeds_k() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();

    // Nine SETUPs while the network is not reading
    let calls: Vec<u16> = (0..9).map(|i| dial(&mut pair, &format!("555100{}", i))).collect();
    assert_eq!(calls.len(), 9);

    let root = pair.cpe.pri.lapd().unwrap().root().unwrap();
    assert_eq!(root.window, 7);
    assert_eq!(root.windowlen, 7);
    assert_eq!(root.txqueue.len(), 9);
    assert_eq!(root.txqueue.iter().filter(|f| f.transmitted).count(), 7);
    assert_eq!(pair.net.inbound.len(), 7);

    // Sequence numbers on the wire are consecutive
    let frames = pair.net.intercept();
    for (i, raw) in frames.iter().enumerate() {
        match decode_frame(raw).control {
            Q921Control::I { n_s, .. } => assert_eq!(n_s as usize, i),
            other => panic!("expected an I-frame, got {:?}", other),
        }
        pair.net.inject.send(raw.clone()).unwrap();
    }

    pair.pump();
    let root = pair.cpe.pri.lapd().unwrap().root().unwrap();
    assert_eq!(root.windowlen, 0);
    assert!(root.txqueue.is_empty());
    assert_eq!(root.v_a, 9);
    assert_eq!(root.v_s, 9);

    let rings = pair.net.take_events().into_iter().filter(|e| matches!(e, PriEvent::Ring(_))).count();
    assert_eq!(rings, 9);
}

/// Outstanding frames span v_a..v_s, the window counts the ones on the wire
fn assert_window_consistent(pair: &LinkedPair) {
    let root = pair.cpe.pri.lapd().unwrap().root().unwrap();
    let outstanding = (root.v_s.wrapping_sub(root.v_a) & 0x7f) as usize;
    assert_eq!(outstanding, root.txqueue.len(), "v_s {} v_a {}", root.v_s, root.v_a);
    assert_eq!(root.windowlen, root.txqueue.iter().filter(|f| f.transmitted).count());
    assert!(root.windowlen <= root.window, "window {}/{}", root.windowlen, root.window);
}

#[test]
fn test_window_accounting_at_every_step() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();
    assert_window_consistent(&pair);

    for i in 0..9 {
        dial(&mut pair, &format!("555200{}", i));
        assert_window_consistent(&pair);
    }

    // Hand the network one frame at a time, in order. Each acknowledgement
    // opens the window and the next waiting SETUP joins the end of the line.
    let mut line: VecDeque<Vec<u8>> = pair.net.intercept().into();
    assert_eq!(line.len(), 7);
    let mut delivered = 0;
    while let Some(raw) = line.pop_front() {
        pair.net.inject.send(raw).unwrap();
        pair.net.pump();
        pair.cpe.pump();
        assert_window_consistent(&pair);
        line.extend(pair.net.intercept());
        delivered += 1;
    }
    assert_eq!(delivered, 9);
    let root = pair.cpe.pri.lapd().unwrap().root().unwrap();
    assert!(root.txqueue.is_empty());
    assert_eq!((root.v_a, root.v_s), (9, 9));
}

#[test]
fn test_t200_retransmits_the_same_frame_until_n200() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();

    dial(&mut pair, "5551000");
    let first = pair.net.intercept();
    assert_eq!(first.len(), 1);
    let original = decode_frame(&first[0]);
    assert_eq!(original.control, Q921Control::I { n_s: 0, n_r: 0, p: false });

    pair.advance(1000);
    let retrans1 = pair.net.intercept();
    pair.advance(1000);
    let retrans2 = pair.net.intercept();
    assert_eq!(retrans1.len(), 1);
    assert_eq!(retrans1, retrans2, "retransmissions are identical");
    let again = decode_frame(&retrans1[0]);
    assert_eq!(again.control, Q921Control::I { n_s: 0, n_r: 0, p: true });
    assert_eq!(again.payload, original.payload);
    assert_eq!(pair.cpe.pri.lapd().unwrap().root().unwrap().retrans, 2);
    assert!(pair.cpe.take_events().is_empty());

    // N200 reached: the link is dropped and re-established from scratch
    pair.advance(1000);
    let frames = pair.net.intercept();
    assert_eq!(frames.len(), 1);
    assert_eq!(decode_frame(&frames[0]).control, Q921Control::U { kind: UFrameKind::Sabme, p_f: true });
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanDown]);
    let root = pair.cpe.pri.lapd().unwrap().root().unwrap();
    assert!(root.txqueue.is_empty());
    assert_eq!(root.windowlen, 0);

    pair.net.inject.send(frames[0].clone()).unwrap();
    pair.pump();
    assert!(pair.net.is_up() && pair.cpe.is_up());
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanUp]);
}

#[test]
fn test_bri_ptmp_tei_assignment() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::EuroIsdnE1, InterfaceKind::BriPtmp);

    // The terminal asks for a TEI on the broadcast management link
    let frames = pair.net.intercept();
    assert_eq!(frames.len(), 1);
    let request = decode_frame(&frames[0]);
    assert_eq!(request.header.sapi, sapi::LAYER2_MANAGEMENT);
    assert_eq!(request.header.tei, tei::GROUP);
    assert!(matches!(request.control, Q921Control::U { kind: UFrameKind::Ui, .. }));
    let msg = TeiMgmtMsg::from_bytes(&request.payload).unwrap();
    assert_eq!(msg.msg, TeiMsgType::IdentityRequest);
    assert_eq!(msg.ai, tei::GROUP);

    pair.net.inject.send(frames[0].clone()).unwrap();
    pair.pump();
    assert!(pair.net.is_up() && pair.cpe.is_up());

    for side in [&pair.net, &pair.cpe] {
        let lapd = side.pri.lapd().unwrap();
        let root = lapd.root().unwrap();
        let sub = lapd.instance(root.subchannel.expect("TEI subchannel")).unwrap();
        assert_eq!(sub.tei, tei::AUTO_FIRST);
        assert_eq!(sub.sapi, sapi::CALL_CTRL);
        assert_eq!(sub.master, Some(root.id));
    }
    assert_eq!(pair.net.take_events(), vec![PriEvent::DchanUp]);
    assert_eq!(pair.cpe.take_events(), vec![PriEvent::DchanUp]);

    // Calls run on the assigned TEI
    dial(&mut pair, "1234");
    pair.pump();
    let events = pair.net.take_events();
    let Some(PriEvent::Ring(ring)) = events.first() else { panic!("expected RING, got {:?}", events) };
    assert_eq!(ring.callednum, "1234");
}

#[test]
fn test_scheduler_exhaustion_is_survived() {
    debug::setup_logging_verbose();
    let mut pair = LinkedPair::new(SwitchType::Ni2, InterfaceKind::Pri);
    pair.establish_quiet();

    // Every SETUP arms T303, far more than there are timer slots
    let calls: Vec<u16> = (0..140).map(|i| dial(&mut pair, &format!("{}", 1000 + i))).collect();
    assert_eq!(pair.cpe.pri.pending_timers(), 127);

    let cc = pair.cpe.pri.call_control().unwrap();
    let last = cc.call(*calls.last().unwrap()).unwrap();
    assert!(last.retranstimer.is_none());
    let first = cc.call(calls[0]).unwrap();
    assert!(first.retranstimer.is_some());
}
