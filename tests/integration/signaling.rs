//! Video call negotiation: request/accept, role assignment and relay.

use serde_json::json;

use echo_core::{EndReason, InboundEvent, OutboundEvent};

use crate::*;

#[tokio::test]
async fn test_request_accept_then_roles() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    c.handle(a.id, InboundEvent::RequestVideo).await;
    let OutboundEvent::VideoCallRequest { requester_id } = b.only() else {
        panic!("b should receive the request");
    };
    assert_eq!(requester_id, a_user);
    assert!(a.events().is_empty());

    c.handle(b.id, InboundEvent::AcceptVideo).await;
    for client in [&mut a, &mut b] {
        assert!(matches!(
            client.only(),
            OutboundEvent::VideoCallAccepted { session_id } if session_id == sid
        ));
    }

    c.handle(b.id, InboundEvent::SignalReady).await;
    assert!(a.events().is_empty() && b.events().is_empty());
    c.handle(a.id, InboundEvent::SignalReady).await;
    assert!(matches!(a.only(), OutboundEvent::CreateOffer { .. }));
    assert!(matches!(b.only(), OutboundEvent::AwaitOffer { .. }));
}

/// Three redundant readiness signals each still yield one assignment.
#[tokio::test]
async fn test_redundant_readiness_assigns_roles_once() {
    let mut c = coordinator();
    let (mut a, mut b, _sid) = paired(&mut c).await;

    for _ in 0..3 {
        c.handle(a.id, InboundEvent::SignalReady).await;
        c.handle(b.id, InboundEvent::SignalReady).await;
    }

    let offers: Vec<_> = a
        .events()
        .into_iter()
        .filter(|e| matches!(e, OutboundEvent::CreateOffer { .. }))
        .collect();
    let waits: Vec<_> = b
        .events()
        .into_iter()
        .filter(|e| matches!(e, OutboundEvent::AwaitOffer { .. }))
        .collect();
    assert_eq!(offers.len(), 1);
    assert_eq!(waits.len(), 1);
}

#[tokio::test]
async fn test_reject_reaches_requester_only() {
    let mut c = coordinator();
    let (mut a, mut b, _sid) = paired(&mut c).await;

    c.handle(a.id, InboundEvent::RequestVideo).await;
    b.events();
    c.handle(b.id, InboundEvent::RejectVideo).await;

    assert!(matches!(a.only(), OutboundEvent::VideoCallRejected));
    assert!(b.events().is_empty());
    assert_eq!(c.status().sessions, 1);
}

#[tokio::test]
async fn test_offer_answer_ice_relay_verbatim() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);
    let b_user = user_of(&c, &sid, &b.id);

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1"});
    let answer = json!({"type": "answer", "sdp": "v=0\r\no=- 99 2 IN IP4 127.0.0.1"});
    let ice = json!({"candidate": "candidate:1 1 UDP 2122252543 10.0.0.2 50000 typ host", "sdpMid": "0"});

    c.handle(a.id, InboundEvent::RelayOffer { payload: offer.clone() }).await;
    let OutboundEvent::Offer { payload, sender_id } = b.only() else {
        panic!("expected offer");
    };
    assert_eq!(payload, offer);
    assert_eq!(sender_id, a_user);

    c.handle(b.id, InboundEvent::RelayAnswer { payload: answer.clone() }).await;
    let OutboundEvent::Answer { payload, sender_id } = a.only() else {
        panic!("expected answer");
    };
    assert_eq!(payload, answer);
    assert_eq!(sender_id, b_user);

    c.handle(b.id, InboundEvent::RelayIce { payload: ice.clone() }).await;
    assert!(matches!(a.only(), OutboundEvent::IceCandidate { payload, .. } if payload == ice));
}

#[tokio::test]
async fn test_leave_call_ends_session() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;

    c.handle(a.id, InboundEvent::LeaveCall).await;

    let to_b = b.events();
    assert!(matches!(to_b[0], OutboundEvent::PartnerLeftCall));
    assert!(matches!(
        to_b[1],
        OutboundEvent::SessionEnded { reason: EndReason::UserLeftVideo, .. }
    ));
    assert!(matches!(
        a.only(),
        OutboundEvent::SessionEnded { reason: EndReason::UserLeftVideo, .. }
    ));
    assert!(c.registry().get(&sid).is_none());
}

/// Signaling that arrives after the session ended is dropped without
/// reaching anyone.
#[tokio::test]
async fn test_late_signaling_is_dropped() {
    let mut c = coordinator();
    let (mut a, mut b, _sid) = paired(&mut c).await;

    c.handle(a.id, InboundEvent::Skip).await;
    a.events();
    b.events();

    c.handle(b.id, InboundEvent::SignalReady).await;
    c.handle(b.id, InboundEvent::RelayIce { payload: json!({"candidate": ""}) }).await;
    assert!(a.events().is_empty());
    assert!(b.events().is_empty());
}
