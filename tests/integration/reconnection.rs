//! Disconnect grace period and session restoration.

use std::time::Duration;

use echo_core::{EndReason, InboundEvent, OutboundEvent};

use crate::*;

/// A drops, comes back 10s later on a new socket and finds its history.
#[tokio::test(start_paused = true)]
async fn test_reconnect_restores_session_and_history() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);
    let b_user = user_of(&c, &sid, &b.id);

    say(&mut c, &a, "before the tunnel").await;
    say(&mut c, &b, "see you on the other side").await;
    a.events();
    b.events();

    c.handle(a.id, InboundEvent::Disconnect).await;
    let OutboundEvent::PartnerDisconnected { grace_secs } = b.only() else {
        panic!("b should hear about the drop");
    };
    assert_eq!(grace_secs, 30);
    assert_eq!(c.status().pending_reconnects, 1);

    tokio::time::advance(Duration::from_secs(10)).await;

    let mut a2 = join(&mut c, 10);
    c.handle(
        a2.id,
        InboundEvent::Reconnect {
            user_id: a_user.clone(),
        },
    )
    .await;

    let OutboundEvent::SessionRestored {
        session_id,
        user_id,
        partner_id,
        messages,
        partner_connected,
    } = a2.only()
    else {
        panic!("expected session-restored");
    };
    assert_eq!(session_id, sid);
    assert_eq!(user_id, a_user);
    assert_eq!(partner_id, b_user);
    assert!(partner_connected);
    let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["before the tunnel", "see you on the other side"]);

    assert!(matches!(b.only(), OutboundEvent::PartnerRestored));
    assert_eq!(c.status().pending_reconnects, 0);
    assert_eq!(c.registry().get_by_connection(&a2.id), Some(sid.clone()));
    assert!(c.registry().get_by_connection(&a.id).is_none());

    // Messages flow through the new socket.
    say(&mut c, &a2, "back").await;
    assert!(matches!(b.only(), OutboundEvent::MessageReceived(m) if m.body == "back"));
}

/// A never returns: the timer ends the session for B.
#[tokio::test(start_paused = true)]
async fn test_grace_expiry_ends_session() {
    let mut c = coordinator();
    let (a, mut b, sid) = paired(&mut c).await;

    c.handle(a.id, InboundEvent::Disconnect).await;
    b.events();

    assert!(c.handle_next_expiry().await);

    let OutboundEvent::SessionEnded { reason, .. } = b.only() else {
        panic!("expected session-ended");
    };
    assert_eq!(reason, EndReason::DisconnectTimeout);
    assert!(c.registry().get(&sid).is_none());
    assert_eq!(c.status().pending_reconnects, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_at_29s_succeeds() {
    let mut c = coordinator();
    let (a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    c.handle(a.id, InboundEvent::Disconnect).await;
    b.events();
    tokio::time::advance(Duration::from_secs(29)).await;

    let mut a2 = join(&mut c, 10);
    c.handle(a2.id, InboundEvent::Reconnect { user_id: a_user }).await;
    assert!(matches!(a2.only(), OutboundEvent::SessionRestored { .. }));
    assert!(matches!(b.only(), OutboundEvent::PartnerRestored));

    // The cancelled timer never ends the session.
    tokio::time::advance(GRACE).await;
    settle().await;
    assert!(c.registry().get(&sid).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_at_31s_fails() {
    let mut c = coordinator();
    let (a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    c.handle(a.id, InboundEvent::Disconnect).await;
    b.events();
    tokio::time::advance(Duration::from_secs(31)).await;

    let mut a2 = join(&mut c, 10);
    c.handle(a2.id, InboundEvent::Reconnect { user_id: a_user }).await;
    assert!(matches!(a2.only(), OutboundEvent::ReconnectFailed { .. }));

    let OutboundEvent::SessionEnded { reason, .. } = b.only() else {
        panic!("expected session-ended");
    };
    assert_eq!(reason, EndReason::DisconnectTimeout);
    assert!(c.registry().get(&sid).is_none());
}

#[tokio::test]
async fn test_reconnect_with_unknown_user_fails() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);

    c.handle(
        a.id,
        InboundEvent::Reconnect {
            user_id: "never-seen".into(),
        },
    )
    .await;
    assert!(matches!(a.only(), OutboundEvent::ReconnectFailed { .. }));
    assert_eq!(c.status().sessions, 0);
}

/// Both participants drop; whoever returns is told the partner is away.
#[tokio::test(start_paused = true)]
async fn test_both_disconnected_then_one_returns() {
    let mut c = coordinator();
    let (a, b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    c.handle(a.id, InboundEvent::Disconnect).await;
    c.handle(b.id, InboundEvent::Disconnect).await;
    assert_eq!(c.status().pending_reconnects, 2);

    tokio::time::advance(Duration::from_secs(5)).await;
    let mut a2 = join(&mut c, 10);
    c.handle(a2.id, InboundEvent::Reconnect { user_id: a_user }).await;
    let OutboundEvent::SessionRestored {
        partner_connected, ..
    } = a2.only()
    else {
        panic!("expected session-restored");
    };
    assert!(!partner_connected);
    assert_eq!(c.status().pending_reconnects, 1);

    // B's window still runs out and ends the session for A.
    assert!(c.handle_next_expiry().await);
    let OutboundEvent::SessionEnded { reason, .. } = a2.only() else {
        panic!("expected session-ended");
    };
    assert_eq!(reason, EndReason::DisconnectTimeout);
}
