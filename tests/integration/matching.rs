//! Anonymous and profiled matchmaking.

use echo_core::{InboundEvent, OutboundEvent};

use crate::*;

/// Two anonymous connections are matched with each other, no summary.
#[tokio::test]
async fn test_anonymous_pair() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);
    let mut b = join(&mut c, 2);

    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    let OutboundEvent::Waiting { user_id: waiting_id } = a.only() else {
        panic!("first requester should wait");
    };

    c.handle(b.id, InboundEvent::StartAnonymousMatch).await;
    let OutboundEvent::Matched {
        user_id: ua,
        partner_id: pa,
        match_summary: sa,
        is_profiled,
        ..
    } = a.only()
    else {
        panic!("a should be matched");
    };
    let OutboundEvent::Matched {
        user_id: ub,
        partner_id: pb,
        match_summary: sb,
        ..
    } = b.only()
    else {
        panic!("b should be matched");
    };

    assert_eq!(ua, waiting_id);
    assert_eq!(pa, ub);
    assert_eq!(pb, ua);
    assert!(sa.is_none() && sb.is_none());
    assert!(!is_profiled);

    let status = c.status();
    assert_eq!(status.sessions, 1);
    assert_eq!(status.waiting_anonymous, 0);
}

/// Same city and one shared interest score 53 and match.
#[tokio::test]
async fn test_profiled_match_above_threshold() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);
    let mut b = join(&mut c, 2);

    c.handle(
        b.id,
        InboundEvent::StartProfiledMatch {
            profile: profile("Delhi", &["Tech"]),
        },
    )
    .await;
    assert!(matches!(b.only(), OutboundEvent::NoMatchAvailable { .. }));

    c.handle(
        a.id,
        InboundEvent::StartProfiledMatch {
            profile: profile("Delhi", &["Tech", "Music"]),
        },
    )
    .await;

    for client in [&mut a, &mut b] {
        let OutboundEvent::Matched {
            match_score,
            is_profiled,
            match_summary,
            ..
        } = client.only()
        else {
            panic!("expected matched");
        };
        assert_eq!(match_score, 53);
        assert!(is_profiled);
        let summary = match_summary.expect("profiled match carries a summary");
        assert_eq!(summary.same_city.as_deref(), Some("You are both from Delhi!"));
        assert!(summary.same_college.is_none());
        assert_eq!(summary.common_interests, vec!["Tech".to_string()]);
    }

    let sid = c.registry().get_by_connection(&a.id).unwrap();
    let session = c.registry().get(&sid).unwrap();
    assert_eq!(session.common_interests, vec!["Tech".to_string()]);
    assert!(session.is_profiled());
}

/// A zero-score candidate is never matched and the requester does not fall
/// back to the anonymous pool.
#[tokio::test]
async fn test_profiled_no_match_has_no_anonymous_fallback() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);
    let mut b = join(&mut c, 2);

    c.handle(
        b.id,
        InboundEvent::StartProfiledMatch {
            profile: profile("Mumbai", &["Gaming"]),
        },
    )
    .await;
    b.events();

    c.handle(
        a.id,
        InboundEvent::StartProfiledMatch {
            profile: profile("Delhi", &["Tech"]),
        },
    )
    .await;
    assert!(matches!(a.only(), OutboundEvent::NoMatchAvailable { .. }));
    assert!(b.events().is_empty());

    let status = c.status();
    assert_eq!(status.sessions, 0);
    assert_eq!(status.waiting_anonymous, 0);
    assert_eq!(status.waiting_profiled, 2);

    // An anonymous requester does not see profiled waiters either.
    let mut d = join(&mut c, 3);
    c.handle(d.id, InboundEvent::StartAnonymousMatch).await;
    assert!(matches!(d.only(), OutboundEvent::Waiting { .. }));
}

/// Switching modes moves the connection instead of duplicating it.
#[tokio::test]
async fn test_connection_is_in_at_most_one_pool() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);

    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    c.handle(
        a.id,
        InboundEvent::StartProfiledMatch {
            profile: profile("Pune", &["Art"]),
        },
    )
    .await;
    a.events();

    let status = c.status();
    assert_eq!(status.waiting_anonymous, 0);
    assert_eq!(status.waiting_profiled, 1);

    c.handle(a.id, InboundEvent::Skip).await;
    assert!(a.events().is_empty());
    assert!(!c.is_waiting(&a.id));
}

/// A waiter whose socket closed is never chosen as a partner.
#[tokio::test]
async fn test_closed_waiter_is_skipped() {
    let mut c = coordinator();
    let gone = join(&mut c, 1);
    let mut b = join(&mut c, 2);

    c.handle(gone.id, InboundEvent::StartAnonymousMatch).await;
    c.handle(gone.id, InboundEvent::Disconnect).await;
    drop(gone);

    c.handle(b.id, InboundEvent::StartAnonymousMatch).await;
    assert!(matches!(b.only(), OutboundEvent::Waiting { .. }));
    assert_eq!(c.status().sessions, 0);
}

/// A connection already in a session cannot start matchmaking again.
#[tokio::test]
async fn test_matchmaking_rejected_while_in_session() {
    let mut c = coordinator();
    let (mut a, _b, _sid) = paired(&mut c).await;

    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    let OutboundEvent::ValidationError { reason } = a.only() else {
        panic!("expected validation error");
    };
    assert!(reason.contains("already in an active session"));
    assert_eq!(c.status().sessions, 1);
}
