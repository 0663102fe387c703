//! Message relay, session termination and moderation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use echo_core::{EndReason, InboundEvent, OutboundEvent};
use echo_services::{AnalysisError, Moderation, TextAnalysis, TextAnalyzer};

use crate::*;

#[tokio::test]
async fn test_messages_relay_and_accumulate() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    say(&mut c, &a, "hello").await;
    say(&mut c, &b, "hey there").await;
    say(&mut c, &a, "how are you").await;

    let to_b = b.events();
    assert_eq!(to_b.len(), 2);
    let OutboundEvent::MessageReceived(first) = &to_b[0] else {
        panic!("expected message");
    };
    assert_eq!(first.body, "hello");
    assert_eq!(first.sender_id, a_user);

    let to_a = a.events();
    assert!(matches!(&to_a[..], [OutboundEvent::MessageReceived(m)] if m.body == "hey there"));

    let session = c.registry().get(&sid).unwrap();
    assert_eq!(session.message_count, 3);
    assert_eq!(session.messages.len(), session.message_count);
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;

    say(&mut c, &a, "   ").await;
    assert!(matches!(a.only(), OutboundEvent::ValidationError { .. }));
    assert!(b.events().is_empty());
    assert_eq!(c.registry().get(&sid).unwrap().message_count, 0);
}

#[tokio::test]
async fn test_message_for_other_session_is_rejected() {
    let mut c = coordinator();
    let (mut a, mut b, _sid) = paired(&mut c).await;

    c.handle(
        a.id,
        InboundEvent::SendMessage {
            session_id: Some("someone-elses".into()),
            body: "sneaky".into(),
            attachment_ref: None,
        },
    )
    .await;
    let OutboundEvent::Error { code, .. } = a.only() else {
        panic!("expected error");
    };
    assert_eq!(code, "not-a-participant");
    assert!(b.events().is_empty());
}

/// End notifies both sides with duration and count, and both may rematch.
#[tokio::test]
async fn test_end_reports_totals_to_both() {
    let mut c = coordinator();
    let (mut a, mut b, sid) = paired(&mut c).await;
    say(&mut c, &a, "one").await;
    say(&mut c, &b, "two").await;
    a.events();
    b.events();

    c.handle(b.id, InboundEvent::End).await;
    for client in [&mut a, &mut b] {
        let OutboundEvent::SessionEnded {
            reason,
            message_count,
            ..
        } = client.only()
        else {
            panic!("expected session-ended");
        };
        assert_eq!(reason, EndReason::UserEnded);
        assert_eq!(message_count, 2);
    }
    assert!(c.registry().get(&sid).is_none());
    assert!(c.registry().get_by_connection(&a.id).is_none());

    // A message after the end has nowhere to go.
    say(&mut c, &a, "still there?").await;
    let OutboundEvent::Error { code, .. } = a.only() else {
        panic!("expected error");
    };
    assert_eq!(code, "no-active-session");

    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    c.handle(b.id, InboundEvent::StartAnonymousMatch).await;
    assert_eq!(c.status().sessions, 1);
}

struct CountingAnalyzer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextAnalyzer for CountingAnalyzer {
    async fn analyze(&self, _text: &str) -> Result<TextAnalysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TextAnalysis {
            toxicity: 0.9,
            ..TextAnalysis::neutral()
        })
    }
}

/// Moderation runs off the relay path; the partner still gets the message.
#[tokio::test]
async fn test_moderation_does_not_block_relay() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut c = coordinator().with_moderation(Moderation {
        analyzer: Arc::new(CountingAnalyzer {
            calls: calls.clone(),
        }),
        flag_threshold: 0.7,
    });
    let (a, mut b, _sid) = paired(&mut c).await;

    say(&mut c, &a, "you are the worst").await;
    assert!(matches!(b.only(), OutboundEvent::MessageReceived(_)));

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
