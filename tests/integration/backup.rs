//! Persistence mirror: what is written, what is cleared, and cold-start
//! recovery of a held session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use echo_core::config::BackupConfig;
use echo_core::{InboundEvent, OutboundEvent};
use echo_services::{BackupError, BackupStore, MemoryBackup, SessionBackup};

use crate::*;

fn with_store(store: &MemoryBackup) -> SessionCoordinator {
    let backup = SessionBackup::new(Arc::new(store.clone()), &BackupConfig::default());
    SessionCoordinator::new(SessionRegistry::new(), backup)
}

#[tokio::test]
async fn test_waiting_and_session_are_mirrored() {
    let store = MemoryBackup::new();
    let mut c = with_store(&store);
    let a = join(&mut c, 1);
    let b = join(&mut c, 2);

    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    settle().await;
    assert!(store.contains(&format!("waiting:{}", a.id)));

    c.handle(b.id, InboundEvent::StartAnonymousMatch).await;
    say(&mut c, &a, "mirrored").await;
    settle().await;

    let sid = c.registry().get_by_connection(&a.id).unwrap();
    assert!(!store.contains(&format!("waiting:{}", a.id)));
    assert!(store.contains(&format!("session:{sid}")));
    assert!(store.contains(&format!("messages:{sid}")));

    c.handle(a.id, InboundEvent::End).await;
    settle().await;
    assert!(!store.contains(&format!("session:{sid}")));
    assert!(!store.contains(&format!("messages:{sid}")));
}

/// The process restarts while A is away. A reconnects to the new process
/// and gets its session and messages back from the store.
#[tokio::test(start_paused = true)]
async fn test_cold_start_recovers_held_session() {
    let store = MemoryBackup::new();

    let (a_user, sid) = {
        let mut c = with_store(&store);
        let (a, b, sid) = paired(&mut c).await;
        let a_user = user_of(&c, &sid, &a.id);
        say(&mut c, &a, "remember me").await;
        say(&mut c, &b, "always").await;
        c.handle(a.id, InboundEvent::Disconnect).await;
        settle().await;
        assert!(store.contains(&format!("user:{a_user}")));
        (a_user, sid)
    };

    tokio::time::advance(Duration::from_secs(5)).await;

    let mut c = with_store(&store);
    let mut a2 = join(&mut c, 50);
    c.handle(
        a2.id,
        InboundEvent::Reconnect {
            user_id: a_user.clone(),
        },
    )
    .await;
    // The lookup runs off the coordinator; nothing is answered until it lands.
    assert!(a2.events().is_empty());
    assert!(c.handle_next_recovery().await);

    let OutboundEvent::SessionRestored {
        session_id,
        messages,
        partner_connected,
        ..
    } = a2.only()
    else {
        panic!("expected session-restored");
    };
    assert_eq!(session_id, sid);
    assert!(!partner_connected);
    let bodies: Vec<_> = messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["remember me", "always"]);

    // B was lost with the old process and now has its own window.
    assert_eq!(c.status().pending_reconnects, 1);
    assert_eq!(c.registry().get_by_connection(&a2.id), Some(sid));
}

#[tokio::test]
async fn test_recovery_needs_a_backup() {
    let mut c = coordinator();
    let mut a = join(&mut c, 1);
    c.handle(
        a.id,
        InboundEvent::Reconnect {
            user_id: "from-a-previous-life".into(),
        },
    )
    .await;
    assert!(matches!(a.only(), OutboundEvent::ReconnectFailed { .. }));
}

struct FailingStore;

#[async_trait]
impl BackupStore for FailingStore {
    async fn save(&self, _: &str, _: String, _: Duration) -> Result<(), BackupError> {
        Err(BackupError::Unavailable("down".into()))
    }
    async fn get(&self, _: &str) -> Result<Option<String>, BackupError> {
        Err(BackupError::Unavailable("down".into()))
    }
    async fn delete(&self, _: &str) -> Result<(), BackupError> {
        Err(BackupError::Unavailable("down".into()))
    }
}

/// A broken store never affects live behaviour.
#[tokio::test(start_paused = true)]
async fn test_failing_backup_is_ignored() {
    let backup = SessionBackup::new(Arc::new(FailingStore), &BackupConfig::default());
    let mut c = SessionCoordinator::new(SessionRegistry::new(), backup);
    let (a, mut b, sid) = paired(&mut c).await;
    let a_user = user_of(&c, &sid, &a.id);

    say(&mut c, &a, "still works").await;
    assert!(matches!(b.only(), OutboundEvent::MessageReceived(_)));

    c.handle(a.id, InboundEvent::Disconnect).await;
    settle().await;
    assert!(matches!(b.only(), OutboundEvent::PartnerDisconnected { .. }));

    let mut a2 = join(&mut c, 10);
    c.handle(a2.id, InboundEvent::Reconnect { user_id: a_user }).await;
    assert!(matches!(a2.only(), OutboundEvent::SessionRestored { .. }));
    assert!(matches!(b.only(), OutboundEvent::PartnerRestored));
}
