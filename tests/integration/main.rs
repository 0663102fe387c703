//! Echo integration test harness.
//!
//! Tests drive a `SessionCoordinator` directly through inbound events and
//! observe what each connection's outbound queue receives. Time-dependent
//! tests run on a paused clock:
//!
//!   cargo test --test integration

use std::time::Duration;

use tokio::sync::mpsc;

use echo_core::{ConnectionId, InboundEvent, OutboundEvent, Profile, SessionId, UserId};
use echo_services::{SessionBackup, SessionCoordinator, SessionRegistry};

mod backup;
mod matching;
mod messaging;
mod reconnection;
mod signaling;

// ── Harness ───────────────────────────────────────────────────────────────────

/// One simulated socket: its connection id and the coordinator's queue to it.
pub struct Client {
    pub id: ConnectionId,
    rx: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Client {
    /// Everything queued so far, minus user-count broadcasts.
    pub fn events(&mut self) -> Vec<OutboundEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.rx.try_recv() {
            if !matches!(e, OutboundEvent::UserCount { .. }) {
                out.push(e);
            }
        }
        out
    }

    /// The single pending event. Panics when there is not exactly one.
    pub fn only(&mut self) -> OutboundEvent {
        let mut events = self.events();
        assert_eq!(events.len(), 1, "expected one event, got {events:?}");
        events.remove(0)
    }
}

pub fn coordinator() -> SessionCoordinator {
    SessionCoordinator::new(SessionRegistry::new(), SessionBackup::disabled())
}

pub fn join(c: &mut SessionCoordinator, id: u64) -> Client {
    let (tx, rx) = mpsc::unbounded_channel();
    c.connect(ConnectionId(id), tx);
    Client {
        id: ConnectionId(id),
        rx,
    }
}

/// Connect two clients and pair them anonymously. `a` asks second, so it is
/// participant A of the session.
pub async fn paired(c: &mut SessionCoordinator) -> (Client, Client, SessionId) {
    let mut a = join(c, 1);
    let mut b = join(c, 2);
    c.handle(b.id, InboundEvent::StartAnonymousMatch).await;
    c.handle(a.id, InboundEvent::StartAnonymousMatch).await;
    let session_id = c
        .registry()
        .get_by_connection(&a.id)
        .expect("pair should be in session");
    a.events();
    b.events();
    (a, b, session_id)
}

pub fn user_of(c: &SessionCoordinator, session_id: &str, connection_id: &ConnectionId) -> UserId {
    let session = c.registry().get(session_id).expect("session exists");
    let slot = session.slot_of(connection_id).expect("connection in session");
    session.participant(slot).user_id.clone()
}

pub fn profile(city: &str, interests: &[&str]) -> Profile {
    Profile::new(city, interests)
}

pub async fn say(c: &mut SessionCoordinator, from: &Client, body: &str) {
    c.handle(
        from.id,
        InboundEvent::SendMessage {
            session_id: None,
            body: body.to_string(),
            attachment_ref: None,
        },
    )
    .await;
}

/// Let spawned backup writes run to completion.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub const GRACE: Duration = Duration::from_secs(30);
