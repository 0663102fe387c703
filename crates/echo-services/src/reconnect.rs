//! Reconnection window — pending-disconnect records with a fixed grace period.
//!
//! Each record owns a one-shot timer task. When the timer fires it posts an
//! [`Expiry`] back to the coordinator; the record's generation guards
//! against expiries that raced with a reconnect or a newer disconnect.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use echo_core::{now_millis, SessionId, UserId};

/// How long a session survives a dropped participant.
pub const RECONNECT_GRACE: Duration = Duration::from_secs(30);

/// Timer notification delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry {
    pub user_id: UserId,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDisconnect {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub disconnected_at: Instant,
    /// Wall-clock copy of `disconnected_at`, for backup snapshots.
    pub disconnect_time_ms: u64,
    pub generation: u64,
}

impl PendingDisconnect {
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            disconnect_time_ms: self.disconnect_time_ms,
        }
    }
}

/// Serializable form of a pending record, as written to backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSnapshot {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub disconnect_time_ms: u64,
}

impl PendingSnapshot {
    /// Whether the snapshot is still inside the grace period at `now_ms`.
    pub fn within_grace(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.disconnect_time_ms) <= RECONNECT_GRACE.as_millis() as u64
    }
}

/// Outcome of a reconnect lookup. The record is cleared in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectAttempt {
    Restored(PendingDisconnect),
    /// A record existed but the grace period had already run out.
    Expired(PendingDisconnect),
    Unknown,
}

struct PendingRecord {
    pending: PendingDisconnect,
    timer: AbortHandle,
}

pub struct ReconnectionWindow {
    pending: HashMap<UserId, PendingRecord>,
    grace: Duration,
    next_generation: u64,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
}

impl ReconnectionWindow {
    pub fn new(expiry_tx: mpsc::UnboundedSender<Expiry>) -> Self {
        Self {
            pending: HashMap::new(),
            grace: RECONNECT_GRACE,
            next_generation: 0,
            expiry_tx,
        }
    }

    /// Open a grace window for `user_id`, replacing any earlier one.
    pub fn mark_disconnected(&mut self, user_id: &str, session_id: &str) -> PendingDisconnect {
        self.next_generation += 1;
        let pending = PendingDisconnect {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            disconnected_at: Instant::now(),
            disconnect_time_ms: now_millis(),
            generation: self.next_generation,
        };

        let tx = self.expiry_tx.clone();
        let grace = self.grace;
        let expiry = Expiry {
            user_id: pending.user_id.clone(),
            generation: pending.generation,
        };
        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(expiry);
        })
        .abort_handle();

        let record = PendingRecord {
            pending: pending.clone(),
            timer,
        };
        if let Some(old) = self.pending.insert(pending.user_id.clone(), record) {
            old.timer.abort();
        }
        debug!(user_id, session_id, generation = pending.generation, "grace window opened");
        pending
    }

    pub fn try_reconnect(&mut self, user_id: &str) -> ReconnectAttempt {
        let Some(record) = self.pending.remove(user_id) else {
            return ReconnectAttempt::Unknown;
        };
        record.timer.abort();

        if record.pending.disconnected_at.elapsed() <= self.grace {
            ReconnectAttempt::Restored(record.pending)
        } else {
            ReconnectAttempt::Expired(record.pending)
        }
    }

    /// Consume the record a timer fired for. Returns `None` when the record
    /// is gone or was replaced since the timer was armed.
    pub fn expire(&mut self, expiry: &Expiry) -> Option<PendingDisconnect> {
        let current = self.pending.get(&expiry.user_id)?;
        if current.pending.generation != expiry.generation {
            return None;
        }
        self.pending.remove(&expiry.user_id).map(|r| r.pending)
    }

    /// Drop every record pointing at `session_id` and cancel their timers.
    pub fn cancel_for_session(&mut self, session_id: &str) -> Vec<PendingDisconnect> {
        let users: Vec<UserId> = self
            .pending
            .iter()
            .filter(|(_, r)| r.pending.session_id == session_id)
            .map(|(u, _)| u.clone())
            .collect();

        users
            .into_iter()
            .filter_map(|u| self.pending.remove(&u))
            .map(|r| {
                r.timer.abort();
                r.pending
            })
            .collect()
    }

    pub fn get(&self, user_id: &str) -> Option<&PendingDisconnect> {
        self.pending.get(user_id).map(|r| &r.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for ReconnectionWindow {
    fn drop(&mut self) {
        for record in self.pending.values() {
            record.timer.abort();
        }
    }
}
