//! Session registry — active chat sessions and their lookup indices.
//!
//! Three tables share one lifetime: sessions by id, and the session id by
//! each participant's connection and user id. Only the coordinator writes;
//! the HTTP layer reads through cheap clones.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use echo_core::{
    now_millis, ConnectionId, CoordinatorError, MatchSummary, Message, Profile, SessionId, UserId,
};

/// Which side of a session a participant occupies. A always offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Participant {
    pub fn new(connection_id: ConnectionId, user_id: UserId, profile: Option<Profile>) -> Self {
        Self {
            connection_id,
            user_id,
            connected: true,
            profile,
        }
    }
}

/// A two-party chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub room_id: String,
    pub participant_a: Participant,
    pub participant_b: Participant,
    pub messages: Vec<Message>,
    pub message_count: usize,
    /// Unix milliseconds.
    pub started_at_ms: u64,
    /// 0 for anonymous sessions.
    pub match_score: u8,
    pub common_interests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_summary: Option<MatchSummary>,
}

impl Session {
    pub fn participant(&self, slot: Slot) -> &Participant {
        match slot {
            Slot::A => &self.participant_a,
            Slot::B => &self.participant_b,
        }
    }

    fn participant_mut(&mut self, slot: Slot) -> &mut Participant {
        match slot {
            Slot::A => &mut self.participant_a,
            Slot::B => &mut self.participant_b,
        }
    }

    pub fn slot_of(&self, connection_id: &ConnectionId) -> Option<Slot> {
        if self.participant_a.connection_id == *connection_id {
            Some(Slot::A)
        } else if self.participant_b.connection_id == *connection_id {
            Some(Slot::B)
        } else {
            None
        }
    }

    pub fn slot_of_user(&self, user_id: &str) -> Option<Slot> {
        if self.participant_a.user_id == user_id {
            Some(Slot::A)
        } else if self.participant_b.user_id == user_id {
            Some(Slot::B)
        } else {
            None
        }
    }

    /// The participant that is not `connection_id`.
    pub fn partner_of(&self, connection_id: &ConnectionId) -> Result<&Participant, CoordinatorError> {
        self.slot_of(connection_id)
            .map(|slot| self.participant(slot.other()))
            .ok_or(CoordinatorError::NotAParticipant(*connection_id))
    }

    pub fn duration_ms(&self) -> u64 {
        now_millis().saturating_sub(self.started_at_ms)
    }

    pub fn is_profiled(&self) -> bool {
        self.participant_a.profile.is_some() && self.participant_b.profile.is_some()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Session>>,
    by_connection: Arc<DashMap<ConnectionId, SessionId>>,
    by_user: Arc<DashMap<UserId, SessionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and index a new session. Stale indices for either participant
    /// are overwritten.
    pub fn create(
        &self,
        participant_a: Participant,
        participant_b: Participant,
        match_score: u8,
        common_interests: Vec<String>,
        match_summary: Option<MatchSummary>,
    ) -> Session {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            room_id: format!("room-{session_id}"),
            session_id,
            participant_a,
            participant_b,
            messages: Vec::new(),
            message_count: 0,
            started_at_ms: now_millis(),
            match_score,
            common_interests,
            match_summary,
        };
        self.install(session.clone());
        session
    }

    /// Re-insert a session recovered from backup.
    pub fn restore(&self, session: Session) {
        self.install(session);
    }

    fn install(&self, session: Session) {
        let id = session.session_id.clone();
        for p in [&session.participant_a, &session.participant_b] {
            if p.connected {
                self.by_connection.insert(p.connection_id, id.clone());
            }
            self.by_user.insert(p.user_id.clone(), id.clone());
        }
        self.sessions.insert(id, session);
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn get_by_connection(&self, connection_id: &ConnectionId) -> Option<SessionId> {
        self.by_connection.get(connection_id).map(|id| id.clone())
    }

    pub fn session_for_user(&self, user_id: &str) -> Option<SessionId> {
        self.by_user.get(user_id).map(|id| id.clone())
    }

    /// Append a message and bump the count in one step. Returns the new count.
    pub fn append_message(&self, session_id: &str, message: Message) -> Result<usize, CoordinatorError> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionNotFound(session_id.to_string()))?;
        session.messages.push(message);
        session.message_count = session.messages.len();
        Ok(session.message_count)
    }

    /// Remove the session and every index pointing at it. Idempotent.
    pub fn terminate(&self, session_id: &str) -> Option<Session> {
        let (_, session) = self.sessions.remove(session_id)?;
        for p in [&session.participant_a, &session.participant_b] {
            self.by_connection
                .remove_if(&p.connection_id, |_, id| id == session_id);
            self.by_user.remove_if(&p.user_id, |_, id| id == session_id);
        }
        Some(session)
    }

    /// Flag the participant on `slot` as disconnected and drop its
    /// connection index. The user index is kept for reconnection.
    pub fn mark_disconnected(&self, session_id: &str, slot: Slot) -> Option<Session> {
        let snapshot = {
            let mut session = self.sessions.get_mut(session_id)?;
            session.participant_mut(slot).connected = false;
            session.clone()
        };
        let conn = snapshot.participant(slot).connection_id;
        self.by_connection.remove_if(&conn, |_, id| id == session_id);
        Some(snapshot)
    }

    /// Bind a new connection into `slot` and mark it connected.
    pub fn rebind(&self, session_id: &str, slot: Slot, connection_id: ConnectionId) -> Option<Session> {
        let (old, snapshot) = {
            let mut session = self.sessions.get_mut(session_id)?;
            let p = session.participant_mut(slot);
            let old = std::mem::replace(&mut p.connection_id, connection_id);
            p.connected = true;
            (old, session.clone())
        };
        self.by_connection.remove_if(&old, |_, id| id == session_id);
        self.by_connection
            .insert(connection_id, session_id.to_string());
        Some(snapshot)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of every active session, oldest first.
    pub fn list(&self) -> Vec<Session> {
        let mut all: Vec<Session> = self.sessions.iter().map(|s| s.value().clone()).collect();
        all.sort_by_key(|s| s.started_at_ms);
        all
    }
}
