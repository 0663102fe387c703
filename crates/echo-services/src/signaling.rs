//! Signaling arbiter — two-party readiness barrier for WebRTC role assignment.
//!
//! Per session: Idle -> AwaitingBoth -> RoleAssigned. Closing a session
//! drops its entry, so a closed session reads as Idle again.
//! Participant A always offers, whatever order the signals arrive in.

use std::collections::HashMap;

use echo_core::SessionId;

use crate::session::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    Idle,
    AwaitingBoth,
    RoleAssigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub a_ready: bool,
    pub b_ready: bool,
    pub phase: SignalPhase,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            a_ready: false,
            b_ready: false,
            phase: SignalPhase::Idle,
        }
    }
}

/// What the caller should do after a readiness signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// Still waiting on the other side.
    Waiting,
    /// Both ready: emit create-offer to A and await-offer to B, once.
    AssignRoles,
    /// Roles went out earlier; ignore.
    AlreadyAssigned,
}

#[derive(Debug, Default)]
pub struct SignalingArbiter {
    sessions: HashMap<SessionId, Readiness>,
}

impl SignalingArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_ready(&mut self, session_id: &str, slot: Slot) -> ReadinessOutcome {
        let state = self.sessions.entry(session_id.to_string()).or_default();

        if state.phase == SignalPhase::RoleAssigned {
            return ReadinessOutcome::AlreadyAssigned;
        }

        match slot {
            Slot::A => state.a_ready = true,
            Slot::B => state.b_ready = true,
        }

        if state.a_ready && state.b_ready {
            state.phase = SignalPhase::RoleAssigned;
            ReadinessOutcome::AssignRoles
        } else {
            state.phase = SignalPhase::AwaitingBoth;
            ReadinessOutcome::Waiting
        }
    }

    /// Discard readiness for a session that is ending. Returns the phase it
    /// was in, if it was tracked at all.
    pub fn close(&mut self, session_id: &str) -> Option<SignalPhase> {
        self.sessions.remove(session_id).map(|r| r.phase)
    }

    /// Forget readiness so a fresh barrier can run (after a reconnect).
    pub fn reset(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn phase(&self, session_id: &str) -> SignalPhase {
        self.sessions
            .get(session_id)
            .map(|r| r.phase)
            .unwrap_or(SignalPhase::Idle)
    }

    pub fn get(&self, session_id: &str) -> Option<Readiness> {
        self.sessions.get(session_id).copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
