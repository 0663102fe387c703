//! Errors surfaced to a single connection. None of them are fatal.

use crate::wire::{ConnectionId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("no active session")]
    NoActiveSession,
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("connection {0} is not a participant of this session")]
    NotAParticipant(ConnectionId),
    #[error("connection is already in an active session")]
    AlreadyInSession,
    #[error("message has neither text nor attachment")]
    EmptyMessage,
}

impl CoordinatorError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "no-active-session",
            Self::SessionNotFound(_) => "session-not-found",
            Self::InvalidProfile(_) => "invalid-profile",
            Self::NotAParticipant(_) => "not-a-participant",
            Self::AlreadyInSession => "already-in-session",
            Self::EmptyMessage => "empty-message",
        }
    }

    /// Validation failures are reported as `validation-error`, everything
    /// else as a generic `error`.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidProfile(_) | Self::AlreadyInSession | Self::EmptyMessage
        )
    }
}
