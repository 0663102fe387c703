//! Wire format for the real-time channel.
//!
//! Every frame is a JSON object tagged by `event` (kebab-case), with the
//! event's fields alongside the tag in camelCase:
//!
//!   {"event":"send-message","sessionId":"…","body":"hi"}
//!   {"event":"matched","sessionId":"…","userId":"…","partnerId":"…", …}
//!
//! WebRTC payloads (`offer`, `answer`, ICE candidates) are opaque JSON and
//! are relayed verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{AttachmentRef, Message};
use crate::profile::{MatchSummary, Profile};

pub type SessionId = String;
pub type UserId = String;

/// Transport-assigned identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Events a connection delivers to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    StartAnonymousMatch,
    StartProfiledMatch {
        profile: Profile,
    },
    SendMessage {
        #[serde(default)]
        session_id: Option<SessionId>,
        #[serde(default)]
        body: String,
        #[serde(default)]
        attachment_ref: Option<AttachmentRef>,
    },
    Skip,
    End,
    /// Raised by the transport when the connection drops; never accepted
    /// from a client frame.
    #[serde(skip_deserializing)]
    Disconnect,
    Reconnect {
        user_id: UserId,
    },
    RequestVideo,
    AcceptVideo,
    RejectVideo,
    SignalReady,
    RelayOffer {
        payload: serde_json::Value,
    },
    RelayAnswer {
        payload: serde_json::Value,
    },
    RelayIce {
        payload: serde_json::Value,
    },
    LeaveCall,
    GetUserCount,
}

impl InboundEvent {
    /// Event name as it appears on the wire, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartAnonymousMatch => "start-anonymous-match",
            Self::StartProfiledMatch { .. } => "start-profiled-match",
            Self::SendMessage { .. } => "send-message",
            Self::Skip => "skip",
            Self::End => "end",
            Self::Disconnect => "disconnect",
            Self::Reconnect { .. } => "reconnect",
            Self::RequestVideo => "request-video",
            Self::AcceptVideo => "accept-video",
            Self::RejectVideo => "reject-video",
            Self::SignalReady => "signal-ready",
            Self::RelayOffer { .. } => "relay-offer",
            Self::RelayAnswer { .. } => "relay-answer",
            Self::RelayIce { .. } => "relay-ice",
            Self::LeaveCall => "leave-call",
            Self::GetUserCount => "get-user-count",
        }
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    Skip,
    UserEnded,
    DisconnectTimeout,
    UserLeftVideo,
    EndedByOperator,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skip => "skip",
            Self::UserEnded => "user-ended",
            Self::DisconnectTimeout => "disconnect-timeout",
            Self::UserLeftVideo => "user-left-video",
            Self::EndedByOperator => "ended-by-operator",
        };
        f.write_str(s)
    }
}

/// Notifications the coordinator sends to connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum OutboundEvent {
    Waiting {
        user_id: UserId,
    },
    Matched {
        session_id: SessionId,
        user_id: UserId,
        partner_id: UserId,
        match_score: u8,
        is_profiled: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        match_summary: Option<MatchSummary>,
    },
    NoMatchAvailable {
        user_id: UserId,
        reason: String,
    },
    ValidationError {
        reason: String,
    },
    MessageReceived(Message),
    SessionEnded {
        reason: EndReason,
        duration_ms: u64,
        message_count: usize,
    },
    PartnerDisconnected {
        grace_secs: u64,
    },
    PartnerRestored,
    SessionRestored {
        session_id: SessionId,
        user_id: UserId,
        partner_id: UserId,
        messages: Vec<Message>,
        partner_connected: bool,
    },
    ReconnectFailed {
        reason: String,
    },
    VideoCallRequest {
        requester_id: UserId,
    },
    VideoCallAccepted {
        session_id: SessionId,
    },
    VideoCallRejected,
    CreateOffer {
        session_id: SessionId,
    },
    AwaitOffer {
        session_id: SessionId,
    },
    Offer {
        payload: serde_json::Value,
        sender_id: UserId,
    },
    Answer {
        payload: serde_json::Value,
        sender_id: UserId,
    },
    IceCandidate {
        payload: serde_json::Value,
        sender_id: UserId,
    },
    PartnerLeftCall,
    UserCount {
        count: usize,
    },
    Error {
        code: String,
        message: String,
    },
}
