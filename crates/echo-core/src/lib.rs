//! echo-core — shared types, wire events, profile scoring and configuration.
//! All other Echo crates depend on this one.

pub mod config;
pub mod error;
pub mod message;
pub mod profile;
pub mod wire;

pub use error::CoordinatorError;
pub use message::{now_millis, AttachmentKind, AttachmentRef, Message};
pub use profile::{MatchScore, MatchSummary, Profile};
pub use wire::{ConnectionId, EndReason, InboundEvent, OutboundEvent, SessionId, UserId};
