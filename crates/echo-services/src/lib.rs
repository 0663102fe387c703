//! echo-services — matchmaking and session coordination.
//!
//! The [`SessionCoordinator`] owns every mutable registry and is driven
//! one event at a time; the [`SessionRegistry`] tables are also shared
//! read-only with the HTTP layer.

pub mod analysis;
pub mod backup;
pub mod connection;
pub mod coordinator;
pub mod reconnect;
pub mod session;
pub mod signaling;
pub mod waiting_pool;

pub use analysis::{
    analyze_or_neutral, AnalysisError, AnalysisReport, HttpAnalysisClient, TextAnalysis, TextAnalyzer,
};
pub use backup::{BackupError, BackupStore, MemoryBackup, RedisBackup, SessionBackup};
pub use connection::{ConnectionTable, OutboundSender};
pub use coordinator::{
    Command, CoordinatorClosed, CoordinatorHandle, CoordinatorStatus, Moderation, Recovery,
    SessionCoordinator, BACKUP_READ_TIMEOUT,
};
pub use reconnect::{
    Expiry, PendingDisconnect, PendingSnapshot, ReconnectAttempt, ReconnectionWindow,
    RECONNECT_GRACE,
};
pub use session::{Participant, Session, SessionRegistry, Slot};
pub use signaling::{Readiness, ReadinessOutcome, SignalPhase, SignalingArbiter};
pub use waiting_pool::{BestMatch, WaitingEntry, WaitingPool};
