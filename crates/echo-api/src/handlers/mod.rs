//! HTTP and WebSocket handlers.

pub mod analysis;
pub mod sessions;
pub mod socket;
pub mod status;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use echo_services::{CoordinatorClosed, CoordinatorHandle, SessionRegistry, TextAnalyzer};

#[derive(Clone)]
pub struct ApiState {
    /// Read-only view of active sessions.
    pub registry: SessionRegistry,
    pub coordinator: CoordinatorHandle,
    /// `None` when analysis is disabled in config.
    pub analyzer: Option<Arc<dyn TextAnalyzer>>,
    pub started_at: Instant,
    /// Source of transport-assigned connection ids.
    pub next_connection: Arc<AtomicU64>,
}

impl ApiState {
    pub fn new(
        registry: SessionRegistry,
        coordinator: CoordinatorHandle,
        analyzer: Option<Arc<dyn TextAnalyzer>>,
    ) -> Self {
        Self {
            registry,
            coordinator,
            analyzer,
            started_at: Instant::now(),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn unavailable(e: CoordinatorClosed) -> (StatusCode, String) {
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}

// ── Re-exports for router ─────────────────────────────────────────────────────

pub use analysis::handle_analyze_message;
pub use sessions::{handle_session_end, handle_session_inspect};
pub use socket::handle_ws;
pub use status::{handle_health, handle_status};
