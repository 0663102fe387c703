//! /health and /status handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use echo_services::Session;

use super::{unavailable, ApiState};

// ── /health ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
}

pub async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub connections: usize,
    pub waiting_anonymous: usize,
    pub waiting_profiled: usize,
    pub pending_reconnects: usize,
    pub sessions: Vec<SessionInfo>,
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub room_id: String,
    pub participants: Vec<ParticipantInfo>,
    pub message_count: usize,
    pub match_score: u8,
    pub age_secs: u64,
}

#[derive(Serialize)]
pub struct ParticipantInfo {
    pub user_id: String,
    pub connected: bool,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.session_id.clone(),
            room_id: s.room_id.clone(),
            participants: [&s.participant_a, &s.participant_b]
                .into_iter()
                .map(|p| ParticipantInfo {
                    user_id: p.user_id.clone(),
                    connected: p.connected,
                })
                .collect(),
            message_count: s.message_count,
            match_score: s.match_score,
            age_secs: s.duration_ms() / 1000,
        }
    }
}

pub async fn handle_status(
    State(state): State<ApiState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let counters = state.coordinator.status().await.map_err(unavailable)?;
    let sessions = state.registry.list().iter().map(SessionInfo::from).collect();

    Ok(Json(StatusResponse {
        connections: counters.connections,
        waiting_anonymous: counters.waiting_anonymous,
        waiting_profiled: counters.waiting_profiled,
        pending_reconnects: counters.pending_reconnects,
        sessions,
    }))
}
