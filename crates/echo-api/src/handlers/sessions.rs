//! /sessions handlers — session inspection and operator termination.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use echo_core::MatchSummary;

use super::status::ParticipantInfo;
use super::{unavailable, ApiState};

// ── /sessions/:id (GET) ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionInspectResponse {
    pub session_id: String,
    pub room_id: String,
    pub participants: Vec<ParticipantInfo>,
    pub message_count: usize,
    pub match_score: u8,
    pub common_interests: Vec<String>,
    pub match_summary: Option<MatchSummary>,
    pub started_at_ms: u64,
    pub age_secs: u64,
}

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInspectResponse>, (StatusCode, String)> {
    let session = state
        .registry
        .get(&session_id)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    Ok(Json(SessionInspectResponse {
        participants: [&session.participant_a, &session.participant_b]
            .into_iter()
            .map(|p| ParticipantInfo {
                user_id: p.user_id.clone(),
                connected: p.connected,
            })
            .collect(),
        message_count: session.message_count,
        match_score: session.match_score,
        age_secs: session.duration_ms() / 1000,
        started_at_ms: session.started_at_ms,
        common_interests: session.common_interests,
        match_summary: session.match_summary,
        room_id: session.room_id,
        session_id: session.session_id,
    }))
}

// ── /sessions/:id (DELETE) ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionEndResponse {
    pub session_id: String,
    pub ended: bool,
}

pub async fn handle_session_end(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionEndResponse>, (StatusCode, String)> {
    let ended = state
        .coordinator
        .end_session(&session_id)
        .await
        .map_err(unavailable)?;

    if ended {
        tracing::info!(session_id = %session_id, "session ended via API");
    }

    Ok(Json(SessionEndResponse { session_id, ended }))
}
