//! /analysis/message — text analysis proxy with neutral fallback.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use echo_services::{analyze_or_neutral, AnalysisReport};

use super::ApiState;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

pub async fn handle_analyze_message(
    State(state): State<ApiState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReport>, (StatusCode, String)> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text is required".to_string()));
    }
    let report = analyze_or_neutral(state.analyzer.as_deref(), &req.text).await;
    Ok(Json(report))
}
