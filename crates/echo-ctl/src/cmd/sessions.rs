//! Session management commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json};
use super::status::ParticipantInfo;

pub async fn cmd_session_inspect(port: u16, session_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Summary {
        same_city: Option<String>,
        same_college: Option<String>,
    }

    #[derive(Deserialize)]
    struct InspectResponse {
        session_id: String,
        room_id: String,
        participants: Vec<ParticipantInfo>,
        message_count: usize,
        match_score: u8,
        common_interests: Vec<String>,
        match_summary: Option<Summary>,
        age_secs: u64,
    }

    let resp: InspectResponse =
        get_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session Details");
    println!("═══════════════════════════════════════");
    println!("  ID        : {}", resp.session_id);
    println!("  Room      : {}", resp.room_id);
    for p in &resp.participants {
        println!("  User      : {}", p.describe());
    }
    println!("  Messages  : {}", resp.message_count);
    println!("  Age       : {}s", resp.age_secs);
    if resp.match_score > 0 {
        println!("  Score     : {}", resp.match_score);
        println!("  Interests : {}", resp.common_interests.join(", "));
    }
    if let Some(s) = resp.match_summary {
        for line in [s.same_city, s.same_college].into_iter().flatten() {
            println!("  Match     : {}", line);
        }
    }

    Ok(())
}

pub async fn cmd_session_end(port: u16, session_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct EndResponse {
        session_id: String,
        ended: bool,
    }

    let resp: EndResponse =
        delete_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    if resp.ended {
        println!("✓ Session ended: {}", resp.session_id);
    } else {
        println!("Session not found: {}", session_id);
    }

    Ok(())
}
