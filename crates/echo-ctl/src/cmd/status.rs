//! Coordinator status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    connections: usize,
    waiting_anonymous: usize,
    waiting_profiled: usize,
    pending_reconnects: usize,
    sessions: Vec<SessionInfo>,
}

#[derive(Deserialize)]
struct SessionInfo {
    session_id: String,
    room_id: String,
    participants: Vec<ParticipantInfo>,
    message_count: usize,
    match_score: u8,
    age_secs: u64,
}

#[derive(Deserialize)]
pub(crate) struct ParticipantInfo {
    pub user_id: String,
    pub connected: bool,
}

impl ParticipantInfo {
    pub(crate) fn describe(&self) -> String {
        if self.connected {
            self.user_id.clone()
        } else {
            format!("{} (disconnected)", self.user_id)
        }
    }
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Echo Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Connections        : {}", resp.connections);
    println!("  Waiting (anonymous): {}", resp.waiting_anonymous);
    println!("  Waiting (profiled) : {}", resp.waiting_profiled);
    println!("  Pending reconnects : {}", resp.pending_reconnects);
    println!("  Active sessions    : {}", resp.sessions.len());

    if resp.sessions.is_empty() {
        println!("\n  No active sessions.");
        return Ok(());
    }

    println!("\n  Sessions:");
    for s in &resp.sessions {
        println!("  ┌─ {}", s.session_id);
        println!("  │  room     : {}", s.room_id);
        for p in &s.participants {
            println!("  │  user     : {}", p.describe());
        }
        println!("  │  messages : {}", s.message_count);
        println!("  │  score    : {}", s.match_score);
        println!("  └─ age      : {}s", s.age_secs);
    }

    Ok(())
}
