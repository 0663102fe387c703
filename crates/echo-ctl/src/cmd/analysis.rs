//! Text analysis command.

use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use super::http::{base_url, post_json_body};

#[derive(Deserialize)]
struct AnalysisResponse {
    sentiment: String,
    toxicity: f32,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    emotions: Vec<String>,
    degraded: bool,
}

pub async fn cmd_analyze(port: u16, text: &str) -> Result<()> {
    let resp: AnalysisResponse = post_json_body(
        &format!("{}/analysis/message", base_url(port)),
        &json!({ "text": text }),
    )
    .await?;

    println!("═══════════════════════════════════════");
    println!("  Message Analysis");
    println!("═══════════════════════════════════════");
    println!("  Sentiment : {}", resp.sentiment);
    println!("  Toxicity  : {:.2}", resp.toxicity);
    if !resp.topics.is_empty() {
        println!("  Topics    : {}", resp.topics.join(", "));
    }
    if !resp.emotions.is_empty() {
        println!("  Emotions  : {}", resp.emotions.join(", "));
    }
    if resp.degraded {
        println!("\n  (analysis service unavailable, neutral fallback)");
    }

    Ok(())
}
