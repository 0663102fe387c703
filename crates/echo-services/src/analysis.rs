//! Text analysis client — sentiment and toxicity from an external endpoint.
//!
//! The endpoint is opaque: it receives `{"text": …}` and answers with a
//! [`TextAnalysis`]. Callers never see a failure; [`analyze_or_neutral`]
//! degrades to [`TextAnalysis::neutral`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextAnalysis {
    pub sentiment: String,
    /// 0.0 ..= 1.0
    pub toxicity: f32,
    pub topics: Vec<String>,
    pub emotions: Vec<String>,
}

impl Default for TextAnalysis {
    fn default() -> Self {
        Self::neutral()
    }
}

impl TextAnalysis {
    pub fn neutral() -> Self {
        Self {
            sentiment: "neutral".to_string(),
            toxicity: 0.0,
            topics: Vec::new(),
            emotions: Vec::new(),
        }
    }

    pub fn should_flag(&self, threshold: f32) -> bool {
        self.toxicity > threshold
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis endpoint returned HTTP {0}")]
    Status(u16),
    #[error("analysis response unreadable: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<TextAnalysis, AnalysisError>;
}

/// POSTs `{"text": …}` as JSON to a fixed endpoint.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[async_trait]
impl TextAnalyzer for HttpAnalysisClient {
    async fn analyze(&self, text: &str) -> Result<TextAnalysis, AnalysisError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { text })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| AnalysisError::Decode(e.to_string()))
    }
}

/// Analysis result plus whether it is the neutral fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: TextAnalysis,
    pub degraded: bool,
}

/// Analyze `text`, falling back to neutral when there is no analyzer or
/// the call fails.
pub async fn analyze_or_neutral(analyzer: Option<&dyn TextAnalyzer>, text: &str) -> AnalysisReport {
    let Some(analyzer) = analyzer else {
        return AnalysisReport {
            analysis: TextAnalysis::neutral(),
            degraded: true,
        };
    };

    match analyzer.analyze(text).await {
        Ok(analysis) => AnalysisReport {
            analysis,
            degraded: false,
        },
        Err(e) => {
            warn!(error = %e, "text analysis failed, using neutral result");
            AnalysisReport {
                analysis: TextAnalysis::neutral(),
                degraded: true,
            }
        }
    }
}
