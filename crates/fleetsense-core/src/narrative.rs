//! Narrative generation as an injected capability.
//!
//! The core never depends on narrative text for correctness: tiers and
//! derived metrics are computed deterministically before any engine call,
//! and every engine failure is captured as a per-domain error result. The
//! [`NarrativeEngine`] trait is the whole contract; production wires
//! [`HttpNarrativeEngine`] against an OpenAI-compatible endpoint, tests wire
//! the scripted fake from [`crate::fakes`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::AnalysisDomain;
use crate::config::NarrativeConfig;
use crate::ranges::HealthTier;

/// Structured input to a narrative generation call.
#[derive(Debug, Clone, Serialize)]
pub struct NarrativeRequest {
    pub vehicle_id: String,
    pub domain: AnalysisDomain,
    /// What the caller wants narrated, e.g. a user query or a standing
    /// analysis instruction.
    pub instruction: String,
    /// Classified tier per relevant sensor.
    pub tiers: BTreeMap<String, HealthTier>,
    /// Deterministic derived metrics computed by the analyzer.
    pub metrics: BTreeMap<String, f64>,
}

/// Errors produced by a narrative engine.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative HTTP error: {0}")]
    Http(String),

    #[error("narrative call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("malformed narrative response: {0}")]
    MalformedResponse(String),

    #[error("no narrative API key configured")]
    Unconfigured,
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NarrativeError::Timeout { secs: 0 }
        } else {
            NarrativeError::Http(err.to_string())
        }
    }
}

/// An opaque text-generation capability.
#[async_trait]
pub trait NarrativeEngine: Send + Sync {
    /// Turn a structured classification into free text. May fail or time
    /// out; callers must degrade gracefully.
    async fn generate(&self, req: &NarrativeRequest) -> Result<String, NarrativeError>;

    /// Classify a user query into an analysis domain. Callers fall back to
    /// deterministic keyword routing on any error.
    async fn classify_intent(&self, query: &str) -> Result<AnalysisDomain, NarrativeError>;
}

const DIAGNOSTIC_PROMPT: &str = "You are an automotive diagnostic specialist for electric and \
hybrid vehicles. You receive pre-classified sensor tiers and derived metrics. Produce a \
detailed diagnostic report: overall health, concerning values with severity, fault codes, \
and prioritized recommendations. Reference specific sensor values.";

const MAINTENANCE_PROMPT: &str = "You are an automotive maintenance advisor for electric and \
hybrid vehicles. You receive pre-classified fluid and wear sensor tiers. Produce a maintenance \
plan grouped by urgency: immediate (24-48h), soon (1-2 weeks), routine (1 month), preventive. \
For each item give the task, reason and relative cost.";

const PERFORMANCE_PROMPT: &str = "You are an automotive performance analyst for electric and \
hybrid vehicles. You receive pre-classified sensor tiers plus derived efficiency metrics. \
Produce a performance report: overall rating, efficiency analysis, thermal behavior, and \
optimization recommendations. Reference the supplied metrics.";

const ROUTING_PROMPT: &str = "You route vehicle questions to one specialist. Reply with \
exactly one word: diagnostic (health, faults, warning lights), maintenance (service, fluids, \
schedules) or performance (efficiency, range, driving metrics).";

fn system_prompt(domain: AnalysisDomain) -> &'static str {
    match domain {
        AnalysisDomain::Diagnostic => DIAGNOSTIC_PROMPT,
        AnalysisDomain::Maintenance => MAINTENANCE_PROMPT,
        AnalysisDomain::Performance => PERFORMANCE_PROMPT,
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Narrative engine backed by an OpenAI-compatible chat-completions API.
pub struct HttpNarrativeEngine {
    config: NarrativeConfig,
    http_client: reqwest::Client,
}

impl HttpNarrativeEngine {
    pub fn new(config: NarrativeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("fleetsense/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        HttpNarrativeEngine {
            config,
            http_client,
        }
    }

    /// Build the engine from environment variables.
    pub fn from_env() -> Self {
        Self::new(NarrativeConfig::from_env())
    }

    /// Whether an API key is present. The daemon logs a startup warning when
    /// it is not.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, NarrativeError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(NarrativeError::Unconfigured)?;

        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        debug!(event = "narrative.request", url = %url, model = %self.config.model);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Http(format!("{status}: {text}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| NarrativeError::MalformedResponse("empty choices".to_string()))
    }
}

#[async_trait]
impl NarrativeEngine for HttpNarrativeEngine {
    async fn generate(&self, req: &NarrativeRequest) -> Result<String, NarrativeError> {
        // The structured classification travels as JSON in the user turn.
        let payload =
            serde_json::to_string(req).map_err(|e| NarrativeError::MalformedResponse(e.to_string()))?;
        let user = format!("{}\n\nClassified vehicle data:\n{}", req.instruction, payload);
        self.chat(system_prompt(req.domain), user).await
    }

    async fn classify_intent(&self, query: &str) -> Result<AnalysisDomain, NarrativeError> {
        let reply = self.chat(ROUTING_PROMPT, query.to_string()).await?;
        let word = reply.trim().to_lowercase();
        match word.as_str() {
            "diagnostic" => Ok(AnalysisDomain::Diagnostic),
            "maintenance" => Ok(AnalysisDomain::Maintenance),
            "performance" => Ok(AnalysisDomain::Performance),
            other => Err(NarrativeError::MalformedResponse(format!(
                "unexpected routing reply: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_engine_reports_missing_key() {
        let engine = HttpNarrativeEngine::new(NarrativeConfig::new("http://localhost:0", "m"));
        assert!(!engine.is_configured());
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_with_unconfigured() {
        let engine = HttpNarrativeEngine::new(NarrativeConfig::new("http://localhost:0", "m"));
        let req = NarrativeRequest {
            vehicle_id: "VH001".into(),
            domain: AnalysisDomain::Diagnostic,
            instruction: "analyze".into(),
            tiers: BTreeMap::new(),
            metrics: BTreeMap::new(),
        };
        let err = engine.generate(&req).await.unwrap_err();
        assert!(matches!(err, NarrativeError::Unconfigured));
    }

    #[test]
    fn test_request_serializes_tiers_and_metrics() {
        let req = NarrativeRequest {
            vehicle_id: "VH001".into(),
            domain: AnalysisDomain::Performance,
            instruction: "analyze".into(),
            tiers: BTreeMap::from([("rpm".to_string(), HealthTier::Normal)]),
            metrics: BTreeMap::from([("rpm_per_kmph".to_string(), 36.67)]),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"rpm\":\"normal\""));
        assert!(json.contains("rpm_per_kmph"));
    }
}
