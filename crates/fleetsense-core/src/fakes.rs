//! In-memory fake for the narrative engine (testing only)
//!
//! Provides `ScriptedNarrativeEngine`, which satisfies the
//! [`NarrativeEngine`] contract without any network dependency: per-domain
//! scripted failures, an optional intent script, and recorded calls.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::analyzer::AnalysisDomain;
use crate::narrative::{NarrativeEngine, NarrativeError, NarrativeRequest};

/// Deterministic in-memory narrative engine.
#[derive(Debug, Default)]
pub struct ScriptedNarrativeEngine {
    failing_domains: Mutex<HashSet<AnalysisDomain>>,
    scripted_intent: Mutex<Option<AnalysisDomain>>,
    generate_delay: Mutex<Option<Duration>>,
    generate_log: Mutex<Vec<NarrativeRequest>>,
    intent_log: Mutex<Vec<String>>,
}

impl ScriptedNarrativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `generate` fail for the given domain.
    pub fn fail_domain(&self, domain: AnalysisDomain) {
        self.failing_domains.lock().unwrap().insert(domain);
    }

    /// Make `generate` fail for every domain.
    pub fn fail_all(&self) {
        let mut failing = self.failing_domains.lock().unwrap();
        for domain in AnalysisDomain::all() {
            failing.insert(domain);
        }
    }

    /// Sleep before answering every `generate` call, for exercising caller
    /// timeouts.
    pub fn delay_generate(&self, delay: Duration) {
        *self.generate_delay.lock().unwrap() = Some(delay);
    }

    /// Script the reply of `classify_intent`. Without a script, intent
    /// classification fails with `Unconfigured`, which exercises callers'
    /// keyword fallback.
    pub fn script_intent(&self, domain: AnalysisDomain) {
        *self.scripted_intent.lock().unwrap() = Some(domain);
    }

    /// Every request passed to `generate`, in call order.
    pub fn generate_calls(&self) -> Vec<NarrativeRequest> {
        self.generate_log.lock().unwrap().clone()
    }

    /// Every query passed to `classify_intent`, in call order.
    pub fn intent_calls(&self) -> Vec<String> {
        self.intent_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl NarrativeEngine for ScriptedNarrativeEngine {
    async fn generate(&self, req: &NarrativeRequest) -> Result<String, NarrativeError> {
        self.generate_log.lock().unwrap().push(req.clone());

        let delay = *self.generate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_domains.lock().unwrap().contains(&req.domain) {
            return Err(NarrativeError::Http(format!(
                "scripted {} failure",
                req.domain
            )));
        }

        Ok(format!(
            "scripted {} narrative for {} ({} tiers, {} metrics)",
            req.domain,
            req.vehicle_id,
            req.tiers.len(),
            req.metrics.len()
        ))
    }

    async fn classify_intent(&self, query: &str) -> Result<AnalysisDomain, NarrativeError> {
        self.intent_log.lock().unwrap().push(query.to_string());
        self.scripted_intent
            .lock()
            .unwrap()
            .ok_or(NarrativeError::Unconfigured)
    }
}
