//! Environment-driven configuration for the core and the daemon.

use std::path::PathBuf;

/// Narrative engine (chat-completions) configuration.
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Model identifier passed on every request.
    pub model: String,
    /// Bearer token. `None` leaves the engine unconfigured: calls fail with
    /// `NarrativeError::Unconfigured` and surface as per-domain error results.
    pub api_key: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        NarrativeConfig {
            base_url: std::env::var("FLEETSENSE_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            model: std::env::var("FLEETSENSE_MODEL")
                .unwrap_or_else(|_| "openai/gpt-oss-20b".to_string()),
            api_key: std::env::var("FLEETSENSE_API_KEY")
                .or_else(|_| std::env::var("GROQ_API_KEY"))
                .ok(),
            timeout_secs: 30,
        }
    }
}

impl NarrativeConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config for a specific endpoint and model.
    pub fn new(base_url: &str, model: &str) -> Self {
        NarrativeConfig {
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Path to the JSON telemetry dataset.
    pub dataset_path: PathBuf,
    /// Seconds between monitoring sweeps.
    pub sweep_interval_secs: u64,
    /// Max vehicles evaluated concurrently per sweep.
    pub sweep_concurrency: usize,
    pub narrative: NarrativeConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            dataset_path: std::env::var("FLEETSENSE_DATASET")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("dataset/vehicle_realtime_data.json")),
            sweep_interval_secs: env_u64("FLEETSENSE_SWEEP_INTERVAL_SECS", 300),
            sweep_concurrency: env_u64("FLEETSENSE_SWEEP_CONCURRENCY", 4) as usize,
            narrative: NarrativeConfig::from_env(),
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_setters() {
        let cfg = NarrativeConfig::new("http://localhost:11434/v1", "test-model")
            .with_api_key("k")
            .with_timeout_secs(5);
        assert_eq!(cfg.base_url, "http://localhost:11434/v1");
        assert_eq!(cfg.model, "test-model");
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.timeout_secs, 5);
    }

    #[test]
    fn test_new_config_has_no_key() {
        let cfg = NarrativeConfig::new("http://x", "m");
        assert!(cfg.api_key.is_none());
    }
}
