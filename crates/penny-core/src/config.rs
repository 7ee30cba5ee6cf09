//! Assist engine configuration
//!
//! Config is resolved in three layers:
//! 1. Embedded defaults (compiled into binary from `config/assist.toml`)
//! 2. An override file: `PENNY_CONFIG` if set, else
//!    `~/.local/share/penny/config/assist.toml` when it exists
//! 3. Environment overrides for the backend section
//!
//! Environment variables:
//! - `AI_BACKEND`: openai_compatible, ollama or mock
//! - `OPENAI_COMPATIBLE_HOST`, `OPENAI_COMPATIBLE_MODEL`, `OPENAI_COMPATIBLE_API_KEY`
//! - `OLLAMA_HOST`, `OLLAMA_MODEL`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/assist.toml");

/// Which model backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAICompatible,
    Ollama,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAICompatible => "openai_compatible",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => Err(format!("Unknown backend: {}", other)),
        }
    }
}

/// Model backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL; a missing host leaves the gateway unconfigured
    pub host: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::OpenAICompatible,
            host: None,
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
        }
    }
}

/// Output and time budget for one kind of model call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskLimits {
    pub max_output_tokens: u32,
    /// Bound on a single gateway attempt
    pub timeout: Duration,
    /// Bound on the whole call including any retry
    pub ceiling: Duration,
}

impl TaskLimits {
    pub fn classification() -> Self {
        Self {
            max_output_tokens: 10,
            timeout: Duration::from_secs(5),
            ceiling: Duration::from_secs(12),
        }
    }

    pub fn summary() -> Self {
        Self {
            max_output_tokens: 500,
            timeout: Duration::from_secs(30),
            ceiling: Duration::from_secs(65),
        }
    }
}

/// Engine-level retry around the gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// 0 or 1
    pub max_retries: u32,
    /// Base delay before the retry; jitter of up to the same amount is added
    pub base_delay: Duration,
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(250),
        }
    }

    pub fn once(base_delay: Duration) -> Self {
        Self {
            max_retries: 1,
            base_delay,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Full assist engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AssistConfig {
    pub backend: BackendConfig,
    pub classification: TaskLimits,
    pub summary: TaskLimits,
    pub retry: RetryConfig,
    /// Bound on a single audit append
    pub audit_timeout: Duration,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            classification: TaskLimits::classification(),
            summary: TaskLimits::summary(),
            retry: RetryConfig::default(),
            audit_timeout: Duration::from_secs(2),
        }
    }
}

impl AssistConfig {
    /// Load from the default locations and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var("PENNY_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        let mut config = load_config(path.as_deref())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file, without environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML content on top of the built-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply backend overrides from a key lookup (normally the process env)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("AI_BACKEND") {
            match kind.parse::<BackendKind>() {
                Ok(kind) => self.backend.kind = kind,
                Err(e) => tracing::warn!(backend = %kind, "{}, keeping configured backend", e),
            }
        }

        let (host_key, model_key, api_key_key) = match self.backend.kind {
            BackendKind::OpenAICompatible => (
                "OPENAI_COMPATIBLE_HOST",
                "OPENAI_COMPATIBLE_MODEL",
                Some("OPENAI_COMPATIBLE_API_KEY"),
            ),
            BackendKind::Ollama => ("OLLAMA_HOST", "OLLAMA_MODEL", None),
            BackendKind::Mock => return,
        };

        if let Some(host) = lookup(host_key).filter(|h| !h.trim().is_empty()) {
            self.backend.host = Some(host);
        }
        if let Some(model) = lookup(model_key).filter(|m| !m.trim().is_empty()) {
            self.backend.model = model;
        }
        if let Some(key) = api_key_key.and_then(&lookup).filter(|k| !k.is_empty()) {
            self.backend.api_key = Some(key);
        }
    }

    /// Reject budgets the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_retries > 1 {
            return Err(Error::Config(format!(
                "retry.max_retries must be 0 or 1, got {}",
                self.retry.max_retries
            )));
        }
        for (name, limits) in [
            ("classification", &self.classification),
            ("summary", &self.summary),
        ] {
            if limits.max_output_tokens == 0 {
                return Err(Error::Config(format!(
                    "{}.max_output_tokens must be positive",
                    name
                )));
            }
            if limits.timeout.is_zero() {
                return Err(Error::Config(format!("{}.timeout_ms must be positive", name)));
            }
            if limits.ceiling < limits.timeout {
                return Err(Error::Config(format!(
                    "{}.ceiling_ms must be at least timeout_ms",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("penny").join("config").join("assist.toml"))
}

/// Load configuration (override first, then embedded default)
fn load_config(override_path: Option<&Path>) -> Result<AssistConfig> {
    let content = match override_path {
        Some(path) if path.exists() => fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    backend: Option<RawBackend>,
    classification: Option<RawLimits>,
    summary: Option<RawLimits>,
    retry: Option<RawRetry>,
    audit: Option<RawAudit>,
}

#[derive(Debug, Deserialize)]
struct RawBackend {
    kind: Option<String>,
    host: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    max_output_tokens: Option<u32>,
    timeout_ms: Option<u64>,
    ceiling_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_retries: Option<u32>,
    base_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAudit {
    timeout_ms: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<AssistConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AssistConfig::default();

    if let Some(backend) = raw.backend {
        if let Some(kind) = backend.kind {
            config.backend.kind = kind.parse().map_err(Error::Config)?;
        }
        if let Some(host) = backend.host {
            config.backend.host = Some(host);
        }
        if let Some(model) = backend.model {
            config.backend.model = model;
        }
        if let Some(api_key) = backend.api_key {
            config.backend.api_key = Some(api_key);
        }
    }

    if let Some(limits) = raw.classification {
        apply_limits(&mut config.classification, limits);
    }
    if let Some(limits) = raw.summary {
        apply_limits(&mut config.summary, limits);
    }

    if let Some(retry) = raw.retry {
        if let Some(max_retries) = retry.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(delay) = retry.base_delay_ms {
            config.retry.base_delay = Duration::from_millis(delay);
        }
    }

    if let Some(audit) = raw.audit {
        if let Some(timeout) = audit.timeout_ms {
            config.audit_timeout = Duration::from_millis(timeout);
        }
    }

    Ok(config)
}

fn apply_limits(limits: &mut TaskLimits, raw: RawLimits) {
    if let Some(tokens) = raw.max_output_tokens {
        limits.max_output_tokens = tokens;
    }
    if let Some(timeout) = raw.timeout_ms {
        limits.timeout = Duration::from_millis(timeout);
    }
    if let Some(ceiling) = raw.ceiling_ms {
        limits.ceiling = Duration::from_millis(ceiling);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, AssistConfig::default());
        assert_eq!(config.classification.max_output_tokens, 10);
        assert_eq!(config.classification.timeout, Duration::from_secs(5));
        assert_eq!(config.summary.max_output_tokens, 500);
        assert_eq!(config.summary.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.audit_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = AssistConfig::from_toml_str(
            r#"
            [backend]
            kind = "ollama"
            host = "http://localhost:11434"
            model = "llama3.2"

            [summary]
            timeout_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.backend.host.as_deref(), Some("http://localhost:11434"));
        assert_eq!(config.summary.timeout, Duration::from_secs(10));
        assert_eq!(config.summary.max_output_tokens, 500);
        assert_eq!(config.classification, TaskLimits::classification());
    }

    #[test]
    fn test_invalid_toml_and_unknown_backend() {
        assert!(matches!(
            AssistConfig::from_toml_str("[backend"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AssistConfig::from_toml_str("[backend]\nkind = \"carrier-pigeon\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AssistConfig::from_toml_str("[mystery]\nvalue = 1"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_budgets() {
        assert!(AssistConfig::from_toml_str("[retry]\nmax_retries = 3").is_err());
        assert!(
            AssistConfig::from_toml_str("[classification]\ntimeout_ms = 5000\nceiling_ms = 1000")
                .is_err()
        );
        assert!(AssistConfig::from_toml_str("[summary]\nmax_output_tokens = 0").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retry]\nmax_retries = 1\nbase_delay_ms = 50").unwrap();

        let config = AssistConfig::from_file(file.path()).unwrap();
        assert_eq!(config.retry, RetryConfig::once(Duration::from_millis(50)));
    }

    #[test]
    fn test_load_config_missing_override_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config, AssistConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AI_BACKEND", "ollama"),
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "gemma3"),
            ("OPENAI_COMPATIBLE_API_KEY", "ignored"),
        ]
        .into_iter()
        .collect();

        let mut config = AssistConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.kind, BackendKind::Ollama);
        assert_eq!(config.backend.host.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.backend.model, "gemma3");
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn test_env_overrides_unknown_backend_is_ignored() {
        let mut config = AssistConfig::default();
        config.apply_overrides(|k| (k == "AI_BACKEND").then(|| "telepathy".to_string()));
        assert_eq!(config.backend.kind, BackendKind::OpenAICompatible);
    }

    #[test]
    fn test_backend_kind_aliases() {
        assert_eq!("vllm".parse::<BackendKind>().unwrap(), BackendKind::OpenAICompatible);
        assert_eq!("MOCK".parse::<BackendKind>().unwrap(), BackendKind::Mock);
        assert!("".parse::<BackendKind>().is_err());
    }
}
