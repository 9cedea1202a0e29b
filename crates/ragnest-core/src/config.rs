use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Set programmatically by the embedding process
    Override,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Override => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for Ragnest
///
/// Precedence: overrides > environment > config file > defaults.
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Root directory holding one subdirectory per workspace
    pub data_dir: ConfigValue<PathBuf>,
    /// Embedder spec: `hash` or `ollama:<model>`
    pub embedder: ConfigValue<String>,
    /// Dimensionality of every vector in every workspace index
    pub embedding_dim: ConfigValue<usize>,
    /// Generator spec: `echo` or `ollama:<model>`
    pub generator: ConfigValue<String>,
    /// Maximum number of workspaces kept in memory at once
    pub max_mounted: ConfigValue<usize>,
    pub top_k: ConfigValue<usize>,
    pub score_threshold: ConfigValue<f32>,
    pub max_tokens: ConfigValue<usize>,
    pub temperature: ConfigValue<f32>,
    pub max_context_chars: ConfigValue<usize>,
    pub query_timeout_ms: ConfigValue<u64>,
    pub stream_flush_chars: ConfigValue<usize>,
    pub stream_flush_interval_ms: ConfigValue<u64>,
    /// Zero disables heartbeat frames
    pub heartbeat_interval_ms: ConfigValue<u64>,
}

impl RagConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            data_dir: ConfigValue::new(PathBuf::from(".ragnest"), ConfigSource::Default),
            embedder: ConfigValue::new("hash".to_string(), ConfigSource::Default),
            embedding_dim: ConfigValue::new(384, ConfigSource::Default),
            generator: ConfigValue::new("echo".to_string(), ConfigSource::Default),
            max_mounted: ConfigValue::new(16, ConfigSource::Default),
            top_k: ConfigValue::new(5, ConfigSource::Default),
            score_threshold: ConfigValue::new(0.45, ConfigSource::Default),
            max_tokens: ConfigValue::new(512, ConfigSource::Default),
            temperature: ConfigValue::new(0.7, ConfigSource::Default),
            max_context_chars: ConfigValue::new(8_000, ConfigSource::Default),
            query_timeout_ms: ConfigValue::new(60_000, ConfigSource::Default),
            stream_flush_chars: ConfigValue::new(64, ConfigSource::Default),
            stream_flush_interval_ms: ConfigValue::new(50, ConfigSource::Default),
            heartbeat_interval_ms: ConfigValue::new(15_000, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| RagError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file: {}", e),
        })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| RagError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let source = ConfigSource::File;
        if let Some(v) = file_config.data_dir {
            self.data_dir.update(v, source);
        }
        if let Some(v) = file_config.embedder {
            self.embedder.update(v, source);
        }
        if let Some(v) = file_config.embedding_dim {
            self.embedding_dim.update(v, source);
        }
        if let Some(v) = file_config.generator {
            self.generator.update(v, source);
        }
        if let Some(v) = file_config.max_mounted {
            self.max_mounted.update(v, source);
        }
        if let Some(v) = file_config.top_k {
            self.top_k.update(v, source);
        }
        if let Some(v) = file_config.score_threshold {
            self.score_threshold.update(v, source);
        }
        if let Some(v) = file_config.max_tokens {
            self.max_tokens.update(v, source);
        }
        if let Some(v) = file_config.temperature {
            self.temperature.update(v, source);
        }
        if let Some(v) = file_config.max_context_chars {
            self.max_context_chars.update(v, source);
        }
        if let Some(v) = file_config.query_timeout_ms {
            self.query_timeout_ms.update(v, source);
        }
        if let Some(v) = file_config.stream_flush_chars {
            self.stream_flush_chars.update(v, source);
        }
        if let Some(v) = file_config.stream_flush_interval_ms {
            self.stream_flush_interval_ms.update(v, source);
        }
        if let Some(v) = file_config.heartbeat_interval_ms {
            self.heartbeat_interval_ms.update(v, source);
        }

        Ok(self)
    }

    /// Load configuration from `RAGNEST_*` environment variables
    ///
    /// Unparseable values are logged and ignored.
    pub fn load_from_env(mut self) -> Self {
        let source = ConfigSource::Environment;

        if let Ok(dir) = env::var("RAGNEST_DATA_DIR") {
            self.data_dir.update(PathBuf::from(dir), source);
        }
        if let Ok(embedder) = env::var("RAGNEST_EMBEDDER") {
            self.embedder.update(embedder, source);
        }
        if let Some(v) = env_parse("RAGNEST_EMBEDDING_DIM") {
            self.embedding_dim.update(v, source);
        }
        if let Ok(generator) = env::var("RAGNEST_GENERATOR") {
            self.generator.update(generator, source);
        }
        if let Some(v) = env_parse("RAGNEST_MAX_MOUNTED") {
            self.max_mounted.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_TOP_K") {
            self.top_k.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_SCORE_THRESHOLD") {
            self.score_threshold.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_MAX_TOKENS") {
            self.max_tokens.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_TEMPERATURE") {
            self.temperature.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_MAX_CONTEXT_CHARS") {
            self.max_context_chars.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_QUERY_TIMEOUT_MS") {
            self.query_timeout_ms.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_STREAM_FLUSH_CHARS") {
            self.stream_flush_chars.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_STREAM_FLUSH_INTERVAL_MS") {
            self.stream_flush_interval_ms.update(v, source);
        }
        if let Some(v) = env_parse("RAGNEST_HEARTBEAT_INTERVAL_MS") {
            self.heartbeat_interval_ms.update(v, source);
        }

        self
    }

    /// Apply programmatic overrides, which win over every other layer
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let source = ConfigSource::Override;
        if let Some(v) = overrides.data_dir {
            self.data_dir.update(v, source);
        }
        if let Some(v) = overrides.embedder {
            self.embedder.update(v, source);
        }
        if let Some(v) = overrides.embedding_dim {
            self.embedding_dim.update(v, source);
        }
        if let Some(v) = overrides.generator {
            self.generator.update(v, source);
        }
        if let Some(v) = overrides.top_k {
            self.top_k.update(v, source);
        }
        if let Some(v) = overrides.score_threshold {
            self.score_threshold.update(v, source);
        }
    }

    /// Check value ranges once all layers are applied
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim.value == 0 {
            return Err(invalid("embedding_dim", "must be greater than zero"));
        }
        if self.max_mounted.value == 0 {
            return Err(invalid("max_mounted", "must be greater than zero"));
        }
        if self.top_k.value == 0 {
            return Err(invalid("top_k", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.score_threshold.value) {
            return Err(invalid("score_threshold", "must be within [0, 1]"));
        }
        if self.max_tokens.value == 0 {
            return Err(invalid("max_tokens", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.temperature.value) {
            return Err(invalid("temperature", "must be within [0, 2]"));
        }
        if self.stream_flush_chars.value == 0 {
            return Err(invalid("stream_flush_chars", "must be greater than zero"));
        }
        if self.query_timeout_ms.value == 0 {
            return Err(invalid("query_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.value)
    }

    pub fn stream_flush_interval(&self) -> Duration {
        Duration::from_millis(self.stream_flush_interval_ms.value)
    }

    /// `None` when heartbeats are disabled
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        match self.heartbeat_interval_ms.value {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "data_dir".to_string(),
            (self.data_dir.value.display().to_string(), self.data_dir.source),
        );
        map.insert("embedder".to_string(), (self.embedder.value.clone(), self.embedder.source));
        map.insert(
            "embedding_dim".to_string(),
            (self.embedding_dim.value.to_string(), self.embedding_dim.source),
        );
        map.insert("generator".to_string(), (self.generator.value.clone(), self.generator.source));
        map.insert(
            "max_mounted".to_string(),
            (self.max_mounted.value.to_string(), self.max_mounted.source),
        );
        map.insert("top_k".to_string(), (self.top_k.value.to_string(), self.top_k.source));
        map.insert(
            "score_threshold".to_string(),
            (format!("{:.2}", self.score_threshold.value), self.score_threshold.source),
        );
        map.insert(
            "max_tokens".to_string(),
            (self.max_tokens.value.to_string(), self.max_tokens.source),
        );
        map.insert(
            "temperature".to_string(),
            (format!("{:.2}", self.temperature.value), self.temperature.source),
        );
        map.insert(
            "query_timeout_ms".to_string(),
            (self.query_timeout_ms.value.to_string(), self.query_timeout_ms.source),
        );
        map.insert(
            "heartbeat_interval_ms".to_string(),
            (self.heartbeat_interval_ms.value.to_string(), self.heartbeat_interval_ms.source),
        );

        map
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Default, Deserialize, Serialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    embedder: Option<String>,
    embedding_dim: Option<usize>,
    generator: Option<String>,
    max_mounted: Option<usize>,
    top_k: Option<usize>,
    score_threshold: Option<f32>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    max_context_chars: Option<usize>,
    query_timeout_ms: Option<u64>,
    stream_flush_chars: Option<usize>,
    stream_flush_interval_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
}

/// Programmatic overrides supplied by the hosting process
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub embedder: Option<String>,
    pub embedding_dim: Option<usize>,
    pub generator: Option<String>,
    pub top_k: Option<usize>,
    pub score_threshold: Option<f32>,
}

/// Split a `provider:model` spec such as `ollama:nomic-embed-text`
pub fn parse_provider_spec(spec: &str) -> Result<(&str, Option<&str>)> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(invalid("provider", "empty provider spec"));
    }
    match spec.split_once(':') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, Some(model)))
        }
        Some(_) => Err(invalid("provider", format!("malformed provider spec: {}", spec))),
        None => Ok((spec, None)),
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': ignoring", key, raw);
            None
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RagError {
    RagError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}
