use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Hard upper bound on `max_tokens` for a single request
pub const MAX_GENERATION_TOKENS: usize = 4096;

/// Upper bound on sampling temperature
pub const MAX_TEMPERATURE: f32 = 2.0;

/// A single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: usize, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(RagError::validation("prompt", "must not be empty"));
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_GENERATION_TOKENS {
            return Err(RagError::validation(
                "max_tokens",
                format!("must be within 1..={}", MAX_GENERATION_TOKENS),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(RagError::validation(
                "temperature",
                format!("must be within [0, {}]", MAX_TEMPERATURE),
            ));
        }
        Ok(())
    }
}

/// Which backend produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Native,
    Degraded,
}

/// Timing and size of a finished generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub tokens: usize,
    pub elapsed_ms: u64,
    pub mode: GenerationMode,
    /// True when generation stopped at the `max_tokens` ceiling
    pub truncated: bool,
}

/// Lifecycle state of the generation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    Loaded { model: String },
    NotLoaded,
    Degraded { reason: String },
}

impl EngineStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EngineStatus::Loaded { .. } => "loaded",
            EngineStatus::NotLoaded => "not_loaded",
            EngineStatus::Degraded { .. } => "degraded",
        }
    }

    pub fn can_generate(&self) -> bool {
        !matches!(self, EngineStatus::NotLoaded)
    }
}
