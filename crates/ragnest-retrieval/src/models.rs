use ragnest_core::config::RagConfig;
use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{
    validate_workspace_id, GenerationStats, SourceAttribution, MAX_GENERATION_TOKENS,
    MAX_TEMPERATURE,
};
use ragnest_llm::TokenStream;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Largest `top_k` a caller may ask for
pub const MAX_TOP_K: usize = 100;

/// Defaults applied to fields a query plan leaves unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub score_threshold: f32,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Character budget for assembled context
    pub max_context_chars: usize,
    pub timeout: Duration,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_threshold: 0.45,
            max_tokens: 512,
            temperature: 0.7,
            max_context_chars: 8_000,
            timeout: Duration::from_secs(60),
        }
    }
}

impl From<&RagConfig> for RetrievalSettings {
    fn from(config: &RagConfig) -> Self {
        Self {
            top_k: config.top_k.value,
            score_threshold: config.score_threshold.value,
            max_tokens: config.max_tokens.value,
            temperature: config.temperature.value,
            max_context_chars: config.max_context_chars.value,
            timeout: config.query_timeout(),
        }
    }
}

/// One query as submitted by a caller
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub workspace_id: String,
    /// Trusted identity supplied by the session layer
    pub user_id: String,
    pub text: String,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    /// Overrides the default deadline covering retrieval and generation
    pub timeout: Option<Duration>,
}

impl QueryPlan {
    pub fn new(
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            top_k: None,
            min_score: None,
            max_tokens: None,
            temperature: None,
            timeout: None,
        }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    pub fn with_min_score(mut self, score: f32) -> Self {
        self.min_score = Some(score);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check every field and fill defaults
    pub fn resolve(&self, settings: &RetrievalSettings) -> Result<ResolvedPlan> {
        validate_workspace_id(&self.workspace_id)?;
        if self.user_id.trim().is_empty() {
            return Err(RagError::validation("user_id", "must not be empty"));
        }
        let text = self.text.trim();
        if text.is_empty() {
            return Err(RagError::validation("query", "must not be empty"));
        }

        let top_k = check_top_k(self.top_k.unwrap_or(settings.top_k))?;
        let min_score = check_min_score(self.min_score.unwrap_or(settings.score_threshold))?;

        let max_tokens = self.max_tokens.unwrap_or(settings.max_tokens);
        if !(1..=MAX_GENERATION_TOKENS).contains(&max_tokens) {
            return Err(RagError::validation(
                "max_tokens",
                format!("must be within 1..={}", MAX_GENERATION_TOKENS),
            ));
        }

        let temperature = self.temperature.unwrap_or(settings.temperature);
        if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(RagError::validation(
                "temperature",
                format!("must be within [0, {}]", MAX_TEMPERATURE),
            ));
        }

        let timeout = self.timeout.unwrap_or(settings.timeout);
        if timeout.is_zero() {
            return Err(RagError::validation("timeout", "must be greater than zero"));
        }

        Ok(ResolvedPlan {
            workspace_id: self.workspace_id.clone(),
            text: text.to_string(),
            top_k,
            min_score,
            max_tokens,
            temperature,
            timeout,
        })
    }
}

pub(crate) fn check_top_k(top_k: usize) -> Result<usize> {
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return Err(RagError::validation(
            "top_k",
            format!("must be within 1..={}", MAX_TOP_K),
        ));
    }
    Ok(top_k)
}

pub(crate) fn check_min_score(min_score: f32) -> Result<f32> {
    if !min_score.is_finite() || !(0.0..=1.0).contains(&min_score) {
        return Err(RagError::validation("min_score", "must be within [0, 1]"));
    }
    Ok(min_score)
}

/// A validated plan with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlan {
    pub workspace_id: String,
    pub text: String,
    pub top_k: usize,
    pub min_score: f32,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Streaming counterpart of `QueryOutcome`: sources are known, text is still arriving
pub struct StreamingQuery {
    pub query: String,
    pub sources: Vec<SourceAttribution>,
    pub context_length: usize,
    pub tokens: TokenStream,
    /// Absolute deadline shared with the retrieval stage
    pub deadline: tokio::time::Instant,
    pub budget: Duration,
    pub started: Instant,
}

impl StreamingQuery {
    /// Payload of the `metadata` frame
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "query": self.query,
            "sources": self.sources,
            "context_length": self.context_length,
        })
    }

    /// Payload of the `complete` frame
    pub fn completion(&self, stats: Option<&GenerationStats>) -> serde_json::Value {
        serde_json::json!({
            "elapsed_ms": self.started.elapsed().as_millis() as u64,
            "generation": stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(err: RagError) -> String {
        match err {
            RagError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let plan = QueryPlan::new("w1", "u1", "  what is rust?  ");
        let resolved = plan.resolve(&RetrievalSettings::default()).unwrap();
        assert_eq!(resolved.text, "what is rust?");
        assert_eq!(resolved.top_k, 5);
        assert_eq!(resolved.min_score, 0.45);
        assert_eq!(resolved.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_bad_input() {
        let settings = RetrievalSettings::default();
        let cases = [
            (QueryPlan::new("w1", "u1", "   "), "query"),
            (QueryPlan::new("", "u1", "q"), "workspace_id"),
            (QueryPlan::new("w1", " ", "q"), "user_id"),
            (QueryPlan::new("w1", "u1", "q").with_top_k(0), "top_k"),
            (QueryPlan::new("w1", "u1", "q").with_top_k(101), "top_k"),
            (QueryPlan::new("w1", "u1", "q").with_min_score(1.5), "min_score"),
            (QueryPlan::new("w1", "u1", "q").with_max_tokens(0), "max_tokens"),
            (QueryPlan::new("w1", "u1", "q").with_temperature(2.5), "temperature"),
            (QueryPlan::new("w1", "u1", "q").with_timeout(Duration::ZERO), "timeout"),
        ];
        for (plan, expected) in cases {
            assert_eq!(field(plan.resolve(&settings).unwrap_err()), expected);
        }
    }

    #[test]
    fn test_settings_from_config() {
        let config = RagConfig::with_defaults();
        let settings = RetrievalSettings::from(&config);
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.timeout, Duration::from_millis(60_000));
    }
}
