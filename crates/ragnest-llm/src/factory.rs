//! Build embedders and engines from provider specs
//!
//! Specs are `provider` or `provider:model`, e.g. `hash`, `ollama:nomic-embed-text`.

use ragnest_core::config::parse_provider_spec;
use ragnest_core::error::{RagError, Result};
use std::sync::Arc;

use crate::engine::GenerationEngine;
use crate::hashing::HashEmbedder;
use crate::ollama::{OllamaEmbedder, OllamaGenerator};
use crate::ports::{Embedder, NativeModel};

/// Construct the embedder named by `spec`
pub fn build_embedder(spec: &str, dimensions: usize, ollama_url: &str) -> Result<Arc<dyn Embedder>> {
    match parse_provider_spec(spec)? {
        ("hash", None) => Ok(Arc::new(HashEmbedder::new(dimensions)?)),
        ("ollama", Some(model)) => Ok(Arc::new(OllamaEmbedder::new(ollama_url, model, dimensions))),
        ("ollama", None) => Err(RagError::ConfigInvalid {
            key: "embedder".to_string(),
            reason: "ollama embedder requires a model, e.g. 'ollama:nomic-embed-text'".to_string(),
        }),
        (provider, _) => Err(RagError::ConfigInvalid {
            key: "embedder".to_string(),
            reason: format!("unknown embedder provider '{}'", provider),
        }),
    }
}

/// Load the generation engine named by `spec`
///
/// `echo` starts directly in degraded mode and `none` leaves the engine unloaded. A backend
/// that fails to load degrades instead of failing.
pub async fn load_engine(spec: &str, ollama_url: &str) -> Result<GenerationEngine> {
    match parse_provider_spec(spec)? {
        ("echo", None) => Ok(GenerationEngine::degraded("echo generator configured")),
        ("none", None) => Ok(GenerationEngine::not_loaded()),
        ("ollama", Some(model)) => {
            let url = ollama_url.to_string();
            let model = model.to_string();
            Ok(GenerationEngine::load(async move {
                let generator = OllamaGenerator::connect(url, model).await?;
                Ok(Box::new(generator) as Box<dyn NativeModel>)
            })
            .await)
        }
        (provider, _) => Err(RagError::ConfigInvalid {
            key: "generator".to_string(),
            reason: format!("unknown generator provider '{}'", provider),
        }),
    }
}
