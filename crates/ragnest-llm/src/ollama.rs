use async_trait::async_trait;
use ragnest_core::error::{RagError, Result};
use ragnest_core::models::GenerationRequest;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tokio::runtime::Handle;

use crate::ports::{Embedder, NativeModel};

/// Default Ollama endpoint
pub const OLLAMA_LOCALHOST: &str = "http://localhost:11434";

/// Ollama embedder implementation
pub struct OllamaEmbedder {
    /// Base URL for Ollama API (e.g., "http://localhost:11434")
    base_url: String,

    /// Model name to use for embeddings
    model: String,

    /// Embedding dimensions (model-specific)
    dimensions: usize,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Create with default localhost URL
    pub fn localhost(model: impl Into<String>, dimensions: usize) -> Self {
        Self::new(OLLAMA_LOCALHOST, model, dimensions)
    }

    fn unavailable(&self, reason: String) -> RagError {
        RagError::EmbedderUnavailable {
            reason,
            remediation: format!(
                "Ensure Ollama is running at {} and the model '{}' is available. \
                 Run 'ollama pull {}' to download the model.",
                self.base_url, self.model, self.model
            ),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            let request = OllamaEmbedRequest {
                model: &self.model,
                prompt: text,
            };

            let response = self
                .client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&request)
                .send()
                .await
                .map_err(|e| self.unavailable(format!("Failed to connect to Ollama: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(
                    self.unavailable(format!("Ollama API error ({}): {}", status, error_text))
                );
            }

            let embed_response: OllamaEmbedResponse = response
                .json()
                .await
                .map_err(|e| self.unavailable(format!("Failed to parse Ollama response: {}", e)))?;

            if embed_response.embedding.len() != self.dimensions {
                return Err(self.unavailable(format!(
                    "Model returned {} dimensions, expected {}",
                    embed_response.embedding.len(),
                    self.dimensions
                )));
            }

            embeddings.push(embed_response.embedding);
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama-backed generator driven from the blocking generation worker
///
/// Requests are issued on the runtime captured at connect time; the worker thread
/// blocks on each streamed response line.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
    runtime: Handle,
}

impl OllamaGenerator {
    /// Connect and verify that `model` is installed
    ///
    /// Must be called from within a tokio runtime.
    pub async fn connect(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let model = model.into();
        let client = reqwest::Client::new();

        let tags: OllamaTagsResponse = client
            .get(format!("{}/api/tags", base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RagError::EngineUnavailable {
                reason: format!("Ollama not reachable at {}: {}", base_url, e),
            })?
            .json()
            .await
            .map_err(|e| RagError::EngineUnavailable {
                reason: format!("Failed to parse Ollama model list: {}", e),
            })?;

        let installed = tags
            .models
            .iter()
            .any(|m| m.name == model || m.name.split(':').next() == Some(model.as_str()));
        if !installed {
            return Err(RagError::EngineUnavailable {
                reason: format!("Model '{}' is not installed. Run 'ollama pull {}'", model, model),
            });
        }

        Ok(Self {
            base_url,
            model,
            client,
            runtime: Handle::current(),
        })
    }

    async fn stream_generate(
        &self,
        request: &GenerationRequest,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()> {
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: true,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let mut response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RagError::generation(format!("Ollama request failed: {}", e)))?;

        let mut pending: Vec<u8> = Vec::new();
        while let Some(bytes) = response
            .chunk()
            .await
            .map_err(|e| RagError::generation(format!("Ollama stream interrupted: {}", e)))?
        {
            pending.extend_from_slice(&bytes);

            // Responses are newline-delimited JSON objects
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                let chunk: OllamaGenerateChunk = serde_json::from_slice(&line)?;
                if let Some(error) = chunk.error {
                    return Err(RagError::generation(format!("Ollama reported: {}", error)));
                }
                if !chunk.response.is_empty() && on_token(&chunk.response).is_break() {
                    return Ok(());
                }
                if chunk.done {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

impl NativeModel for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()> {
        let runtime = self.runtime.clone();
        runtime.block_on(self.stream_generate(request, on_token))
    }
}

/// Request body for Ollama embeddings API
#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response from Ollama embeddings API
#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}
