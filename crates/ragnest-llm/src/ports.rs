//! LLM port definitions

use async_trait::async_trait;
use ragnest_core::error::Result;
use ragnest_core::models::GenerationRequest;
use std::ops::ControlFlow;

/// Port for embedding text into vector representations
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of texts
    ///
    /// Identical input must produce identical vectors.
    ///
    /// # Returns
    /// Vector of embedding vectors, one per input text
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Get the dimensionality of embeddings produced by this embedder
    fn dimensions(&self) -> usize;

    /// Get the name/identifier of the embedding model
    fn model_name(&self) -> &str;
}

/// Port for a blocking, non-reentrant text generation backend
///
/// Implementations are only ever driven from one blocking worker at a time;
/// `&mut self` encodes that they cannot be entered twice.
pub trait NativeModel: Send {
    /// Name reported in engine status
    fn model_name(&self) -> &str;

    /// Generate text for `request`, handing each fragment to `on_token` as it is produced
    ///
    /// Must stop promptly once `on_token` returns `ControlFlow::Break`.
    fn generate(
        &mut self,
        request: &GenerationRequest,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()>;
}
