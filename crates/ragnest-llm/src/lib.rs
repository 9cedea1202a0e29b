//! Ragnest LLM - Embedding and generation
//!
//! Ports for embedding and for the blocking generation backend, the adapters that
//! implement them, and the async [`GenerationEngine`] that serializes access to the
//! backend.

pub mod echo;
pub mod engine;
pub mod factory;
pub mod hashing;
pub mod ollama;
pub mod ports;

// Re-export main types
pub use echo::{EchoModel, DEGRADED_PREFIX};
pub use engine::{GenerationEngine, GenerationOutput, StreamEvent, TokenStream};
pub use factory::{build_embedder, load_engine};
pub use hashing::HashEmbedder;
pub use ollama::{OllamaEmbedder, OllamaGenerator, OLLAMA_LOCALHOST};
pub use ports::{Embedder, NativeModel};
