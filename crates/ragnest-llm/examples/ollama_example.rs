//! Stream a completion from a local Ollama model
//!
//! Falls back to the degraded echo model when Ollama is not running.
//! To run: cargo run -p ragnest-llm --example ollama_example -- llama3.2

use futures::StreamExt;
use ragnest_core::models::GenerationRequest;
use ragnest_llm::{load_engine, OLLAMA_LOCALHOST};
use std::io::Write;

#[tokio::main]
async fn main() -> ragnest_core::Result<()> {
    let model = std::env::args().nth(1).unwrap_or_else(|| "llama3.2".to_string());
    let engine = load_engine(&format!("ollama:{}", model), OLLAMA_LOCALHOST).await?;
    println!("Engine: {:?}\n", engine.status());

    let request = GenerationRequest::new("Explain retrieval-augmented generation in one sentence.", 128, 0.7);
    let mut stream = engine.generate_stream(request).await?;

    while let Some(fragment) = stream.next().await {
        print!("{}", fragment?);
        let _ = std::io::stdout().flush();
    }

    if let Some(stats) = stream.stats() {
        println!("\n\n{} tokens in {} ms ({:?})", stats.tokens, stats.elapsed_ms, stats.mode);
    }
    Ok(())
}
