//! Ragnest Retrieval - Query orchestration and response streaming
//!
//! [`RetrievalPipeline`] validates a query, searches the workspace, assembles prompt
//! context and drives generation. [`ResponseStreamer`] turns the streaming variant into
//! ordered protocol frames.

pub mod context;
pub mod models;
pub mod pipeline;
pub mod streamer;

pub use context::{build_prompt, AssembledContext, ContextAssembler};
pub use models::{QueryPlan, ResolvedPlan, RetrievalSettings, StreamingQuery};
pub use pipeline::RetrievalPipeline;
pub use streamer::{FrameStream, ResponseStreamer, StreamSettings};
