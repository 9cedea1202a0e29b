pub mod chunk;
pub mod generation;
pub mod query;
pub mod retrieval;
pub mod stream;
pub mod workspace;

pub use chunk::{ChunkId, ChunkInput, ChunkMetadata, ChunkRecord};
pub use generation::{
    EngineStatus, GenerationMode, GenerationRequest, GenerationStats, MAX_GENERATION_TOKENS,
    MAX_TEMPERATURE,
};
pub use query::{QueryOutcome, SourceAttribution};
pub use retrieval::{RetrievalResult, SearchOutcome};
pub use stream::{parse_frames, FrameKind, StreamFrame};
pub use workspace::{validate_workspace_id, HealthReport, WorkspaceStats};
