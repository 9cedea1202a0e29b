mod request;
mod response;

pub use request::{AddChunksRequest, QueryRequest, SearchRequest};
pub use response::{
    AddChunksResponse, CompactResponse, DeleteChunkResponse, MountResponse, SearchHit,
    SearchResponse,
};
