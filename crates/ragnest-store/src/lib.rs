//! Ragnest Store - Workspace vector storage
//!
//! A flat L2 index per workspace, position-aligned chunk records, and the
//! [`WorkspaceVectorStore`] that mounts, mutates, searches and persists them.

pub mod flat;
pub mod persistence;
pub mod ports;
pub mod store;
pub mod workspace;

pub use flat::FlatL2Index;
pub use ports::WorkspaceStore;
pub use store::{StoreConfig, WorkspaceVectorStore};
pub use workspace::WorkspaceIndex;
