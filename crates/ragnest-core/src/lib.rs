//! Ragnest Core - Domain models, error taxonomy, and configuration
//!
//! This crate contains the types shared by the store, generation, retrieval, and API crates.

pub mod config;
pub mod error;
pub mod models;

pub use error::{ErrorCategory, RagError, Result};
