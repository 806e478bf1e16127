//! Search-index synchronization and zero-downtime reindexing for an
//! OAI-PMH metadata repository.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod state;

pub use error::{AppError, Result};
