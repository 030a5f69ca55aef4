//! Release Index Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod catalogue;
pub mod catalogue_store;
pub mod config;
pub mod indexer;
pub mod listing;
pub mod server;
pub mod verification;

// Re-export commonly used types for convenience
pub use catalogue_store::SqliteCatalogueStore;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerState};
