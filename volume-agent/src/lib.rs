//! Volume Agent Library
//!
//! Node-local agent for pod volume backups: interprets the output of the
//! backup executable, measures and marks volumes, and recovers operations
//! left in progress by a previous agent process.

pub mod api;
pub mod config;
pub mod daemon;
pub mod exec;
pub mod fs;
pub mod recovery;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{AgentError, Result};
