//! Unified error and result types shared by all LogsQL crates.

pub mod error;

pub use error::Error;

/// Result type alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;
