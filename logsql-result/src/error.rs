use std::fmt;

use thiserror::Error;

/// Unified error type for query parsing and evaluation.
///
/// Errors propagate upward with the `?` operator. Parse-time errors are
/// recoverable (fix the query and retry); `CorruptBlock` aborts the query,
/// since it indicates data that violates the block encoding invariants.
///
/// `Error` is `Send + Sync` so worker threads can hand failures back to the
/// query driver.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The query text could not be parsed. `position` is the byte offset of
    /// the offending token in the original query string.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// A `re(...)` or `_stream` regex failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    /// A malformed number, size or duration literal.
    #[error("invalid numeric literal {0:?}")]
    InvalidNumeric(String),

    /// A typed column cell violates the block encoding invariants, e.g. a
    /// uint16 cell that is not exactly 2 bytes or a dict index past the end
    /// of the dictionary.
    #[error("corrupt block in {part}: {detail}")]
    CorruptBlock { part: String, detail: String },

    /// The query was cancelled between blocks.
    #[error("query cancelled")]
    Cancelled,

    /// An internal invariant was violated. This indicates a bug rather than
    /// bad input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a parse error at the given byte position.
    #[inline]
    pub fn parse<M: fmt::Display>(position: usize, message: M) -> Self {
        Error::Parse {
            position,
            message: message.to_string(),
        }
    }

    /// Build a `CorruptBlock` error for the named part.
    #[inline]
    pub fn corrupt_block<P: Into<String>, D: fmt::Display>(part: P, detail: D) -> Self {
        Error::CorruptBlock {
            part: part.into(),
            detail: detail.to_string(),
        }
    }
}
