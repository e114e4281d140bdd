//! Lexer and recursive-descent parser for the LogsQL query language.
//!
//! The parser produces [`logsql_expr::Query`] values whose `Display` output
//! is canonical: rendering a parsed query and parsing it again yields the
//! same rendering.

#![forbid(unsafe_code)]

pub mod datetime;
pub mod lexer;
pub mod number;
pub mod parser;

pub use lexer::Lexer;
pub use parser::{parse_query, parse_query_at};
