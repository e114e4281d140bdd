//! Filter and pipe AST for LogsQL queries.
//!
//! Every node carries enough to reproduce its canonical string form, so
//! `parse(q).to_string()` is a fixed point after one round-trip.

#![forbid(unsafe_code)]

pub mod fields;
pub mod filter;
pub mod pipe;
pub mod query;
pub mod quoting;
pub mod stats;

pub use fields::FieldsSet;
pub use filter::{
    canonical_column_name, AnyCasePhraseFilter, AnyCasePrefixFilter, ExactFilter,
    ExactPrefixFilter, Filter, InFilter, Ipv4RangeFilter, LenRangeFilter, PhraseFilter,
    PrefixFilter, RangeFilter, RegexpFilter, SequenceFilter, StreamFilter, StreamTagFilter,
    StreamTagOp, StringRangeFilter, TimeFilter,
};
pub use pipe::{Pipe, SortField};
pub use query::Query;
pub use stats::{ByStatsField, StatsFunc, StatsFuncExpr};
