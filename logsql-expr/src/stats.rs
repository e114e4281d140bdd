//! Stats pipe AST: grouping fields with optional buckets, and the
//! aggregate functions.

use std::fmt;

use crate::quoting::quote_token;

/// One `by (...)` entry: a field name with an optional bucket.
///
/// Time buckets (`_time:1d offset 2h`) are applied in UTC nanoseconds; no
/// timezone database is consulted, so a bucket offset shifts both endpoints
/// by a fixed duration even across DST transitions.
#[derive(Clone, Debug)]
pub struct ByStatsField {
    pub name: String,
    /// Original bucket spelling (`1d`, `1_000KiB`, `/24`); empty when the
    /// field has no bucket.
    pub bucket_size_str: String,
    /// Bucket width: nanoseconds for durations, plain numeric width
    /// otherwise. Zero when the field has no numeric bucket.
    pub bucket_size: f64,
    /// Network prefix length for `field:/N` buckets.
    pub ip_prefix_bits: Option<u8>,
    pub bucket_offset_str: String,
    pub bucket_offset: f64,
}

impl ByStatsField {
    pub fn plain(name: impl Into<String>) -> Self {
        ByStatsField {
            name: name.into(),
            bucket_size_str: String::new(),
            bucket_size: 0.0,
            ip_prefix_bits: None,
            bucket_offset_str: String::new(),
            bucket_offset: 0.0,
        }
    }

    pub fn has_bucket(&self) -> bool {
        !self.bucket_size_str.is_empty()
    }
}

impl fmt::Display for ByStatsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_token(&self.name))?;
        if !self.bucket_size_str.is_empty() {
            write!(f, ":{}", self.bucket_size_str)?;
            if !self.bucket_offset_str.is_empty() {
                write!(f, " offset {}", self.bucket_offset_str)?;
            }
        }
        Ok(())
    }
}

/// Aggregate function with its argument fields. An empty field list or a
/// `*` entry means "all columns" and renders as `(*)`.
#[derive(Clone, Debug)]
pub enum StatsFunc {
    Count { fields: Vec<String> },
    CountEmpty { fields: Vec<String> },
    CountUniq { fields: Vec<String>, limit: Option<u64> },
    Sum { fields: Vec<String> },
    Min { fields: Vec<String> },
    Max { fields: Vec<String> },
    Avg { fields: Vec<String> },
    Median { fields: Vec<String> },
    Quantile { phi: f64, phi_str: String, fields: Vec<String> },
    UniqValues { fields: Vec<String>, limit: Option<u64> },
    Values { fields: Vec<String>, limit: Option<u64> },
    SumLen { fields: Vec<String> },
}

impl StatsFunc {
    pub fn name(&self) -> &'static str {
        match self {
            StatsFunc::Count { .. } => "count",
            StatsFunc::CountEmpty { .. } => "count_empty",
            StatsFunc::CountUniq { .. } => "count_uniq",
            StatsFunc::Sum { .. } => "sum",
            StatsFunc::Min { .. } => "min",
            StatsFunc::Max { .. } => "max",
            StatsFunc::Avg { .. } => "avg",
            StatsFunc::Median { .. } => "median",
            StatsFunc::Quantile { .. } => "quantile",
            StatsFunc::UniqValues { .. } => "uniq_values",
            StatsFunc::Values { .. } => "values",
            StatsFunc::SumLen { .. } => "sum_len",
        }
    }

    pub fn fields(&self) -> &[String] {
        match self {
            StatsFunc::Count { fields }
            | StatsFunc::CountEmpty { fields }
            | StatsFunc::CountUniq { fields, .. }
            | StatsFunc::Sum { fields }
            | StatsFunc::Min { fields }
            | StatsFunc::Max { fields }
            | StatsFunc::Avg { fields }
            | StatsFunc::Median { fields }
            | StatsFunc::Quantile { fields, .. }
            | StatsFunc::UniqValues { fields, .. }
            | StatsFunc::Values { fields, .. }
            | StatsFunc::SumLen { fields } => fields,
        }
    }

    /// Whether the function reads every column.
    pub fn contains_star(&self) -> bool {
        self.fields().is_empty() || self.fields().iter().any(|f| f == "*")
    }

    pub fn limit(&self) -> Option<u64> {
        match self {
            StatsFunc::CountUniq { limit, .. }
            | StatsFunc::UniqValues { limit, .. }
            | StatsFunc::Values { limit, .. } => *limit,
            _ => None,
        }
    }

    /// Columns this function needs materialized. `count(*)` needs none;
    /// every other starred function needs all of them.
    pub fn needed_fields(&self) -> Vec<String> {
        if self.contains_star() {
            return match self {
                StatsFunc::Count { .. } => Vec::new(),
                _ => vec!["*".to_string()],
            };
        }
        self.fields().to_vec()
    }
}

impl fmt::Display for StatsFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        if let StatsFunc::Quantile { phi_str, .. } = self {
            write!(f, "{phi_str}, ")?;
        }
        if self.contains_star() {
            write!(f, "*")?;
        } else {
            for (i, field) in self.fields().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", quote_token(field))?;
            }
        }
        write!(f, ")")?;
        if let Some(limit) = self.limit() {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}

/// An aggregate function bound to its output column name.
#[derive(Clone, Debug)]
pub struct StatsFuncExpr {
    pub func: StatsFunc,
    pub result_name: String,
}

impl fmt::Display for StatsFuncExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} as {}", self.func, quote_token(&self.result_name))
    }
}
