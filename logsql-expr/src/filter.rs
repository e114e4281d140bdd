//! Tagged-variant filter AST.
//!
//! Each variant owns its parsed parameters plus whatever is needed to
//! reproduce the canonical string form. Derived data that depends on block
//! value types (lowercased phrases, typed `in(...)` sets) is memoized with
//! `OnceLock` so one parsed query can be shared by all worker threads.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::fields::FieldsSet;
use crate::quoting::{field_prefix, quote_string, quote_token};

/// Map the empty field alias to the default message field.
pub fn canonical_column_name(name: &str) -> &str {
    if name.is_empty() {
        "_msg"
    } else {
        name
    }
}

/// Case-sensitive phrase match at token boundaries.
#[derive(Clone, Debug)]
pub struct PhraseFilter {
    pub field_name: String,
    pub phrase: String,
}

/// Phrase match where the final token is a prefix.
#[derive(Clone, Debug)]
pub struct PrefixFilter {
    pub field_name: String,
    pub prefix: String,
}

impl PrefixFilter {
    /// The bare `*` filter: empty field, empty prefix. Matches any row with
    /// a non-empty value and constrains no columns.
    pub fn match_all(&self) -> bool {
        self.field_name.is_empty() && self.prefix.is_empty()
    }
}

/// ASCII-case-insensitive phrase match.
#[derive(Clone, Debug, Default)]
pub struct AnyCasePhraseFilter {
    pub field_name: String,
    pub phrase: String,
    lowered: OnceLock<String>,
}

impl AnyCasePhraseFilter {
    pub fn new(field_name: String, phrase: String) -> Self {
        AnyCasePhraseFilter {
            field_name,
            phrase,
            lowered: OnceLock::new(),
        }
    }

    pub fn phrase_lowercase(&self) -> &str {
        self.lowered.get_or_init(|| self.phrase.to_ascii_lowercase())
    }
}

/// ASCII-case-insensitive prefix match.
#[derive(Clone, Debug, Default)]
pub struct AnyCasePrefixFilter {
    pub field_name: String,
    pub prefix: String,
    lowered: OnceLock<String>,
}

impl AnyCasePrefixFilter {
    pub fn new(field_name: String, prefix: String) -> Self {
        AnyCasePrefixFilter {
            field_name,
            prefix,
            lowered: OnceLock::new(),
        }
    }

    pub fn prefix_lowercase(&self) -> &str {
        self.lowered.get_or_init(|| self.prefix.to_ascii_lowercase())
    }
}

/// Whole-value equality.
#[derive(Clone, Debug)]
pub struct ExactFilter {
    pub field_name: String,
    pub value: String,
}

/// Raw (not token-anchored) value prefix.
#[derive(Clone, Debug)]
pub struct ExactPrefixFilter {
    pub field_name: String,
    pub prefix: String,
}

/// Ordered non-overlapping phrase occurrence.
#[derive(Clone, Debug)]
pub struct SequenceFilter {
    pub field_name: String,
    pub phrases: Vec<String>,
}

/// Membership in a literal value set. Typed projections of the set are
/// computed lazily by the evaluator, once per query.
#[derive(Clone, Debug, Default)]
pub struct InFilter {
    pub field_name: String,
    pub values: Vec<String>,
    pub string_set: OnceLock<FxHashSet<String>>,
    pub uint_set: OnceLock<FxHashSet<u64>>,
    /// f64 bit patterns of the parseable values.
    pub float_set: OnceLock<FxHashSet<u64>>,
    pub ipv4_set: OnceLock<FxHashSet<u32>>,
    pub timestamp_set: OnceLock<FxHashSet<i64>>,
}

impl InFilter {
    pub fn new(field_name: String, values: Vec<String>) -> Self {
        InFilter {
            field_name,
            values,
            ..InFilter::default()
        }
    }
}

/// Regular-expression match against the canonical string form.
#[derive(Clone, Debug)]
pub struct RegexpFilter {
    pub field_name: String,
    pub re: Regex,
}

/// Closed numeric interval `[min_value, max_value]` after bracket
/// inclusivity has been folded into the endpoints.
#[derive(Clone, Debug)]
pub struct RangeFilter {
    pub field_name: String,
    pub min_value: f64,
    pub max_value: f64,
    /// Original bracket/argument spelling, e.g. `[1.5K, 22.5GiB)`.
    pub string_repr: String,
}

/// Half-open lexicographic interval `[min_value, max_value)`.
#[derive(Clone, Debug)]
pub struct StringRangeFilter {
    pub field_name: String,
    pub min_value: String,
    pub max_value: String,
}

/// Inclusive ipv4 address interval.
#[derive(Clone, Debug)]
pub struct Ipv4RangeFilter {
    pub field_name: String,
    pub min_value: u32,
    pub max_value: u32,
}

/// Inclusive byte-length interval of the canonical string form.
#[derive(Clone, Debug)]
pub struct LenRangeFilter {
    pub field_name: String,
    pub min_len: u64,
    pub max_len: u64,
    /// Original argument spelling, e.g. `(1.5KB, 22MB100KB)`.
    pub string_repr: String,
}

/// Inclusive `[min_timestamp, max_timestamp]` nanosecond interval on the
/// `_time` field.
#[derive(Clone, Debug)]
pub struct TimeFilter {
    pub min_timestamp: i64,
    pub max_timestamp: i64,
    pub string_repr: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamTagOp {
    Eq,
    Ne,
    Re,
    NotRe,
}

impl StreamTagOp {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamTagOp::Eq => "=",
            StreamTagOp::Ne => "!=",
            StreamTagOp::Re => "=~",
            StreamTagOp::NotRe => "!~",
        }
    }
}

/// One `label op "value"` matcher inside a `_stream:{...}` filter.
#[derive(Clone, Debug)]
pub struct StreamTagFilter {
    pub tag: String,
    pub op: StreamTagOp,
    pub value: String,
    /// Compiled anchored regex for `=~`/`!~`.
    pub re: Option<Regex>,
}

impl StreamTagFilter {
    /// Whether the matcher accepts the given label value.
    pub fn matches(&self, value: &str) -> bool {
        match self.op {
            StreamTagOp::Eq => value == self.value,
            StreamTagOp::Ne => value != self.value,
            StreamTagOp::Re => self.re.as_ref().is_some_and(|re| re.is_match(value)),
            StreamTagOp::NotRe => !self.re.as_ref().is_some_and(|re| re.is_match(value)),
        }
    }
}

/// Label-set matcher on the special `_stream` field: OR of AND groups.
#[derive(Clone, Debug, Default)]
pub struct StreamFilter {
    pub or_groups: Vec<Vec<StreamTagFilter>>,
}

impl StreamFilter {
    /// Whether a block's stream labels satisfy the matcher.
    pub fn matches(&self, labels: &[(String, String)]) -> bool {
        self.or_groups.iter().any(|group| {
            group.iter().all(|tf| {
                let value = labels
                    .iter()
                    .find(|(name, _)| *name == tf.tag)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("");
                tf.matches(value)
            })
        })
    }
}

/// A parsed filter tree.
#[derive(Clone, Debug)]
pub enum Filter {
    /// Matches everything; produced by the empty `_stream:{}` matcher.
    Noop,
    Phrase(PhraseFilter),
    Prefix(PrefixFilter),
    AnyCasePhrase(AnyCasePhraseFilter),
    AnyCasePrefix(AnyCasePrefixFilter),
    Exact(ExactFilter),
    ExactPrefix(ExactPrefixFilter),
    Sequence(SequenceFilter),
    In(InFilter),
    Regexp(RegexpFilter),
    Range(RangeFilter),
    StringRange(StringRangeFilter),
    Ipv4Range(Ipv4RangeFilter),
    LenRange(LenRangeFilter),
    Time(TimeFilter),
    Stream(StreamFilter),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Add every column the filter reads to `needed`. The bare `*` filter
    /// constrains nothing and contributes nothing.
    pub fn update_needed_fields(&self, needed: &mut FieldsSet) {
        match self {
            Filter::Noop => {}
            Filter::Phrase(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Prefix(f) => {
                if !f.match_all() {
                    needed.add(canonical_column_name(&f.field_name));
                }
            }
            Filter::AnyCasePhrase(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::AnyCasePrefix(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Exact(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::ExactPrefix(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Sequence(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::In(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Regexp(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Range(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::StringRange(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Ipv4Range(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::LenRange(f) => needed.add(canonical_column_name(&f.field_name)),
            Filter::Time(_) => needed.add("_time"),
            Filter::Stream(_) => needed.add("_stream"),
            Filter::And(fs) | Filter::Or(fs) => {
                for f in fs {
                    f.update_needed_fields(needed);
                }
            }
            Filter::Not(f) => f.update_needed_fields(needed),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Noop => Ok(()),
            Filter::Phrase(p) => {
                write!(f, "{}{}", field_prefix(&p.field_name), quote_token(&p.phrase))
            }
            Filter::Prefix(p) => {
                write!(f, "{}", field_prefix(&p.field_name))?;
                if p.prefix.is_empty() {
                    write!(f, "*")
                } else {
                    write!(f, "{}*", quote_token(&p.prefix))
                }
            }
            Filter::AnyCasePhrase(p) => write!(
                f,
                "{}i({})",
                field_prefix(&p.field_name),
                quote_token(&p.phrase)
            ),
            Filter::AnyCasePrefix(p) => {
                write!(f, "{}i(", field_prefix(&p.field_name))?;
                if p.prefix.is_empty() {
                    write!(f, "*)")
                } else {
                    write!(f, "{}*)", quote_token(&p.prefix))
                }
            }
            Filter::Exact(e) => write!(
                f,
                "{}exact({})",
                field_prefix(&e.field_name),
                quote_token(&e.value)
            ),
            Filter::ExactPrefix(e) => write!(
                f,
                "{}exact({}*)",
                field_prefix(&e.field_name),
                quote_token(&e.prefix)
            ),
            Filter::Sequence(s) => {
                write!(f, "{}seq(", field_prefix(&s.field_name))?;
                for (i, p) in s.phrases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", quote_token(p))?;
                }
                write!(f, ")")
            }
            Filter::In(x) => {
                write!(f, "{}in(", field_prefix(&x.field_name))?;
                for (i, v) in x.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", quote_token(v))?;
                }
                write!(f, ")")
            }
            Filter::Regexp(r) => write!(
                f,
                "{}re({})",
                field_prefix(&r.field_name),
                quote_string(r.re.as_str())
            ),
            Filter::Range(r) => write!(f, "{}range{}", field_prefix(&r.field_name), r.string_repr),
            Filter::StringRange(r) => write!(
                f,
                "{}string_range({}, {})",
                field_prefix(&r.field_name),
                quote_token(&r.min_value),
                quote_token(&r.max_value)
            ),
            Filter::Ipv4Range(r) => {
                let fmt_ip = |addr: u32| {
                    let b = addr.to_be_bytes();
                    format!("{}.{}.{}.{}", b[0], b[1], b[2], b[3])
                };
                write!(
                    f,
                    "{}ipv4_range({}, {})",
                    field_prefix(&r.field_name),
                    fmt_ip(r.min_value),
                    fmt_ip(r.max_value)
                )
            }
            Filter::LenRange(r) => write!(
                f,
                "{}len_range{}",
                field_prefix(&r.field_name),
                r.string_repr
            ),
            Filter::Time(t) => write!(f, "_time:{}", t.string_repr),
            Filter::Stream(s) => {
                write!(f, "_stream:{{")?;
                for (gi, group) in s.or_groups.iter().enumerate() {
                    if gi > 0 {
                        write!(f, " or ")?;
                    }
                    for (ti, tf) in group.iter().enumerate() {
                        if ti > 0 {
                            write!(f, ",")?;
                        }
                        write!(
                            f,
                            "{}{}{}",
                            quote_token(&tf.tag),
                            tf.op.as_str(),
                            quote_string(&tf.value)
                        )?;
                    }
                }
                write!(f, "}}")
            }
            Filter::And(fs) => {
                for (i, x) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    if matches!(x, Filter::Or(_)) {
                        write!(f, "({x})")?;
                    } else {
                        write!(f, "{x}")?;
                    }
                }
                Ok(())
            }
            Filter::Or(fs) => {
                for (i, x) in fs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{x}")?;
                }
                Ok(())
            }
            Filter::Not(x) => match **x {
                Filter::And(_) | Filter::Or(_) => write!(f, "!({x})"),
                _ => write!(f, "!{x}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_basic() {
        let f = Filter::And(vec![
            Filter::Phrase(PhraseFilter {
                field_name: String::new(),
                phrase: "foo".into(),
            }),
            Filter::Or(vec![
                Filter::Phrase(PhraseFilter {
                    field_name: "level".into(),
                    phrase: "error".into(),
                }),
                Filter::Prefix(PrefixFilter {
                    field_name: "level".into(),
                    prefix: "warn".into(),
                }),
            ]),
            Filter::Not(Box::new(Filter::Phrase(PhraseFilter {
                field_name: String::new(),
                phrase: "connection reset".into(),
            }))),
        ]);
        assert_eq!(
            f.to_string(),
            "foo (level:error or level:warn*) !\"connection reset\""
        );
    }

    #[test]
    fn needed_fields() {
        let f = Filter::And(vec![
            Filter::Phrase(PhraseFilter {
                field_name: String::new(),
                phrase: "foo".into(),
            }),
            Filter::Prefix(PrefixFilter {
                field_name: String::new(),
                prefix: String::new(),
            }),
            Filter::Time(TimeFilter {
                min_timestamp: 0,
                max_timestamp: 1,
                string_repr: "5m".into(),
            }),
        ]);
        let mut needed = FieldsSet::new();
        f.update_needed_fields(&mut needed);
        assert_eq!(needed.get_all(), vec!["_msg", "_time"]);
    }

    #[test]
    fn stream_matching() {
        let sf = StreamFilter {
            or_groups: vec![
                vec![StreamTagFilter {
                    tag: "job".into(),
                    op: StreamTagOp::Eq,
                    value: "api".into(),
                    re: None,
                }],
                vec![StreamTagFilter {
                    tag: "env".into(),
                    op: StreamTagOp::Re,
                    value: "prod|staging".into(),
                    re: Some(Regex::new("^(?:prod|staging)$").unwrap()),
                }],
            ],
        };
        let labels = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect::<Vec<_>>()
        };
        assert!(sf.matches(&labels(&[("job", "api")])));
        assert!(sf.matches(&labels(&[("env", "staging")])));
        assert!(!sf.matches(&labels(&[("job", "worker"), ("env", "dev")])));
    }
}
