//! Pipe-stage AST with canonical rendering and the needed-columns rewrite
//! each stage applies during the right-to-left analysis walk.

use std::fmt;

use crate::fields::FieldsSet;
use crate::quoting::quote_token;
use crate::stats::{ByStatsField, StatsFuncExpr};

/// One `sort by (...)` entry.
#[derive(Clone, Debug)]
pub struct SortField {
    pub name: String,
    pub desc: bool,
}

/// A pipeline stage. Stages compose left-to-right over projected rows.
#[derive(Clone, Debug)]
pub enum Pipe {
    /// Project to the listed columns; `*` keeps everything.
    Fields { fields: Vec<String> },
    /// Duplicate columns; a destination shadowing an existing column
    /// overwrites it.
    Copy { pairs: Vec<(String, String)> },
    /// Move columns; the source disappears from the output.
    Rename { pairs: Vec<(String, String)> },
    Delete { fields: Vec<String> },
    Limit { limit: u64 },
    Offset { offset: u64 },
    Sort {
        by: Vec<SortField>,
        desc: bool,
        offset: u64,
        limit: Option<u64>,
    },
    Uniq {
        by: Vec<String>,
        limit: Option<u64>,
    },
    Stats {
        by: Vec<ByStatsField>,
        funcs: Vec<StatsFuncExpr>,
    },
}

impl Pipe {
    /// Apply this stage's rewrite to the needed/unneeded column sets.
    /// `unneeded` is only populated while `needed` contains `*`.
    pub fn update_needed_fields(&self, needed: &mut FieldsSet, unneeded: &mut FieldsSet) {
        match self {
            Pipe::Fields { fields } => {
                if fields.iter().any(|f| f == "*") {
                    // keeps every column; nothing changes
                } else if needed.contains("*") {
                    needed.reset();
                    for f in fields {
                        if !unneeded.contains(f) {
                            needed.add(f);
                        }
                    }
                    unneeded.reset();
                } else {
                    let keep: Vec<String> = fields
                        .iter()
                        .filter(|f| needed.contains(f))
                        .cloned()
                        .collect();
                    needed.reset();
                    needed.add_all(&keep);
                }
            }
            Pipe::Copy { pairs } => {
                for (src, dst) in pairs.iter().rev() {
                    if needed.contains("*") {
                        if !unneeded.contains(dst) {
                            unneeded.add(dst);
                            unneeded.remove(src);
                        }
                    } else if needed.contains(dst) {
                        needed.remove(dst);
                        needed.add(src);
                    }
                }
            }
            Pipe::Rename { pairs } => {
                for (src, dst) in pairs.iter().rev() {
                    if needed.contains("*") {
                        if unneeded.contains(dst) {
                            unneeded.add(src);
                        } else {
                            unneeded.add(dst);
                            unneeded.remove(src);
                        }
                    } else if needed.contains(dst) {
                        needed.remove(dst);
                        needed.add(src);
                    } else {
                        needed.remove(src);
                    }
                }
            }
            Pipe::Delete { fields } => {
                if needed.contains("*") {
                    unneeded.add_all(fields);
                } else {
                    needed.remove_all(fields);
                }
            }
            Pipe::Limit { .. } | Pipe::Offset { .. } => {}
            Pipe::Sort { by, .. } => {
                let names = by.iter().map(|s| s.name.as_str());
                if needed.contains("*") {
                    unneeded.remove_all(names);
                } else {
                    needed.add_all(names);
                }
            }
            Pipe::Uniq { by, .. } => {
                needed.reset();
                unneeded.reset();
                if by.is_empty() {
                    needed.add("*");
                } else {
                    needed.add_all(by.iter().map(|b| b.as_str()));
                }
            }
            Pipe::Stats { by, funcs } => {
                let orig = needed.clone();
                needed.reset();
                let mut any_output_needed = false;
                for fx in funcs {
                    if orig.contains(&fx.result_name) && !unneeded.contains(&fx.result_name) {
                        needed.add_all(fx.func.needed_fields());
                        any_output_needed = true;
                    }
                }
                for b in by {
                    if orig.contains(&b.name) && !unneeded.contains(&b.name) {
                        needed.add(&b.name);
                        any_output_needed = true;
                    }
                }
                if any_output_needed {
                    needed.add_all(by.iter().map(|b| b.name.as_str()));
                }
                unneeded.reset();
            }
        }
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipe::Fields { fields } => {
                write!(f, "fields ")?;
                write_field_list(f, fields)
            }
            Pipe::Copy { pairs } => {
                write!(f, "copy ")?;
                write_pairs(f, pairs)
            }
            Pipe::Rename { pairs } => {
                write!(f, "rename ")?;
                write_pairs(f, pairs)
            }
            Pipe::Delete { fields } => {
                write!(f, "delete ")?;
                write_field_list(f, fields)
            }
            Pipe::Limit { limit } => write!(f, "limit {limit}"),
            Pipe::Offset { offset } => write!(f, "offset {offset}"),
            Pipe::Sort {
                by,
                desc,
                offset,
                limit,
            } => {
                write!(f, "sort")?;
                if !by.is_empty() {
                    write!(f, " by (")?;
                    for (i, s) in by.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", quote_token(&s.name))?;
                        if s.desc {
                            write!(f, " desc")?;
                        }
                    }
                    write!(f, ")")?;
                }
                if *desc {
                    write!(f, " desc")?;
                }
                if *offset > 0 {
                    write!(f, " offset {offset}")?;
                }
                if let Some(limit) = limit {
                    write!(f, " limit {limit}")?;
                }
                Ok(())
            }
            Pipe::Uniq { by, limit } => {
                write!(f, "uniq")?;
                if !by.is_empty() {
                    write!(f, " by (")?;
                    write_field_list(f, by)?;
                    write!(f, ")")?;
                }
                if let Some(limit) = limit {
                    write!(f, " limit {limit}")?;
                }
                Ok(())
            }
            Pipe::Stats { by, funcs } => {
                write!(f, "stats ")?;
                if !by.is_empty() {
                    write!(f, "by (")?;
                    for (i, b) in by.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{b}")?;
                    }
                    write!(f, ") ")?;
                }
                for (i, fx) in funcs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{fx}")?;
                }
                Ok(())
            }
        }
    }
}

fn write_field_list(f: &mut fmt::Formatter<'_>, fields: &[String]) -> fmt::Result {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if field == "*" {
            write!(f, "*")?;
        } else {
            write!(f, "{}", quote_token(field))?;
        }
    }
    Ok(())
}

fn write_pairs(f: &mut fmt::Formatter<'_>, pairs: &[(String, String)]) -> fmt::Result {
    for (i, (src, dst)) in pairs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} as {}", quote_token(src), quote_token(dst))?;
    }
    Ok(())
}
