//! Stats accumulators: per-bucket runtime state for each aggregate
//! function, with commutative associative merge for combining per-worker
//! shards.

use logsql_block::value::{format_float, try_parse_float};
use logsql_block::BlockResult;
use logsql_expr::quoting::quote_string;
use logsql_expr::StatsFunc;
use rustc_hash::FxHashSet;

/// Runtime state for one aggregate function within one group bucket.
#[derive(Clone, Debug)]
pub enum Accumulator {
    Count { rows: u64 },
    CountEmpty { rows: u64 },
    CountUniq { seen: FxHashSet<Vec<String>> },
    Sum { sum: f64, seen: bool },
    Min { value: Option<f64> },
    Max { value: Option<f64> },
    Avg { sum: f64, count: u64 },
    /// Collected numeric sample for median/quantile.
    Samples { values: Vec<f64> },
    UniqValues { seen: FxHashSet<String> },
    Values { seen: FxHashSet<String>, ordered: Vec<String> },
    SumLen { len: u64 },
}

impl Accumulator {
    pub fn new(func: &StatsFunc) -> Self {
        match func {
            StatsFunc::Count { .. } => Accumulator::Count { rows: 0 },
            StatsFunc::CountEmpty { .. } => Accumulator::CountEmpty { rows: 0 },
            StatsFunc::CountUniq { .. } => Accumulator::CountUniq {
                seen: FxHashSet::default(),
            },
            StatsFunc::Sum { .. } => Accumulator::Sum { sum: 0.0, seen: false },
            StatsFunc::Min { .. } => Accumulator::Min { value: None },
            StatsFunc::Max { .. } => Accumulator::Max { value: None },
            StatsFunc::Avg { .. } => Accumulator::Avg { sum: 0.0, count: 0 },
            StatsFunc::Median { .. } | StatsFunc::Quantile { .. } => {
                Accumulator::Samples { values: Vec::new() }
            }
            StatsFunc::UniqValues { .. } => Accumulator::UniqValues {
                seen: FxHashSet::default(),
            },
            StatsFunc::Values { .. } => Accumulator::Values {
                seen: FxHashSet::default(),
                ordered: Vec::new(),
            },
            StatsFunc::SumLen { .. } => Accumulator::SumLen { len: 0 },
        }
    }

    /// Fold one row into the accumulator.
    pub fn update(&mut self, func: &StatsFunc, br: &BlockResult, row: usize) {
        let star = func.contains_star();
        let limit = func.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        match self {
            Accumulator::Count { rows } => {
                // count(*) is a plain row counter and needs no column data;
                // the needed-columns analysis materializes nothing for it
                if star {
                    *rows += 1;
                    return;
                }
                let mut non_empty = false;
                each_value(func.fields(), star, br, row, |v| non_empty |= !v.is_empty());
                if non_empty {
                    *rows += 1;
                }
            }
            Accumulator::CountEmpty { rows } => {
                let mut all_empty = true;
                each_value(func.fields(), star, br, row, |v| all_empty &= v.is_empty());
                if all_empty {
                    *rows += 1;
                }
            }
            Accumulator::CountUniq { seen } => {
                let mut tuple = Vec::new();
                each_value(func.fields(), star, br, row, |v| tuple.push(v.to_string()));
                if tuple.iter().all(String::is_empty) {
                    return;
                }
                if seen.len() < limit {
                    seen.insert(tuple);
                }
            }
            Accumulator::Sum { sum, seen } => {
                each_value(func.fields(), star, br, row, |v| {
                    if let Some(f) = try_parse_float(v) {
                        *sum += f;
                        *seen = true;
                    }
                });
            }
            Accumulator::Min { value } => {
                each_value(func.fields(), star, br, row, |v| {
                    if let Some(f) = try_parse_float(v) {
                        *value = Some(value.map_or(f, |cur| cur.min(f)));
                    }
                });
            }
            Accumulator::Max { value } => {
                each_value(func.fields(), star, br, row, |v| {
                    if let Some(f) = try_parse_float(v) {
                        *value = Some(value.map_or(f, |cur| cur.max(f)));
                    }
                });
            }
            Accumulator::Avg { sum, count } => {
                each_value(func.fields(), star, br, row, |v| {
                    if let Some(f) = try_parse_float(v) {
                        *sum += f;
                        *count += 1;
                    }
                });
            }
            Accumulator::Samples { values } => {
                each_value(func.fields(), star, br, row, |v| {
                    if let Some(f) = try_parse_float(v) {
                        values.push(f);
                    }
                });
            }
            Accumulator::UniqValues { seen } => {
                each_value(func.fields(), star, br, row, |v| {
                    if !v.is_empty() && !seen.contains(v) && seen.len() < limit {
                        seen.insert(v.to_string());
                    }
                });
            }
            Accumulator::Values { seen, ordered } => {
                each_value(func.fields(), star, br, row, |v| {
                    if !v.is_empty() && !seen.contains(v) && seen.len() < limit {
                        seen.insert(v.to_string());
                        ordered.push(v.to_string());
                    }
                });
            }
            Accumulator::SumLen { len } => {
                each_value(func.fields(), star, br, row, |v| *len += v.len() as u64);
            }
        }
    }

    /// Merge another shard's state into this one. Commutative up to the
    /// insertion order kept by `Values`, which merges do preserve by
    /// visiting shards in worker order.
    pub fn merge(&mut self, other: Accumulator, func: &StatsFunc) {
        let limit = func.limit().map(|l| l as usize).unwrap_or(usize::MAX);
        match (self, other) {
            (Accumulator::Count { rows }, Accumulator::Count { rows: o }) => *rows += o,
            (Accumulator::CountEmpty { rows }, Accumulator::CountEmpty { rows: o }) => *rows += o,
            (Accumulator::CountUniq { seen }, Accumulator::CountUniq { seen: o }) => {
                for tuple in o {
                    if seen.len() >= limit {
                        break;
                    }
                    seen.insert(tuple);
                }
            }
            (Accumulator::Sum { sum, seen }, Accumulator::Sum { sum: os, seen: on }) => {
                *sum += os;
                *seen |= on;
            }
            (Accumulator::Min { value }, Accumulator::Min { value: o }) => {
                if let Some(f) = o {
                    *value = Some(value.map_or(f, |cur| cur.min(f)));
                }
            }
            (Accumulator::Max { value }, Accumulator::Max { value: o }) => {
                if let Some(f) = o {
                    *value = Some(value.map_or(f, |cur| cur.max(f)));
                }
            }
            (Accumulator::Avg { sum, count }, Accumulator::Avg { sum: os, count: oc }) => {
                *sum += os;
                *count += oc;
            }
            (Accumulator::Samples { values }, Accumulator::Samples { values: o }) => {
                values.extend(o);
            }
            (Accumulator::UniqValues { seen }, Accumulator::UniqValues { seen: o }) => {
                for v in o {
                    if seen.len() >= limit {
                        break;
                    }
                    seen.insert(v);
                }
            }
            (
                Accumulator::Values { seen, ordered },
                Accumulator::Values { seen: _, ordered: o },
            ) => {
                for v in o {
                    if !seen.contains(&v) && seen.len() < limit {
                        seen.insert(v.clone());
                        ordered.push(v);
                    }
                }
            }
            (Accumulator::SumLen { len }, Accumulator::SumLen { len: o }) => *len += o,
            (s, o) => {
                debug_assert!(false, "mismatched accumulators: {s:?} vs {o:?}");
            }
        }
    }

    /// Render the final value for the output row.
    pub fn finalize(&self, func: &StatsFunc) -> String {
        match self {
            Accumulator::Count { rows }
            | Accumulator::CountEmpty { rows }
            | Accumulator::SumLen { len: rows } => rows.to_string(),
            Accumulator::CountUniq { seen } => seen.len().to_string(),
            Accumulator::Sum { sum, seen } => {
                if *seen {
                    format_float(*sum)
                } else {
                    "0".to_string()
                }
            }
            Accumulator::Min { value } | Accumulator::Max { value } => {
                value.map(format_float).unwrap_or_default()
            }
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    "NaN".to_string()
                } else {
                    format_float(sum / *count as f64)
                }
            }
            Accumulator::Samples { values } => {
                let phi = match func {
                    StatsFunc::Quantile { phi, .. } => *phi,
                    _ => 0.5,
                };
                match nearest_rank(values, phi) {
                    Some(f) => format_float(f),
                    None => "NaN".to_string(),
                }
            }
            Accumulator::UniqValues { seen } => {
                let mut all: Vec<&String> = seen.iter().collect();
                all.sort_unstable();
                render_array(all.into_iter())
            }
            Accumulator::Values { ordered, .. } => render_array(ordered.iter()),
        }
    }
}

fn each_value<F: FnMut(&str)>(
    fields: &[String],
    star: bool,
    br: &BlockResult,
    row: usize,
    mut f: F,
) {
    if star {
        for col in &br.columns {
            f(&col.values[row]);
        }
    } else {
        for name in fields {
            f(br.field_value(name, row));
        }
    }
}

/// Nearest-rank quantile over the collected sample; `phi` ∈ [0, 1].
fn nearest_rank(values: &[f64], phi: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (phi * sorted.len() as f64).ceil() as usize;
    Some(sorted[rank.clamp(1, sorted.len()) - 1])
}

fn render_array<'a, I: Iterator<Item = &'a String>>(values: I) -> String {
    let mut out = String::from("[");
    for (i, v) in values.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote_string(v));
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_nearest_rank() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(nearest_rank(&values, 0.0), Some(1.0));
        assert_eq!(nearest_rank(&values, 0.25), Some(1.0));
        assert_eq!(nearest_rank(&values, 0.5), Some(2.0));
        assert_eq!(nearest_rank(&values, 0.75), Some(3.0));
        assert_eq!(nearest_rank(&values, 1.0), Some(4.0));
        assert_eq!(nearest_rank(&[], 0.5), None);
        let odd = [5.0, 1.0, 3.0];
        assert_eq!(nearest_rank(&odd, 0.5), Some(3.0));
    }
}
