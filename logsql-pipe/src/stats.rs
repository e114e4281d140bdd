//! Stats pipe: group rows by bucketed `by` values and fold each group
//! through the aggregate accumulators.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use logsql_block::value::{
    format_float, format_ipv4, format_timestamp_iso8601, try_parse_float, try_parse_ipv4,
};
use logsql_block::{BlockResult, ResultColumn};
use logsql_expr::{ByStatsField, StatsFuncExpr};
use logsql_result::{Error, Result};
use rustc_hash::FxHashMap;

use crate::aggregate::Accumulator;
use crate::PipeProcessor;

type GroupMap = FxHashMap<Vec<String>, Vec<Accumulator>>;

struct StatsProcessor {
    by: Vec<ByStatsField>,
    funcs: Vec<StatsFuncExpr>,
    shards: Vec<Mutex<GroupMap>>,
    next: Arc<dyn PipeProcessor>,
}

impl PipeProcessor for StatsProcessor {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        let shard = self
            .shards
            .get(worker_id)
            .ok_or_else(|| Error::Internal(format!("worker {worker_id} out of range")))?;
        let mut groups = shard
            .lock()
            .map_err(|_| Error::Internal("poisoned stats shard".into()))?;
        for row in 0..br.row_count() {
            let key: Vec<String> = self
                .by
                .iter()
                .map(|b| bucket_value(b, br, row))
                .collect();
            let accs = groups
                .entry(key)
                .or_insert_with(|| self.funcs.iter().map(|fx| Accumulator::new(&fx.func)).collect());
            for (acc, fx) in accs.iter_mut().zip(&self.funcs) {
                acc.update(&fx.func, br, row);
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // merge shards into a sorted map so the output order is stable
        // regardless of how blocks were distributed over workers
        let mut merged: BTreeMap<Vec<String>, Vec<Accumulator>> = BTreeMap::new();
        for shard in &self.shards {
            let mut groups = shard
                .lock()
                .map_err(|_| Error::Internal("poisoned stats shard".into()))?;
            for (key, accs) in groups.drain() {
                match merged.entry(key) {
                    std::collections::btree_map::Entry::Vacant(e) => {
                        e.insert(accs);
                    }
                    std::collections::btree_map::Entry::Occupied(mut e) => {
                        for ((dst, src), fx) in
                            e.get_mut().iter_mut().zip(accs).zip(&self.funcs)
                        {
                            dst.merge(src, &fx.func);
                        }
                    }
                }
            }
        }
        if !merged.is_empty() {
            let count = merged.len();
            let mut columns: Vec<ResultColumn> = self
                .by
                .iter()
                .map(|b| ResultColumn {
                    name: b.name.clone(),
                    values: Vec::with_capacity(count),
                })
                .chain(self.funcs.iter().map(|fx| ResultColumn {
                    name: fx.result_name.clone(),
                    values: Vec::with_capacity(count),
                }))
                .collect();
            for (key, accs) in &merged {
                for (i, v) in key.iter().enumerate() {
                    columns[i].values.push(v.clone());
                }
                for (i, (acc, fx)) in accs.iter().zip(&self.funcs).enumerate() {
                    columns[self.by.len() + i].values.push(acc.finalize(&fx.func));
                }
            }
            let out = BlockResult {
                timestamps: vec![0; count],
                columns,
            };
            self.next.write_block(0, &out)?;
        }
        self.next.flush()
    }
}

/// Compute the group-key component for one `by` field.
fn bucket_value(b: &ByStatsField, br: &BlockResult, row: usize) -> String {
    if let Some(bits) = b.ip_prefix_bits {
        let v = br.field_value(&b.name, row);
        return match try_parse_ipv4(v) {
            Some(addr) => {
                let mask = if bits == 0 { 0 } else { u32::MAX << (32 - u32::from(bits)) };
                format_ipv4(addr & mask)
            }
            None => v.to_string(),
        };
    }
    if !b.has_bucket() || b.bucket_size <= 0.0 {
        return br.field_value(&b.name, row).to_string();
    }
    if b.name == "_time" {
        // offsets are applied in UTC nanoseconds
        let step = (b.bucket_size as i64).max(1);
        let offset = b.bucket_offset as i64;
        let ts = br.timestamps[row] - offset;
        let start = ts.div_euclid(step) * step + offset;
        return format_timestamp_iso8601(start);
    }
    let v = br.field_value(&b.name, row);
    match try_parse_float(v) {
        Some(f) => {
            let start = ((f - b.bucket_offset) / b.bucket_size).floor() * b.bucket_size
                + b.bucket_offset;
            format_float(start)
        }
        None => v.to_string(),
    }
}

pub(crate) fn stats_processor(
    by: Vec<ByStatsField>,
    funcs: Vec<StatsFuncExpr>,
    workers: usize,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(StatsProcessor {
        by,
        funcs,
        shards: (0..workers.max(1)).map(|_| Mutex::new(GroupMap::default())).collect(),
        next,
    })
}
