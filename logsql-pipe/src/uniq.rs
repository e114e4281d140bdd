//! Uniq pipe: first occurrence of each distinct tuple.

use std::sync::{Arc, Mutex};

use logsql_block::{BlockResult, ResultColumn};
use logsql_result::{Error, Result};
use rustc_hash::FxHashSet;

use crate::rows::{block_from_rows, rows_from_block, Row};
use crate::PipeProcessor;

#[derive(Default)]
struct UniqShard {
    seen: FxHashSet<Vec<String>>,
    /// Keys in first-seen order (`by` mode) or whole rows (bare mode).
    keys: Vec<Vec<String>>,
    rows: Vec<Row>,
}

struct UniqProcessor {
    by: Vec<String>,
    limit: Option<u64>,
    shards: Vec<Mutex<UniqShard>>,
    next: Arc<dyn PipeProcessor>,
}

impl PipeProcessor for UniqProcessor {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        let shard = self
            .shards
            .get(worker_id)
            .ok_or_else(|| Error::Internal(format!("worker {worker_id} out of range")))?;
        let mut shard = shard
            .lock()
            .map_err(|_| Error::Internal("poisoned uniq shard".into()))?;
        if self.by.is_empty() {
            for row in rows_from_block(br) {
                let mut key: Vec<String> = Vec::with_capacity(row.fields.len() * 2);
                for (name, value) in &row.fields {
                    key.push(name.clone());
                    key.push(value.clone());
                }
                if shard.seen.insert(key) {
                    shard.rows.push(row);
                }
            }
        } else {
            for row in 0..br.row_count() {
                let key: Vec<String> = self
                    .by
                    .iter()
                    .map(|name| br.field_value(name, row).to_string())
                    .collect();
                if shard.seen.insert(key.clone()) {
                    shard.keys.push(key);
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let limit = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        if self.by.is_empty() {
            let mut seen: FxHashSet<Vec<String>> = FxHashSet::default();
            let mut rows: Vec<Row> = Vec::new();
            'outer: for shard in &self.shards {
                let shard = shard
                    .lock()
                    .map_err(|_| Error::Internal("poisoned uniq shard".into()))?;
                for row in &shard.rows {
                    let mut key: Vec<String> = Vec::with_capacity(row.fields.len() * 2);
                    for (name, value) in &row.fields {
                        key.push(name.clone());
                        key.push(value.clone());
                    }
                    if seen.insert(key) {
                        rows.push(row.clone());
                        if rows.len() >= limit {
                            break 'outer;
                        }
                    }
                }
            }
            if !rows.is_empty() {
                self.next.write_block(0, &block_from_rows(&rows))?;
            }
        } else {
            let mut seen: FxHashSet<Vec<String>> = FxHashSet::default();
            let mut keys: Vec<Vec<String>> = Vec::new();
            'outer2: for shard in &self.shards {
                let shard = shard
                    .lock()
                    .map_err(|_| Error::Internal("poisoned uniq shard".into()))?;
                for key in &shard.keys {
                    if seen.insert(key.clone()) {
                        keys.push(key.clone());
                        if keys.len() >= limit {
                            break 'outer2;
                        }
                    }
                }
            }
            if !keys.is_empty() {
                let out = BlockResult {
                    timestamps: vec![0; keys.len()],
                    columns: self
                        .by
                        .iter()
                        .enumerate()
                        .map(|(i, name)| ResultColumn {
                            name: name.clone(),
                            values: keys.iter().map(|k| k[i].clone()).collect(),
                        })
                        .collect(),
                };
                self.next.write_block(0, &out)?;
            }
        }
        self.next.flush()
    }
}

pub(crate) fn uniq_processor(
    by: Vec<String>,
    limit: Option<u64>,
    workers: usize,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(UniqProcessor {
        by,
        limit,
        shards: (0..workers.max(1)).map(|_| Mutex::new(UniqShard::default())).collect(),
        next,
    })
}
