//! Bounded top-K sort pipe.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use logsql_block::BlockResult;
use logsql_expr::SortField;
use logsql_result::{Error, Result};

use crate::rows::{block_from_rows, rows_from_block, Row};
use crate::PipeProcessor;

struct SortProcessor {
    by: Vec<SortField>,
    desc: bool,
    offset: u64,
    limit: Option<u64>,
    shards: Vec<Mutex<Vec<Row>>>,
    next: Arc<dyn PipeProcessor>,
}

impl SortProcessor {
    /// Rows a shard must retain to be able to produce the final window.
    fn keep_count(&self) -> Option<usize> {
        self.limit.map(|l| (self.offset + l) as usize)
    }

    fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = if self.by.is_empty() {
            a.timestamp.cmp(&b.timestamp).then_with(|| {
                for (name, av) in &a.fields {
                    let o = av.as_str().cmp(b.value(name));
                    if o != Ordering::Equal {
                        return o;
                    }
                }
                Ordering::Equal
            })
        } else {
            let mut ord = Ordering::Equal;
            for sf in &self.by {
                let o = a.value(&sf.name).cmp(b.value(&sf.name));
                let o = if sf.desc { o.reverse() } else { o };
                if o != Ordering::Equal {
                    ord = o;
                    break;
                }
            }
            ord
        };
        if self.desc {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl PipeProcessor for SortProcessor {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        let shard = self
            .shards
            .get(worker_id)
            .ok_or_else(|| Error::Internal(format!("worker {worker_id} out of range")))?;
        let mut rows = shard
            .lock()
            .map_err(|_| Error::Internal("poisoned sort shard".into()))?;
        rows.extend(rows_from_block(br));
        // keep shards bounded when the output window is known
        if let Some(k) = self.keep_count() {
            if rows.len() > 2 * k.max(64) {
                rows.sort_by(|a, b| self.compare(a, b));
                rows.truncate(k);
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut all: Vec<Row> = Vec::new();
        for shard in &self.shards {
            let mut rows = shard
                .lock()
                .map_err(|_| Error::Internal("poisoned sort shard".into()))?;
            all.append(&mut rows);
        }
        all.sort_by(|a, b| self.compare(a, b));
        let offset = (self.offset as usize).min(all.len());
        let end = match self.limit {
            Some(l) => (offset + l as usize).min(all.len()),
            None => all.len(),
        };
        let window = &all[offset..end];
        if !window.is_empty() {
            self.next.write_block(0, &block_from_rows(window))?;
        }
        self.next.flush()
    }
}

pub(crate) fn sort_processor(
    by: Vec<SortField>,
    desc: bool,
    offset: u64,
    limit: Option<u64>,
    workers: usize,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(SortProcessor {
        by,
        desc,
        offset,
        limit,
        shards: (0..workers.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
        next,
    })
}
