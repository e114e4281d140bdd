//! LogsQL query engine facade.
//!
//! Wires the parser, the block-level filter evaluator and the pipe chain
//! together: [`run_query`] pulls typed blocks from a [`BlockSource`], fans
//! them out to worker threads, filters each block down to a bitmap of
//! surviving rows, projects the needed columns and streams the projection
//! through the query's pipes.
//!
//! The AST is immutable after parsing and shared by all workers; each
//! worker owns its bitmap pool and writes only to its own pipe shards.

#![forbid(unsafe_code)]

mod source;

pub use logsql_block::{Block, BlockResult, ColumnHeader, Field, ResultColumn, TenantId, ValueType};
pub use logsql_expr::{Filter, Pipe, Query};
pub use logsql_filter::apply_filter;
pub use logsql_parser::{parse_query, parse_query_at};
pub use logsql_pipe::Cancellation;
pub use logsql_result::{Error as QueryError, Result as QueryResult};
pub use source::{BlockSource, MemoryBlockSource};

use std::sync::{Arc, Mutex};

use logsql_block::bitmap::get_bitmap;
use logsql_block::value::push_timestamp_iso8601;
use logsql_block::Bitmap;
use logsql_expr::quoting::quote_string;
use logsql_expr::FieldsSet;
use logsql_pipe::{build_pipeline, PipeProcessor};
use logsql_result::{Error, Result};
use tracing::{debug, trace};

/// Run `query` over every block the source yields for the given tenants.
///
/// `workers` threads scan blocks concurrently; block order across workers
/// is unspecified, and order-sensitive pipes (sort, stats, uniq) merge
/// their per-worker state deterministically. `on_block` receives the final
/// projected blocks. Cancelling `cancel` aborts between blocks and
/// surfaces as [`Error::Cancelled`].
pub fn run_query<S: BlockSource>(
    tenants: &[TenantId],
    query: &Query,
    source: S,
    workers: usize,
    cancel: &Cancellation,
    on_block: impl FnMut(usize, &BlockResult) + Send + 'static,
) -> Result<()> {
    let workers = workers.max(1);
    let (needed, unneeded) = query.needed_columns();
    debug!(%query, workers, ?needed, ?unneeded, "running query");
    let mut needed_set = FieldsSet::new();
    needed_set.add_all(&needed);
    let mut unneeded_set = FieldsSet::new();
    unneeded_set.add_all(&unneeded);
    // synthesized columns are materialized only when named outright; a bare
    // `*` must not conjure them into every projection
    let projection = Projection {
        want_time: needed.iter().any(|n| n == "_time") && !unneeded_set.contains("_time"),
        want_stream: needed.iter().any(|n| n == "_stream") && !unneeded_set.contains("_stream"),
    };

    let stop = Cancellation::new();
    let pipeline = build_pipeline(&query.pipes, workers, &stop, Box::new(on_block));
    let source = Mutex::new(source);
    let first_err: Mutex<Option<Error>> = Mutex::new(None);

    std::thread::scope(|scope| {
        for worker_id in 0..workers {
            let pipeline = Arc::clone(&pipeline);
            let source = &source;
            let first_err = &first_err;
            let stop = &stop;
            let needed_set = &needed_set;
            let unneeded_set = &unneeded_set;
            scope.spawn(move || loop {
                if cancel.is_cancelled() || stop.is_cancelled() {
                    return;
                }
                let block = match source.lock() {
                    Ok(mut source) => source.next_block(),
                    Err(_) => return,
                };
                let Some(block) = block else { return };
                if !tenants.is_empty() && !tenants.contains(&block.tenant) {
                    continue;
                }
                trace!(part = %block.part, rows = block.row_count(), worker_id, "scanning block");
                if let Err(e) = scan_block(
                    query,
                    &block,
                    worker_id,
                    pipeline.as_ref(),
                    needed_set,
                    unneeded_set,
                    projection,
                ) {
                    if let Ok(mut slot) = first_err.lock() {
                        slot.get_or_insert(e);
                    }
                    stop.cancel();
                    return;
                }
            });
        }
    });

    if let Ok(mut slot) = first_err.lock() {
        if let Some(e) = slot.take() {
            return Err(e);
        }
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    pipeline.flush()
}

/// Which synthesized columns the query asks for by name.
#[derive(Clone, Copy)]
struct Projection {
    want_time: bool,
    want_stream: bool,
}

fn scan_block(
    query: &Query,
    block: &Block,
    worker_id: usize,
    pipeline: &dyn PipeProcessor,
    needed: &FieldsSet,
    unneeded: &FieldsSet,
    projection: Projection,
) -> Result<()> {
    if block.row_count() == 0 {
        return Ok(());
    }
    let mut bm = get_bitmap(block.row_count());
    bm.set_bits();
    apply_filter(&query.filter, block, &mut bm)?;
    if bm.is_zero() {
        return Ok(());
    }
    let br = project_block(block, &bm, needed, unneeded, projection)?;
    pipeline.write_block(worker_id, &br)
}

/// Materialize the surviving rows of `block` into canonical string
/// columns, restricted to the columns the query needs. `_time` and
/// `_stream` are synthesized on demand.
fn project_block(
    block: &Block,
    bm: &Bitmap,
    needed: &FieldsSet,
    unneeded: &FieldsSet,
    projection: Projection,
) -> Result<BlockResult> {
    let mut rows = Vec::with_capacity(bm.ones_count());
    bm.each_set_bit(|i| rows.push(i));
    let timestamps: Vec<i64> = rows.iter().map(|&i| block.timestamps[i]).collect();

    let want = |name: &str| needed.contains(name) && !unneeded.contains(name);
    let mut columns = Vec::new();
    if projection.want_time {
        let values = timestamps
            .iter()
            .map(|&ts| {
                let mut s = String::new();
                push_timestamp_iso8601(&mut s, ts);
                s
            })
            .collect();
        columns.push(ResultColumn {
            name: "_time".to_string(),
            values,
        });
    }
    if projection.want_stream && !block.stream_labels.is_empty() {
        let value = stream_string(&block.stream_labels);
        columns.push(ResultColumn {
            name: "_stream".to_string(),
            values: vec![value; rows.len()],
        });
    }
    for c in &block.const_columns {
        if want(&c.name) {
            columns.push(ResultColumn {
                name: c.name.clone(),
                values: vec![c.value.clone(); rows.len()],
            });
        }
    }
    for col in &block.columns {
        if !want(col.name()) {
            continue;
        }
        let mut values = Vec::with_capacity(rows.len());
        for &row in &rows {
            values.push(col.render(row, &block.part)?);
        }
        columns.push(ResultColumn {
            name: col.name().to_string(),
            values,
        });
    }
    Ok(BlockResult {
        timestamps,
        columns,
    })
}

fn stream_string(labels: &[Field]) -> String {
    let mut out = String::from("{");
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&label.name);
        out.push('=');
        out.push_str(&quote_string(&label.value));
    }
    out.push('}');
    out
}
