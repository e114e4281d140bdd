//! Pipe-stage execution.
//!
//! Each pipe builds a processor; processors are chained right-to-left and
//! terminated by a collector that hands finished blocks to the caller's
//! sink. `write_block` may be called concurrently by workers — processors
//! keep one shard per worker and merge deterministically in `flush`.

#![forbid(unsafe_code)]

mod aggregate;
mod field_ops;
mod limit;
mod rows;
mod sort;
mod stats;
mod uniq;

pub use aggregate::Accumulator;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use logsql_block::BlockResult;
use logsql_expr::Pipe;
use logsql_result::Result;

/// Shared stop token. The `limit` pipe trips it once satisfied so the
/// block source can stop early; external callers may trip it to cancel.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One stage of the pipe chain.
pub trait PipeProcessor: Send + Sync {
    /// Feed one block of projected rows. Workers call this concurrently;
    /// distinct `worker_id`s touch distinct shards.
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()>;

    /// Merge shards, emit any accumulated output downstream and flush the
    /// rest of the chain. Called once, after all workers have finished.
    fn flush(&self) -> Result<()>;
}

/// Callback receiving finished blocks at the end of the chain, along with
/// the id of the worker that produced them.
pub type Sink = Box<dyn FnMut(usize, &BlockResult) + Send>;

struct Collector {
    sink: Mutex<Sink>,
}

impl PipeProcessor for Collector {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        if br.row_count() == 0 {
            return Ok(());
        }
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| logsql_result::Error::Internal("poisoned sink".into()))?;
        sink(worker_id, br);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the processor chain for `pipes`, terminated by `sink`.
pub fn build_pipeline(
    pipes: &[Pipe],
    workers: usize,
    stop: &Cancellation,
    sink: Sink,
) -> Arc<dyn PipeProcessor> {
    let mut next: Arc<dyn PipeProcessor> = Arc::new(Collector {
        sink: Mutex::new(sink),
    });
    for pipe in pipes.iter().rev() {
        next = match pipe {
            Pipe::Fields { fields } => field_ops::fields_processor(fields.clone(), next),
            Pipe::Copy { pairs } => field_ops::copy_processor(pairs.clone(), next),
            Pipe::Rename { pairs } => field_ops::rename_processor(pairs.clone(), next),
            Pipe::Delete { fields } => field_ops::delete_processor(fields.clone(), next),
            Pipe::Limit { limit } => limit::limit_processor(*limit, stop.clone(), next),
            Pipe::Offset { offset } => limit::offset_processor(*offset, next),
            Pipe::Sort {
                by,
                desc,
                offset,
                limit,
            } => sort::sort_processor(by.clone(), *desc, *offset, *limit, workers, next),
            Pipe::Uniq { by, limit } => uniq::uniq_processor(by.clone(), *limit, workers, next),
            Pipe::Stats { by, funcs } => {
                stats::stats_processor(by.clone(), funcs.clone(), workers, next)
            }
        };
    }
    next
}
