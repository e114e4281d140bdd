//! Limit and offset pipes. Both count rows globally across workers with a
//! single atomic; cross-block ordering is unspecified by contract, so the
//! rows they keep are whichever arrive first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use logsql_block::BlockResult;
use logsql_result::Result;

use crate::{Cancellation, PipeProcessor};

struct LimitProcessor {
    limit: u64,
    taken: AtomicU64,
    stop: Cancellation,
    next: Arc<dyn PipeProcessor>,
}

impl PipeProcessor for LimitProcessor {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        let rows = br.row_count() as u64;
        if rows == 0 {
            return Ok(());
        }
        let start = self.taken.fetch_add(rows, Ordering::Relaxed);
        if start >= self.limit {
            self.stop.cancel();
            return Ok(());
        }
        let take = (self.limit - start).min(rows) as usize;
        if take == br.row_count() {
            self.next.write_block(worker_id, br)?;
        } else {
            let keep: Vec<usize> = (0..take).collect();
            self.next.write_block(worker_id, &br.take_rows(&keep))?;
        }
        if start + rows >= self.limit {
            self.stop.cancel();
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.next.flush()
    }
}

pub(crate) fn limit_processor(
    limit: u64,
    stop: Cancellation,
    next: Arc<dyn PipeProcessor>,
) -> Arc<dyn PipeProcessor> {
    Arc::new(LimitProcessor {
        limit,
        taken: AtomicU64::new(0),
        stop,
        next,
    })
}

struct OffsetProcessor {
    offset: u64,
    seen: AtomicU64,
    next: Arc<dyn PipeProcessor>,
}

impl PipeProcessor for OffsetProcessor {
    fn write_block(&self, worker_id: usize, br: &BlockResult) -> Result<()> {
        let rows = br.row_count() as u64;
        if rows == 0 {
            return Ok(());
        }
        let start = self.seen.fetch_add(rows, Ordering::Relaxed);
        if start + rows <= self.offset {
            return Ok(());
        }
        let skip = self.offset.saturating_sub(start) as usize;
        if skip == 0 {
            return self.next.write_block(worker_id, br);
        }
        let keep: Vec<usize> = (skip..br.row_count()).collect();
        self.next.write_block(worker_id, &br.take_rows(&keep))
    }

    fn flush(&self) -> Result<()> {
        self.next.flush()
    }
}

pub(crate) fn offset_processor(offset: u64, next: Arc<dyn PipeProcessor>) -> Arc<dyn PipeProcessor> {
    Arc::new(OffsetProcessor {
        offset,
        seen: AtomicU64::new(0),
        next,
    })
}
