//! Block sources feeding the query engine.

use std::collections::VecDeque;
use std::sync::Arc;

use logsql_block::Block;

/// Yields the candidate blocks for a query. Part-level time and stream
/// pruning is the source's responsibility; the evaluator re-checks
/// per-row timestamps only when a block is not fully contained in the
/// query interval.
pub trait BlockSource: Send {
    fn next_block(&mut self) -> Option<Arc<Block>>;
}

/// In-memory source over a fixed list of blocks.
#[derive(Default)]
pub struct MemoryBlockSource {
    blocks: VecDeque<Arc<Block>>,
}

impl MemoryBlockSource {
    pub fn new(blocks: Vec<Block>) -> Self {
        MemoryBlockSource {
            blocks: blocks.into_iter().map(Arc::new).collect(),
        }
    }
}

impl BlockSource for MemoryBlockSource {
    fn next_block(&mut self) -> Option<Arc<Block>> {
        self.blocks.pop_front()
    }
}
