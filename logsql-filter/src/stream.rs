//! Stream label-set filter: a block either matches as a whole or not at
//! all, since its rows share one stream.

use logsql_block::{Bitmap, Block};
use logsql_expr::StreamFilter;
use logsql_result::Result;

pub(crate) fn apply_stream(f: &StreamFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    if f.or_groups.is_empty() {
        return Ok(());
    }
    let matched = f.or_groups.iter().any(|group| {
        group.iter().all(|tf| {
            let value = block
                .stream_labels
                .iter()
                .find(|l| l.name == tf.tag)
                .map(|l| l.value.as_str())
                .unwrap_or("");
            tf.matches(value)
        })
    });
    if !matched {
        bm.reset_bits();
    }
    Ok(())
}
