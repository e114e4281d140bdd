//! Per-row timestamp filter on the `_time` field.
//!
//! The block source prunes whole parts by time; the evaluator only walks
//! rows when the filter interval does not strictly contain the block.

use logsql_block::{Bitmap, Block};
use logsql_expr::TimeFilter;
use logsql_result::Result;

pub(crate) fn apply_time(f: &TimeFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let (min, max) = (f.min_timestamp, f.max_timestamp);
    if min > max {
        bm.reset_bits();
        return Ok(());
    }
    let timestamps = &block.timestamps;
    let (Some(&block_min), Some(&block_max)) = (timestamps.first(), timestamps.last()) else {
        bm.reset_bits();
        return Ok(());
    };
    if block_min >= min && block_max <= max {
        return Ok(());
    }
    if block_min > max || block_max < min {
        bm.reset_bits();
        return Ok(());
    }
    bm.for_each_set_bit(|row| {
        let ts = timestamps[row];
        ts >= min && ts <= max
    });
    Ok(())
}
