//! Byte-length range filter over canonical string forms.

use logsql_block::value::{ValueType, ISO8601_STRING_LEN};
use logsql_block::{Bitmap, Block};
use logsql_expr::LenRangeFilter;
use logsql_result::Result;

use crate::values::{lookup, scan_dict, scan_rendered, scan_string};

pub(crate) fn apply_len_range(f: &LenRangeFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let (min_len, max_len) = (f.min_len, f.max_len);
    if min_len > max_len {
        bm.reset_bits();
        return Ok(());
    }
    let in_range = |len: usize| {
        let len = len as u64;
        len >= min_len && len <= max_len
    };
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !in_range(v.len()) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        // absent column: every value has length zero
        if min_len > 0 {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| in_range(v.len())),
        ValueType::Dict => scan_dict(col, bm, part, |v| in_range(v.len())),
        ValueType::TimestampIso8601 => {
            // every timestamp renders to the same fixed width
            if min_len > ISO8601_STRING_LEN || max_len < ISO8601_STRING_LEN {
                bm.reset_bits();
            }
            Ok(())
        }
        _ => scan_rendered(col, bm, part, |v| in_range(v.len())),
    }
}
