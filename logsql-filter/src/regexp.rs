//! Regular-expression filter over canonical string forms.

use logsql_block::value::ValueType;
use logsql_block::{Bitmap, Block};
use logsql_expr::RegexpFilter;
use logsql_result::Result;

use crate::values::{lookup, scan_dict, scan_rendered, scan_string};

pub(crate) fn apply_regexp(f: &RegexpFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let re = &f.re;
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !re.is_match(v) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !re.is_match("") {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| re.is_match(v)),
        ValueType::Dict => scan_dict(col, bm, part, |v| re.is_match(v)),
        _ => scan_rendered(col, bm, part, |v| re.is_match(v)),
    }
}
