//! Membership filter over a literal value set.
//!
//! Typed projections of the set (parsed integers, float bit patterns, ipv4
//! addresses, timestamps) are computed once per query via the filter's
//! `OnceLock` slots, so repeated blocks and concurrent workers share them.

use logsql_block::value::{
    try_parse_ipv4, try_parse_timestamp_iso8601, try_parse_uint64, ValueType,
};
use logsql_block::{Bitmap, Block};
use logsql_expr::InFilter;
use logsql_result::Result;
use rustc_hash::FxHashSet;

use crate::values::{lookup, scan_dict, scan_numeric, scan_string};

fn string_set(f: &InFilter) -> &FxHashSet<String> {
    f.string_set
        .get_or_init(|| f.values.iter().cloned().collect())
}

fn uint_set(f: &InFilter) -> &FxHashSet<u64> {
    f.uint_set.get_or_init(|| {
        f.values
            .iter()
            .filter_map(|v| try_parse_uint64(v).filter(|n| n.to_string() == *v))
            .collect()
    })
}

fn float_set(f: &InFilter) -> &FxHashSet<u64> {
    f.float_set.get_or_init(|| {
        f.values
            .iter()
            .filter_map(|v| v.parse::<f64>().ok().map(f64::to_bits))
            .collect()
    })
}

fn ipv4_set(f: &InFilter) -> &FxHashSet<u32> {
    f.ipv4_set.get_or_init(|| {
        f.values
            .iter()
            .filter_map(|v| try_parse_ipv4(v))
            .collect()
    })
}

fn timestamp_set(f: &InFilter) -> &FxHashSet<i64> {
    f.timestamp_set.get_or_init(|| {
        f.values
            .iter()
            .filter_map(|v| try_parse_timestamp_iso8601(v))
            .collect()
    })
}

pub(crate) fn apply_in(f: &InFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    if f.values.is_empty() {
        bm.reset_bits();
        return Ok(());
    }
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !string_set(f).contains(v) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !string_set(f).contains("") {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => {
            let set = string_set(f);
            scan_string(col, bm, part, |v| set.contains(v))
        }
        ValueType::Dict => {
            let set = string_set(f);
            scan_dict(col, bm, part, |v| set.contains(v))
        }
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            let set = uint_set(f);
            if set.is_empty() {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| set.contains(&v))
        }
        ValueType::Float64 => {
            let set = float_set(f);
            if set.is_empty() {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| set.contains(&v))
        }
        ValueType::Ipv4 => {
            let set = ipv4_set(f);
            if set.is_empty() {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| set.contains(&(v as u32)))
        }
        ValueType::TimestampIso8601 => {
            let set = timestamp_set(f);
            if set.is_empty() {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| set.contains(&(v as i64)))
        }
    }
}
