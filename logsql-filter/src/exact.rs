//! Whole-value equality and raw-prefix filters.

use logsql_block::value::{
    try_parse_ipv4, try_parse_timestamp_iso8601, try_parse_uint64, ValueType,
};
use logsql_block::{Bitmap, Block};
use logsql_expr::{ExactFilter, ExactPrefixFilter};
use logsql_result::Result;

use crate::values::{lookup, scan_dict, scan_numeric, scan_rendered, scan_string};

pub(crate) fn apply_exact(f: &ExactFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let value = f.value.as_str();
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if v != value {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !value.is_empty() {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    let header = &col.header;
    match header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| v == value),
        ValueType::Dict => scan_dict(col, bm, part, |v| v == value),
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            match try_parse_uint64(value).filter(|n| n.to_string() == value) {
                Some(n) if n >= header.min_value && n <= header.max_value => {
                    scan_numeric(col, bm, part, |v| v == n)
                }
                _ => {
                    bm.reset_bits();
                    Ok(())
                }
            }
        }
        ValueType::Float64 => match value.parse::<f64>() {
            Ok(needle) => {
                let min = f64::from_bits(header.min_value);
                let max = f64::from_bits(header.max_value);
                if needle < min || needle > max {
                    bm.reset_bits();
                    return Ok(());
                }
                scan_numeric(col, bm, part, |v| f64::from_bits(v) == needle)
            }
            Err(_) => {
                bm.reset_bits();
                Ok(())
            }
        },
        ValueType::Ipv4 => match try_parse_ipv4(value) {
            Some(addr) => {
                let addr = u64::from(addr);
                if addr < header.min_value || addr > header.max_value {
                    bm.reset_bits();
                    return Ok(());
                }
                scan_numeric(col, bm, part, |v| v == addr)
            }
            None => {
                bm.reset_bits();
                Ok(())
            }
        },
        ValueType::TimestampIso8601 => match try_parse_timestamp_iso8601(value) {
            Some(ts) => scan_numeric(col, bm, part, |v| v as i64 == ts),
            None => {
                bm.reset_bits();
                Ok(())
            }
        },
    }
}

pub(crate) fn apply_exact_prefix(
    f: &ExactPrefixFilter,
    block: &Block,
    bm: &mut Bitmap,
) -> Result<()> {
    let prefix = &f.prefix;
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !v.starts_with(prefix.as_str()) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        // the empty value only carries the empty prefix
        if !prefix.is_empty() {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| v.starts_with(prefix.as_str())),
        ValueType::Dict => scan_dict(col, bm, part, |v| v.starts_with(prefix.as_str())),
        _ => scan_rendered(col, bm, part, |v| v.starts_with(prefix.as_str())),
    }
}
