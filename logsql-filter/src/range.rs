//! Numeric, lexicographic and ipv4 range filters.
//!
//! The numeric `range` filter clears all bits on ipv4 and iso8601 columns;
//! `string_range` instead renders those values and compares
//! lexicographically. The asymmetry is deliberate and covered by tests.

use logsql_block::value::{try_parse_float, try_parse_ipv4, ValueType};
use logsql_block::{Bitmap, Block};
use logsql_expr::{Ipv4RangeFilter, RangeFilter, StringRangeFilter};
use logsql_result::Result;

use crate::values::{lookup, scan_dict, scan_numeric, scan_rendered, scan_string};

fn match_range(s: &str, min: f64, max: f64) -> bool {
    match try_parse_float(s) {
        Some(f) => f >= min && f <= max,
        None => false,
    }
}

/// Integer clamp of a float interval: `ceil(min)` and `floor(max)` clamped
/// to the u64 domain.
fn to_uint64_range(min: f64, max: f64) -> (u64, u64) {
    (to_uint64_clamp(min.ceil()), to_uint64_clamp(max.floor()))
}

fn to_uint64_clamp(f: f64) -> u64 {
    if f < 0.0 {
        return 0;
    }
    if f >= u64::MAX as f64 {
        return u64::MAX;
    }
    f as u64
}

pub(crate) fn apply_range(f: &RangeFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let (min, max) = (f.min_value, f.max_value);
    if min > max {
        bm.reset_bits();
        return Ok(());
    }
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_range(v, min, max) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        bm.reset_bits();
        return Ok(());
    };
    let part = &block.part;
    let header = &col.header;
    match header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_range(v, min, max)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_range(v, min, max)),
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            let (min_u, max_u) = to_uint64_range(min, max);
            if max < 0.0 || min_u > header.max_value || max_u < header.min_value {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| v >= min_u && v <= max_u)
        }
        ValueType::Float64 => {
            if min > f64::from_bits(header.max_value) || max < f64::from_bits(header.min_value) {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| {
                let f = f64::from_bits(v);
                f >= min && f <= max
            })
        }
        ValueType::Ipv4 | ValueType::TimestampIso8601 => {
            bm.reset_bits();
            Ok(())
        }
    }
}

fn match_string_range(s: &str, min: &str, max: &str) -> bool {
    s >= min && s < max
}

pub(crate) fn apply_string_range(
    f: &StringRangeFilter,
    block: &Block,
    bm: &mut Bitmap,
) -> Result<()> {
    let (min, max) = (f.min_value.as_str(), f.max_value.as_str());
    if min > max {
        bm.reset_bits();
        return Ok(());
    }
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_string_range(v, min, max) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !match_string_range("", min, max) {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_string_range(v, min, max)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_string_range(v, min, max)),
        ValueType::Float64 => {
            // float renderings start with a digit, '-' or the infinities
            if min > "9" || max < "+" {
                bm.reset_bits();
                return Ok(());
            }
            scan_rendered(col, bm, part, |v| match_string_range(v, min, max))
        }
        _ => {
            // decimal, dotted-quad and timestamp renderings start with a digit
            if min > "9" || max < "0" {
                bm.reset_bits();
                return Ok(());
            }
            scan_rendered(col, bm, part, |v| match_string_range(v, min, max))
        }
    }
}

pub(crate) fn apply_ipv4_range(f: &Ipv4RangeFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let (min, max) = (f.min_value, f.max_value);
    if min > max {
        bm.reset_bits();
        return Ok(());
    }
    let matches = |s: &str| try_parse_ipv4(s).is_some_and(|addr| addr >= min && addr <= max);
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !matches(v) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        bm.reset_bits();
        return Ok(());
    };
    let part = &block.part;
    let header = &col.header;
    match header.value_type {
        ValueType::String => scan_string(col, bm, part, matches),
        ValueType::Dict => scan_dict(col, bm, part, matches),
        ValueType::Ipv4 => {
            if u64::from(min) > header.max_value || u64::from(max) < header.min_value {
                bm.reset_bits();
                return Ok(());
            }
            scan_numeric(col, bm, part, |v| {
                let addr = v as u32;
                addr >= min && addr <= max
            })
        }
        _ => {
            // integers, floats and timestamps never render as addresses
            bm.reset_bits();
            Ok(())
        }
    }
}
