//! Shared scan helpers: dict pre-matching and typed per-row scans.

use logsql_block::pool::{get_buf, get_string};
use logsql_block::value::{push_ipv4, push_timestamp_iso8601, ValueType};
use logsql_block::{Bitmap, Block, Column};
use logsql_result::Result;

/// Clear bits of rows whose dict index is not in `set`.
pub(crate) fn match_encoded_dict(
    col: &Column,
    bm: &mut Bitmap,
    set: &[u8],
    part: &str,
) -> Result<()> {
    if set.is_empty() {
        bm.reset_bits();
        return Ok(());
    }
    bm.try_for_each_set_bit(|row| {
        let idx = col.dict_index(row, part)?;
        Ok(set.contains(&idx))
    })
}

/// Evaluate `pred` over the dictionary entries once, then filter rows by
/// the surviving index set.
pub(crate) fn scan_dict<F: FnMut(&str) -> bool>(
    col: &Column,
    bm: &mut Bitmap,
    part: &str,
    mut pred: F,
) -> Result<()> {
    let mut set = get_buf();
    for (i, v) in col.header.values_dict.iter().enumerate() {
        if pred(v) {
            set.push(i as u8);
        }
    }
    match_encoded_dict(col, bm, &set, part)
}

/// Scan raw string cells.
pub(crate) fn scan_string<F: FnMut(&str) -> bool>(
    col: &Column,
    bm: &mut Bitmap,
    part: &str,
    mut pred: F,
) -> Result<()> {
    bm.try_for_each_set_bit(|row| Ok(pred(col.str_cell(row, part)?)))
}

/// Scan the numeric coding of fixed-width cells.
pub(crate) fn scan_numeric<F: FnMut(u64) -> bool>(
    col: &Column,
    bm: &mut Bitmap,
    part: &str,
    mut pred: F,
) -> Result<()> {
    bm.try_for_each_set_bit(|row| Ok(pred(col.decode_numeric(row, part)?)))
}

/// Scan fixed-width cells rendered to their canonical string form, reusing
/// one pooled buffer for the whole pass.
pub(crate) fn scan_rendered<F: FnMut(&str) -> bool>(
    col: &Column,
    bm: &mut Bitmap,
    part: &str,
    mut pred: F,
) -> Result<()> {
    use std::fmt::Write;
    let value_type = col.header.value_type;
    let mut buf = get_string();
    bm.try_for_each_set_bit(|row| {
        let n = col.decode_numeric(row, part)?;
        buf.clear();
        match value_type {
            ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
                let _ = write!(buf, "{n}");
            }
            ValueType::Float64 => {
                let _ = write!(buf, "{}", f64::from_bits(n));
            }
            ValueType::Ipv4 => push_ipv4(&mut buf, n as u32),
            ValueType::TimestampIso8601 => push_timestamp_iso8601(&mut buf, n as i64),
            ValueType::String | ValueType::Dict => {
                return Err(logsql_result::Error::Internal(format!(
                    "column {:?} is not a fixed-width column",
                    col.header.name
                )));
            }
        }
        Ok(pred(&buf))
    })
}

/// Column lookup honoring the `_msg` alias for the empty field name.
pub(crate) fn lookup<'a>(block: &'a Block, field_name: &str) -> (Option<&'a str>, Option<&'a Column>) {
    let field = logsql_expr::canonical_column_name(field_name);
    (block.const_column_value(field), block.column(field))
}
