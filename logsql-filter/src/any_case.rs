//! ASCII-case-insensitive phrase and prefix filters.

use logsql_block::pool::get_string;
use logsql_block::value::ValueType;
use logsql_block::{Bitmap, Block};
use logsql_expr::{AnyCasePhraseFilter, AnyCasePrefixFilter};
use logsql_result::Result;

use crate::phrase::{match_phrase, match_prefix, match_uint_by_exact_string};
use crate::values::{lookup, scan_dict, scan_rendered, scan_string};

fn has_ascii_uppercase(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_uppercase())
}

/// Run `f` over the ASCII-lowercased form of `s`, avoiding the copy when
/// `s` is already lowercase.
fn with_ascii_lowercase<R>(s: &str, f: impl FnOnce(&str) -> R) -> R {
    if !has_ascii_uppercase(s) {
        return f(s);
    }
    let mut buf = get_string();
    for c in s.chars() {
        buf.push(c.to_ascii_lowercase());
    }
    f(&buf)
}

/// `phrase_lower` must already be ASCII-lowercased.
pub(crate) fn match_any_case_phrase(s: &str, phrase_lower: &str) -> bool {
    if phrase_lower.is_empty() {
        return s.is_empty();
    }
    if phrase_lower.len() > s.len() {
        return false;
    }
    with_ascii_lowercase(s, |lower| match_phrase(lower, phrase_lower))
}

pub(crate) fn match_any_case_prefix(s: &str, prefix_lower: &str) -> bool {
    if prefix_lower.is_empty() {
        return !s.is_empty();
    }
    if prefix_lower.len() > s.len() {
        return false;
    }
    with_ascii_lowercase(s, |lower| match_prefix(lower, prefix_lower))
}

pub(crate) fn apply_any_case_phrase(
    f: &AnyCasePhraseFilter,
    block: &Block,
    bm: &mut Bitmap,
) -> Result<()> {
    let phrase = f.phrase_lowercase();
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_any_case_phrase(v, phrase) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !phrase.is_empty() {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_any_case_phrase(v, phrase)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_any_case_phrase(v, phrase)),
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            match_uint_by_exact_string(col, bm, part, phrase)
        }
        ValueType::TimestampIso8601 => {
            // timestamp renderings are upper-case
            let upper = f.phrase.to_ascii_uppercase();
            scan_rendered(col, bm, part, |v| match_phrase(v, &upper))
        }
        _ => scan_rendered(col, bm, part, |v| match_phrase(v, phrase)),
    }
}

pub(crate) fn apply_any_case_prefix(
    f: &AnyCasePrefixFilter,
    block: &Block,
    bm: &mut Bitmap,
) -> Result<()> {
    let prefix = f.prefix_lowercase();
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_any_case_prefix(v, prefix) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        bm.reset_bits();
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_any_case_prefix(v, prefix)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_any_case_prefix(v, prefix)),
        ValueType::TimestampIso8601 => {
            let upper = f.prefix.to_ascii_uppercase();
            scan_rendered(col, bm, part, |v| match_prefix(v, &upper))
        }
        _ => scan_rendered(col, bm, part, |v| match_prefix(v, prefix)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_matching() {
        assert!(match_any_case_phrase("A FOO", "foo"));
        assert!(match_any_case_phrase("foo bar", "foo"));
        assert!(!match_any_case_phrase("fooBaR", "foo"));
        assert!(match_any_case_phrase("", ""));
        assert!(!match_any_case_phrase("x", ""));
        assert!(match_any_case_prefix("FooBar baz", "foob"));
        assert!(!match_any_case_prefix("", ""));
    }
}
