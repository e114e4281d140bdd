//! Phrase and prefix matching at token boundaries.

use logsql_block::value::{try_parse_uint64, ValueType};
use logsql_block::{Bitmap, Block, Column};
use logsql_expr::{PhraseFilter, PrefixFilter};
use logsql_result::Result;

use crate::values::{lookup, scan_dict, scan_numeric, scan_rendered, scan_string};

#[inline]
pub(crate) fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-sensitive phrase match: the phrase must occur in `s` delimited by
/// non-token characters (or the string edges). The empty phrase matches
/// only the empty string.
pub fn match_phrase(s: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return s.is_empty();
    }
    phrase_pos(s, phrase).is_some()
}

/// Position of the first boundary-delimited occurrence of `phrase` in `s`.
pub(crate) fn phrase_pos(s: &str, phrase: &str) -> Option<usize> {
    if phrase.is_empty() {
        return Some(0);
    }
    let first = phrase.chars().next()?;
    let last = phrase.chars().next_back()?;
    for (pos, _) in s.match_indices(phrase) {
        if is_token_char(first) {
            if let Some(prev) = s[..pos].chars().next_back() {
                if is_token_char(prev) {
                    continue;
                }
            }
        }
        if is_token_char(last) {
            if let Some(next) = s[pos + phrase.len()..].chars().next() {
                if is_token_char(next) {
                    continue;
                }
            }
        }
        return Some(pos);
    }
    None
}

/// Prefix match: the prefix must start at a token boundary; the tail may
/// continue into the token. The empty prefix matches any non-empty string.
pub fn match_prefix(s: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return !s.is_empty();
    }
    let first = match prefix.chars().next() {
        Some(c) => c,
        None => return false,
    };
    for (pos, _) in s.match_indices(prefix) {
        if is_token_char(first) {
            if let Some(prev) = s[..pos].chars().next_back() {
                if is_token_char(prev) {
                    continue;
                }
            }
        }
        return true;
    }
    false
}

pub(crate) fn apply_phrase(f: &PhraseFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let phrase = &f.phrase;
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_phrase(v, phrase) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        // absent column: every row reads as the empty string
        if !phrase.is_empty() {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_phrase(v, phrase)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_phrase(v, phrase)),
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            match_uint_by_exact_string(col, bm, part, phrase)
        }
        _ => scan_rendered(col, bm, part, |v| match_phrase(v, phrase)),
    }
}

pub(crate) fn apply_prefix(f: &PrefixFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let prefix = &f.prefix;
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_prefix(v, prefix) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        // a prefix never matches the empty string
        bm.reset_bits();
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_prefix(v, prefix)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_prefix(v, prefix)),
        _ => scan_rendered(col, bm, part, |v| match_prefix(v, prefix)),
    }
}

/// Exact decimal match against an unsigned column: the needle must be the
/// canonical rendering of a value within the header bounds.
pub(crate) fn match_uint_by_exact_string(
    col: &Column,
    bm: &mut Bitmap,
    part: &str,
    s: &str,
) -> Result<()> {
    let n = match try_parse_uint64(s).filter(|n| n.to_string() == s) {
        Some(n) => n,
        None => {
            bm.reset_bits();
            return Ok(());
        }
    };
    if n < col.header.min_value || n > col.header.max_value {
        bm.reset_bits();
        return Ok(());
    }
    scan_numeric(col, bm, part, |v| v == n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_boundaries() {
        assert!(match_phrase("error: disk full", "error"));
        assert!(match_phrase("error: disk full", "disk full"));
        assert!(!match_phrase("errors", "error"));
        assert!(!match_phrase("disk fuller", "disk full"));
        assert!(match_phrase("a_b c", "a_b"));
        assert!(!match_phrase("xa_b", "a_b"));
        assert!(match_phrase("foo 127.0.0.1 bar", "127.0.0.1"));
        assert!(match_phrase("", ""));
        assert!(!match_phrase("x", ""));
        // non-token needles match anywhere
        assert!(match_phrase("a=b", "="));
    }

    #[test]
    fn prefix_boundaries() {
        assert!(match_prefix("warning: foo", "warn"));
        assert!(!match_prefix("awarning", "warn"));
        assert!(match_prefix("foo warning", "warn"));
        assert!(match_prefix("x", ""));
        assert!(!match_prefix("", ""));
        assert!(!match_prefix("", "a"));
    }
}
