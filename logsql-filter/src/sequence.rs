//! Ordered phrase-sequence filter.

use logsql_block::value::ValueType;
use logsql_block::{Bitmap, Block};
use logsql_expr::SequenceFilter;
use logsql_result::Result;

use crate::phrase::phrase_pos;
use crate::values::{lookup, scan_dict, scan_rendered, scan_string};

/// The listed phrases must occur in order, each starting after the end of
/// the previous match (no overlap), each at a token boundary.
pub(crate) fn match_sequence(s: &str, phrases: &[String]) -> bool {
    let mut rest = s;
    for phrase in phrases {
        match phrase_pos(rest, phrase) {
            Some(pos) => rest = &rest[pos + phrase.len()..],
            None => return false,
        }
    }
    true
}

pub(crate) fn apply_sequence(f: &SequenceFilter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    let phrases = &f.phrases;
    if phrases.is_empty() {
        return Ok(());
    }
    let (const_value, col) = lookup(block, &f.field_name);
    if let Some(v) = const_value {
        if !match_sequence(v, phrases) {
            bm.reset_bits();
        }
        return Ok(());
    }
    let Some(col) = col else {
        if !match_sequence("", phrases) {
            bm.reset_bits();
        }
        return Ok(());
    };
    let part = &block.part;
    match col.header.value_type {
        ValueType::String => scan_string(col, bm, part, |v| match_sequence(v, phrases)),
        ValueType::Dict => scan_dict(col, bm, part, |v| match_sequence(v, phrases)),
        _ => scan_rendered(col, bm, part, |v| match_sequence(v, phrases)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(phrases: &[&str]) -> Vec<String> {
        phrases.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ordered_occurrence() {
        assert!(match_sequence("GET /index.html 200", &seq(&["GET", "200"])));
        assert!(!match_sequence("200 GET", &seq(&["GET", "200"])));
        assert!(match_sequence("a b a", &seq(&["a", "a"])));
        // occurrences may not overlap
        assert!(!match_sequence("aba", &seq(&["aba", "aba"])));
        assert!(match_sequence("anything", &[]));
    }
}
