//! Block-level filter evaluation.
//!
//! [`apply_filter`] takes the working bitmap of rows still under
//! consideration and clears the bits of rows the filter rejects; it never
//! sets previously cleared bits. AND composes by sequential application, OR
//! applies each branch to a private copy of the remaining rows and unions
//! the results, NOT subtracts the inner filter's matches.
//!
//! Field-valued filters follow a fixed evaluation ladder: const-column
//! short-circuit, absent-column path (every value reads as the empty
//! string), header min/max skip, dict pre-match over the ≤256 dictionary
//! entries, and finally a typed scan over the set bits.

#![forbid(unsafe_code)]

mod any_case;
mod exact;
mod in_values;
mod len_range;
mod phrase;
mod range;
mod regexp;
mod sequence;
mod stream;
mod time;
mod values;

pub use phrase::{match_phrase, match_prefix};

use logsql_block::bitmap::get_bitmap;
use logsql_block::{Bitmap, Block};
use logsql_expr::Filter;
use logsql_result::Result;

/// Apply `filter` to `block`, clearing bits of non-matching rows in `bm`.
/// The bitmap length must equal the block row count.
pub fn apply_filter(filter: &Filter, block: &Block, bm: &mut Bitmap) -> Result<()> {
    debug_assert_eq!(bm.bits_len(), block.row_count());
    match filter {
        Filter::Noop => Ok(()),
        Filter::Phrase(f) => phrase::apply_phrase(f, block, bm),
        Filter::Prefix(f) => phrase::apply_prefix(f, block, bm),
        Filter::AnyCasePhrase(f) => any_case::apply_any_case_phrase(f, block, bm),
        Filter::AnyCasePrefix(f) => any_case::apply_any_case_prefix(f, block, bm),
        Filter::Exact(f) => exact::apply_exact(f, block, bm),
        Filter::ExactPrefix(f) => exact::apply_exact_prefix(f, block, bm),
        Filter::Sequence(f) => sequence::apply_sequence(f, block, bm),
        Filter::In(f) => in_values::apply_in(f, block, bm),
        Filter::Regexp(f) => regexp::apply_regexp(f, block, bm),
        Filter::Range(f) => range::apply_range(f, block, bm),
        Filter::StringRange(f) => range::apply_string_range(f, block, bm),
        Filter::Ipv4Range(f) => range::apply_ipv4_range(f, block, bm),
        Filter::LenRange(f) => len_range::apply_len_range(f, block, bm),
        Filter::Time(f) => time::apply_time(f, block, bm),
        Filter::Stream(f) => stream::apply_stream(f, block, bm),
        Filter::And(filters) => {
            for f in filters {
                apply_filter(f, block, bm)?;
                if bm.is_zero() {
                    break;
                }
            }
            Ok(())
        }
        Filter::Or(filters) => apply_or(filters, block, bm),
        Filter::Not(inner) => {
            // apply the inner filter only to rows that can still change the
            // result, then subtract its matches
            let mut tmp = get_bitmap(bm.bits_len());
            tmp.copy_from(bm);
            apply_filter(inner, block, &mut tmp)?;
            bm.and_not(&tmp);
            Ok(())
        }
    }
}

fn apply_or(filters: &[Filter], block: &Block, bm: &mut Bitmap) -> Result<()> {
    let mut result = get_bitmap(bm.bits_len());
    let mut tmp = get_bitmap(bm.bits_len());
    for f in filters {
        // restrict each branch to rows not yet matched by earlier branches
        tmp.copy_from(bm);
        tmp.and_not(&result);
        if tmp.is_zero() {
            // every remaining row already matched; the rest are no-ops
            break;
        }
        apply_filter(f, block, &mut tmp)?;
        result.or(&tmp);
    }
    bm.copy_from(&result);
    Ok(())
}
