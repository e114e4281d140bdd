//! Recursive-descent parser for LogsQL.
//!
//! Precedence: OR < AND < NOT < atom, with AND implicit between juxtaposed
//! atoms. Keywords are case-insensitive and never match quoted tokens.
//! Adjacent tokens with no whitespace between them merge into compound
//! phrases using their raw source text.

use logsql_expr::{
    AnyCasePhraseFilter, AnyCasePrefixFilter, ByStatsField, ExactFilter, ExactPrefixFilter,
    Filter, InFilter, Ipv4RangeFilter, LenRangeFilter, PhraseFilter, Pipe, PrefixFilter, Query,
    RangeFilter, RegexpFilter, SequenceFilter, SortField, StatsFunc, StatsFuncExpr, StreamFilter,
    StreamTagFilter, StreamTagOp, StringRangeFilter, TimeFilter,
};
use logsql_result::{Error, Result};
use regex::Regex;

use crate::datetime::parse_timestamp_span;
use crate::lexer::Lexer;
use crate::number::{parse_duration_ns, parse_float_ext, parse_ipv4, parse_uint};

const FUNC_KEYWORDS: &[&str] = &[
    "exact",
    "i",
    "in",
    "ipv4_range",
    "len_range",
    "range",
    "re",
    "seq",
    "string_range",
];

/// Parse a query, anchoring `now` at the current wall-clock time.
pub fn parse_query(s: &str) -> Result<Query> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    parse_query_at(s, now)
}

/// Parse a query with an explicit evaluation timestamp for `now` and
/// relative durations.
pub fn parse_query_at(s: &str, current_timestamp: i64) -> Result<Query> {
    let mut lex = Lexer::new(s, current_timestamp);
    lex.next_token()?;
    if lex.at_end() {
        return Err(lex.error("missing query"));
    }
    let filter = parse_or_filter(&mut lex, "")?;
    let mut pipes = Vec::new();
    if lex.is_keyword("|") {
        pipes = parse_pipes(&mut lex)?;
    }
    if !lex.at_end() {
        return Err(lex.error(format!("unexpected token {:?} after query", lex.token)));
    }
    Ok(Query { filter, pipes })
}

fn parse_or_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let mut filters = Vec::new();
    loop {
        filters.push(parse_and_filter(lex, field_name)?);
        if lex.is_keyword("or") {
            lex.next_token()?;
        } else {
            break;
        }
    }
    Ok(if filters.len() == 1 {
        filters.pop().unwrap_or(Filter::Noop)
    } else {
        Filter::Or(filters)
    })
}

fn parse_and_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let mut filters = Vec::new();
    loop {
        filters.push(parse_generic_filter(lex, field_name)?);
        if lex.at_end() || lex.is_any_keyword(&["or", ")", "|"]) {
            break;
        }
        if lex.is_keyword("and") {
            lex.next_token()?;
        }
    }
    Ok(if filters.len() == 1 {
        filters.pop().unwrap_or(Filter::Noop)
    } else {
        Filter::And(filters)
    })
}

fn parse_generic_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    if lex.at_end() {
        return Err(lex.error("missing filter"));
    }
    if lex.is_keyword(":") {
        lex.next_token()?;
        if lex.at_end() {
            return Err(lex.error("missing filter after ':'"));
        }
        return parse_generic_filter(lex, field_name);
    }
    if lex.is_keyword("*") {
        lex.next_token()?;
        return Ok(Filter::Prefix(PrefixFilter {
            field_name: field_name.to_string(),
            prefix: String::new(),
        }));
    }
    if lex.is_keyword("(") {
        return parse_parens_filter(lex, field_name);
    }
    if lex.is_keyword("!") || lex.is_keyword("not") {
        return parse_not_filter(lex, field_name);
    }
    if !lex.is_quoted
        && lex.is_any_keyword(&[",", ")", "[", "]", "{", "}", "|", "=", "=~", "!=", "!~"])
    {
        return Err(lex.error(format!("unexpected token {:?}", lex.token)));
    }
    for &func in FUNC_KEYWORDS {
        if lex.is_keyword(func) {
            return parse_func_filter(lex, field_name, func);
        }
    }
    let phrase = get_compound_phrase(lex, field_name.is_empty())?;
    parse_filter_for_phrase(lex, phrase, field_name)
}

fn parse_parens_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    lex.next_token()?;
    let filter = parse_or_filter(lex, field_name)?;
    if !lex.is_keyword(")") {
        return Err(lex.error("missing ')'"));
    }
    lex.next_token()?;
    Ok(filter)
}

fn parse_not_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    lex.next_token()?;
    if lex.at_end() {
        return Err(lex.error("missing filter after negation"));
    }
    let inner = parse_generic_filter(lex, field_name)?;
    Ok(match inner {
        Filter::Not(f) => *f,
        f => Filter::Not(Box::new(f)),
    })
}

/// Merge adjacent unseparated tokens into one phrase. The merged form uses
/// raw source text, so `"foo"bar` keeps its literal quotes.
fn get_compound_phrase(lex: &mut Lexer<'_>, detect_field: bool) -> Result<String> {
    let phrase = lex.token.clone();
    let raw = lex.raw_token.clone();
    lex.next_token()?;
    let suffix = get_compound_suffix(lex, detect_field)?;
    Ok(if suffix.is_empty() {
        phrase
    } else {
        raw + &suffix
    })
}

fn get_compound_suffix(lex: &mut Lexer<'_>, detect_field: bool) -> Result<String> {
    let mut suffix = String::new();
    loop {
        if lex.at_end() || lex.is_skipped_space {
            break;
        }
        if !lex.is_quoted {
            if lex.is_any_keyword(&["*", ",", "(", ")", "[", "]", "|"]) {
                break;
            }
            if detect_field && lex.is_keyword(":") {
                break;
            }
        }
        suffix.push_str(&lex.raw_token);
        lex.next_token()?;
    }
    Ok(suffix)
}

fn parse_filter_for_phrase(lex: &mut Lexer<'_>, phrase: String, field_name: &str) -> Result<Filter> {
    if field_name.is_empty() && lex.is_keyword(":") {
        // the phrase was a field name
        lex.next_token()?;
        if lex.at_end() {
            return Err(lex.error(format!("missing filter after field {phrase:?}")));
        }
        return match phrase.as_str() {
            "_time" => parse_time_filter(lex),
            "_stream" => parse_stream_filter(lex),
            _ => parse_generic_filter(lex, &phrase),
        };
    }
    if lex.is_keyword("*") && !lex.is_skipped_space {
        lex.next_token()?;
        return Ok(Filter::Prefix(PrefixFilter {
            field_name: field_name.to_string(),
            prefix: phrase,
        }));
    }
    Ok(Filter::Phrase(PhraseFilter {
        field_name: field_name.to_string(),
        phrase,
    }))
}

// --- function filters ---

fn parse_func_filter(lex: &mut Lexer<'_>, field_name: &str, func: &str) -> Result<Filter> {
    let func_token = lex.token.clone();
    let func_raw = lex.raw_token.clone();
    lex.next_token()?;
    let is_call = if func == "range" {
        lex.is_keyword("(") || lex.is_keyword("[")
    } else {
        lex.is_keyword("(")
    };
    if !is_call {
        // not a function call after all; fall back to phrase/field parsing
        let suffix = get_compound_suffix(lex, field_name.is_empty())?;
        let phrase = if suffix.is_empty() {
            func_token
        } else {
            func_raw + &suffix
        };
        return parse_filter_for_phrase(lex, phrase, field_name);
    }
    match func {
        "exact" => parse_exact_filter(lex, field_name),
        "i" => parse_any_case_filter(lex, field_name),
        "in" => {
            let values = parse_func_args(lex, "in")?;
            Ok(Filter::In(InFilter::new(field_name.to_string(), values)))
        }
        "ipv4_range" => parse_ipv4_range_filter(lex, field_name),
        "len_range" => parse_len_range_filter(lex, field_name),
        "range" => parse_range_filter(lex, field_name),
        "re" => parse_regexp_filter(lex, field_name),
        "seq" => {
            let phrases = parse_func_args(lex, "seq")?;
            Ok(Filter::Sequence(SequenceFilter {
                field_name: field_name.to_string(),
                phrases,
            }))
        }
        "string_range" => parse_string_range_filter(lex, field_name),
        _ => Err(lex.error(format!("unknown function {func:?}"))),
    }
}

/// Read one function argument: a compound token that stops at `*`, `,`,
/// parens and brackets.
fn get_compound_arg(lex: &mut Lexer<'_>) -> Result<String> {
    if lex.at_end() {
        return Err(lex.error("missing function argument"));
    }
    if !lex.is_quoted && lex.is_any_keyword(&["*", ",", "(", ")", "[", "]", "|"]) {
        return Err(lex.error(format!("unexpected token {:?}", lex.token)));
    }
    let first = lex.token.clone();
    let raw = lex.raw_token.clone();
    lex.next_token()?;
    let mut suffix = String::new();
    loop {
        if lex.at_end() || lex.is_skipped_space {
            break;
        }
        if !lex.is_quoted && lex.is_any_keyword(&["*", ",", "(", ")", "[", "]"]) {
            break;
        }
        suffix.push_str(&lex.raw_token);
        lex.next_token()?;
    }
    Ok(if suffix.is_empty() { first } else { raw + &suffix })
}

fn expect_closing_paren(lex: &mut Lexer<'_>, func: &str) -> Result<()> {
    if !lex.is_keyword(")") {
        return Err(lex.error(format!("missing ')' in {func}(...)")));
    }
    lex.next_token()?;
    Ok(())
}

/// Comma-separated argument list ending at `)`. Trailing commas are
/// allowed; `*` suffixes are not.
fn parse_func_args(lex: &mut Lexer<'_>, func: &str) -> Result<Vec<String>> {
    lex.next_token()?;
    let mut args = Vec::new();
    loop {
        if lex.is_keyword(")") {
            lex.next_token()?;
            return Ok(args);
        }
        args.push(get_compound_arg(lex)?);
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        expect_closing_paren(lex, func)?;
        return Ok(args);
    }
}

fn parse_exact_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    lex.next_token()?;
    if lex.is_keyword("*") {
        lex.next_token()?;
        expect_closing_paren(lex, "exact")?;
        return Ok(Filter::ExactPrefix(ExactPrefixFilter {
            field_name: field_name.to_string(),
            prefix: String::new(),
        }));
    }
    let value = get_compound_arg(lex)?;
    if lex.is_keyword("*") {
        lex.next_token()?;
        expect_closing_paren(lex, "exact")?;
        return Ok(Filter::ExactPrefix(ExactPrefixFilter {
            field_name: field_name.to_string(),
            prefix: value,
        }));
    }
    expect_closing_paren(lex, "exact")?;
    Ok(Filter::Exact(ExactFilter {
        field_name: field_name.to_string(),
        value,
    }))
}

fn parse_any_case_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    lex.next_token()?;
    if lex.is_keyword("*") {
        lex.next_token()?;
        expect_closing_paren(lex, "i")?;
        return Ok(Filter::AnyCasePrefix(AnyCasePrefixFilter::new(
            field_name.to_string(),
            String::new(),
        )));
    }
    let phrase = get_compound_arg(lex)?;
    if lex.is_keyword("*") {
        lex.next_token()?;
        expect_closing_paren(lex, "i")?;
        return Ok(Filter::AnyCasePrefix(AnyCasePrefixFilter::new(
            field_name.to_string(),
            phrase,
        )));
    }
    expect_closing_paren(lex, "i")?;
    Ok(Filter::AnyCasePhrase(AnyCasePhraseFilter::new(
        field_name.to_string(),
        phrase,
    )))
}

fn parse_ipv4_range_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let args = parse_func_args(lex, "ipv4_range")?;
    let (min_value, max_value) = match args.len() {
        1 => {
            let arg = &args[0];
            if let Some((addr, bits)) = arg.split_once('/') {
                let addr = parse_ipv4(addr)
                    .ok_or_else(|| lex.error(format!("cannot parse ipv4 address in {arg:?}")))?;
                let bits: u32 = bits
                    .parse()
                    .ok()
                    .filter(|b| *b <= 32)
                    .ok_or_else(|| lex.error(format!("invalid network prefix in {arg:?}")))?;
                if bits == 0 {
                    (0, u32::MAX)
                } else {
                    let mask = u32::MAX << (32 - bits);
                    (addr & mask, addr | !mask)
                }
            } else {
                let addr = parse_ipv4(arg)
                    .ok_or_else(|| lex.error(format!("cannot parse ipv4 address {arg:?}")))?;
                (addr, addr)
            }
        }
        2 => {
            let min = parse_ipv4(&args[0])
                .ok_or_else(|| lex.error(format!("cannot parse ipv4 address {:?}", args[0])))?;
            let max = parse_ipv4(&args[1])
                .ok_or_else(|| lex.error(format!("cannot parse ipv4 address {:?}", args[1])))?;
            (min, max)
        }
        n => {
            return Err(lex.error(format!("ipv4_range takes 1 or 2 arguments; got {n}")));
        }
    };
    Ok(Filter::Ipv4Range(Ipv4RangeFilter {
        field_name: field_name.to_string(),
        min_value,
        max_value,
    }))
}

fn parse_len_range_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let args = parse_func_args(lex, "len_range")?;
    if args.len() != 2 {
        return Err(lex.error(format!(
            "len_range takes exactly 2 arguments; got {}",
            args.len()
        )));
    }
    let min_len = parse_uint(&args[0]).ok_or_else(|| Error::InvalidNumeric(args[0].clone()))?;
    let max_len = parse_uint(&args[1]).ok_or_else(|| Error::InvalidNumeric(args[1].clone()))?;
    Ok(Filter::LenRange(LenRangeFilter {
        field_name: field_name.to_string(),
        min_len,
        max_len,
        string_repr: format!("({}, {})", args[0], args[1]),
    }))
}

fn parse_range_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let min_incl = lex.is_keyword("[");
    lex.next_token()?;
    let min_text = get_compound_arg(lex)?;
    let mut min_value =
        parse_float_ext(&min_text).ok_or_else(|| Error::InvalidNumeric(min_text.clone()))?;
    if !lex.is_keyword(",") {
        return Err(lex.error("missing ',' in range(...)"));
    }
    lex.next_token()?;
    let max_text = get_compound_arg(lex)?;
    let mut max_value =
        parse_float_ext(&max_text).ok_or_else(|| Error::InvalidNumeric(max_text.clone()))?;
    let max_incl = if lex.is_keyword(")") {
        false
    } else if lex.is_keyword("]") {
        true
    } else {
        return Err(lex.error("missing closing bracket in range(...)"));
    };
    lex.next_token()?;
    if !min_incl {
        min_value = min_value.next_up();
    }
    if !max_incl {
        max_value = max_value.next_down();
    }
    let string_repr = format!(
        "{}{}, {}{}",
        if min_incl { '[' } else { '(' },
        min_text,
        max_text,
        if max_incl { ']' } else { ')' },
    );
    Ok(Filter::Range(RangeFilter {
        field_name: field_name.to_string(),
        min_value,
        max_value,
        string_repr,
    }))
}

fn parse_regexp_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    lex.next_token()?;
    let pattern = get_compound_arg(lex)?;
    expect_closing_paren(lex, "re")?;
    let re = Regex::new(&pattern).map_err(|e| Error::InvalidRegex(e.to_string()))?;
    Ok(Filter::Regexp(RegexpFilter {
        field_name: field_name.to_string(),
        re,
    }))
}

fn parse_string_range_filter(lex: &mut Lexer<'_>, field_name: &str) -> Result<Filter> {
    let args = parse_func_args(lex, "string_range")?;
    if args.len() != 2 {
        return Err(lex.error(format!(
            "string_range takes exactly 2 arguments; got {}",
            args.len()
        )));
    }
    let mut it = args.into_iter();
    Ok(Filter::StringRange(StringRangeFilter {
        field_name: field_name.to_string(),
        min_value: it.next().unwrap_or_default(),
        max_value: it.next().unwrap_or_default(),
    }))
}

// --- _time filter ---

fn parse_time_filter(lex: &mut Lexer<'_>) -> Result<Filter> {
    let now = lex.current_timestamp;
    let (mut min_timestamp, mut max_timestamp, mut string_repr) =
        if lex.is_keyword("[") || lex.is_keyword("(") {
            let min_incl = lex.is_keyword("[");
            lex.next_token()?;
            let (min_text, min_start, _min_end) = parse_time_endpoint(lex, now)?;
            if !lex.is_keyword(",") {
                return Err(lex.error("missing ',' in _time range"));
            }
            lex.next_token()?;
            let (max_text, max_start, max_end) = parse_time_endpoint(lex, now)?;
            let max_incl = if lex.is_keyword(")") {
                false
            } else if lex.is_keyword("]") {
                true
            } else {
                return Err(lex.error("missing closing bracket in _time range"));
            };
            lex.next_token()?;
            let min_ts = if min_incl { min_start } else { min_start + 1 };
            let max_ts = if max_incl { max_end - 1 } else { max_start - 1 };
            let repr = format!(
                "{}{},{}{}",
                if min_incl { '[' } else { '(' },
                min_text,
                max_text,
                if max_incl { ']' } else { ')' },
            );
            (min_ts, max_ts, repr)
        } else {
            let text = get_compound_arg(lex)?;
            if text.eq_ignore_ascii_case("now") {
                (now, now, "now".to_string())
            } else if let Some(d) = parse_duration_ns(&text) {
                (now - d.abs(), now, text)
            } else if let Some((start, end)) = parse_timestamp_span(&text) {
                (start, end - 1, text)
            } else {
                return Err(lex.error(format!("cannot parse timestamp {text:?}")));
            }
        };
    if lex.is_keyword("offset") {
        lex.next_token()?;
        let off_text = get_compound_arg(lex)?;
        let off = parse_duration_ns(&off_text)
            .ok_or_else(|| Error::InvalidNumeric(off_text.clone()))?;
        min_timestamp -= off;
        max_timestamp -= off;
        string_repr.push_str(" offset ");
        string_repr.push_str(&off_text);
    }
    Ok(Filter::Time(TimeFilter {
        min_timestamp,
        max_timestamp,
        string_repr,
    }))
}

/// One endpoint of a `_time` interval: `now`, `now±duration`, a signed
/// duration relative to now, or a timestamp. Returns the spelled text, the
/// instant and the exclusive end of the span it denotes.
fn parse_time_endpoint(lex: &mut Lexer<'_>, now: i64) -> Result<(String, i64, i64)> {
    let text = get_compound_arg(lex)?;
    if text.eq_ignore_ascii_case("now") {
        return Ok((text, now, now + 1));
    }
    if let Some(rest) = text.strip_prefix("now") {
        let d = parse_duration_ns(rest)
            .ok_or_else(|| lex.error(format!("cannot parse timestamp {text:?}")))?;
        return Ok((text.clone(), now + d, now + d + 1));
    }
    if let Some(d) = parse_duration_ns(&text) {
        return Ok((text, now + d, now + d + 1));
    }
    if let Some((start, end)) = parse_timestamp_span(&text) {
        return Ok((text, start, end));
    }
    Err(lex.error(format!("cannot parse timestamp {text:?}")))
}

// --- _stream filter ---

fn parse_stream_filter(lex: &mut Lexer<'_>) -> Result<Filter> {
    if !lex.is_keyword("{") {
        return Err(lex.error("missing '{' in _stream filter"));
    }
    lex.next_token()?;
    if lex.is_keyword("}") {
        lex.next_token()?;
        return Ok(Filter::Noop);
    }
    let mut or_groups = Vec::new();
    let mut group = Vec::new();
    loop {
        let tag = parse_stream_token(lex)?;
        let op = if lex.is_keyword("=") {
            StreamTagOp::Eq
        } else if lex.is_keyword("!=") {
            StreamTagOp::Ne
        } else if lex.is_keyword("=~") {
            StreamTagOp::Re
        } else if lex.is_keyword("!~") {
            StreamTagOp::NotRe
        } else {
            return Err(lex.error("expected '=', '!=', '=~' or '!~' in _stream filter"));
        };
        lex.next_token()?;
        let value = parse_stream_token(lex)?;
        let re = match op {
            StreamTagOp::Re | StreamTagOp::NotRe => Some(
                Regex::new(&format!("^(?:{value})$"))
                    .map_err(|e| Error::InvalidRegex(e.to_string()))?,
            ),
            _ => None,
        };
        group.push(StreamTagFilter { tag, op, value, re });

        if lex.is_keyword(",") {
            lex.next_token()?;
            if lex.is_keyword("}") {
                lex.next_token()?;
                break;
            }
            continue;
        }
        if lex.is_keyword("or") {
            lex.next_token()?;
            or_groups.push(std::mem::take(&mut group));
            continue;
        }
        if lex.is_keyword("}") {
            lex.next_token()?;
            break;
        }
        return Err(lex.error("expected ',', 'or' or '}' in _stream filter"));
    }
    if group.is_empty() {
        return Err(lex.error("missing label matcher in _stream filter"));
    }
    or_groups.push(group);
    Ok(Filter::Stream(StreamFilter { or_groups }))
}

fn parse_stream_token(lex: &mut Lexer<'_>) -> Result<String> {
    if lex.at_end() {
        return Err(lex.error("incomplete _stream filter"));
    }
    if !lex.is_quoted
        && lex.is_any_keyword(&[
            "{", "}", "(", ")", "[", "]", ",", "|", "*", ":", "=", "!=", "=~", "!~", "!",
        ])
    {
        return Err(lex.error(format!("unexpected token {:?} in _stream filter", lex.token)));
    }
    let token = lex.token.clone();
    lex.next_token()?;
    Ok(token)
}

// --- pipes ---

fn parse_pipes(lex: &mut Lexer<'_>) -> Result<Vec<Pipe>> {
    let mut pipes = Vec::new();
    loop {
        lex.next_token()?; // past '|'
        if lex.at_end() {
            return Err(lex.error("missing pipe after '|'"));
        }
        if lex.is_quoted {
            return Err(lex.error(format!("unknown pipe {:?}", lex.token)));
        }
        let name = lex.token.to_ascii_lowercase();
        let pipe = match name.as_str() {
            "fields" => {
                lex.next_token()?;
                let fields = parse_comma_field_list(lex)?;
                Pipe::Fields { fields }
            }
            "copy" | "cp" => Pipe::Copy {
                pairs: parse_field_pairs(lex)?,
            },
            "rename" | "mv" => Pipe::Rename {
                pairs: parse_field_pairs(lex)?,
            },
            "delete" | "del" | "rm" => {
                lex.next_token()?;
                let fields = parse_comma_field_list(lex)?;
                Pipe::Delete { fields }
            }
            "limit" | "head" => {
                lex.next_token()?;
                Pipe::Limit {
                    limit: parse_uint_token(lex)?,
                }
            }
            "offset" | "skip" => {
                lex.next_token()?;
                Pipe::Offset {
                    offset: parse_uint_token(lex)?,
                }
            }
            "sort" => parse_sort_pipe(lex)?,
            "uniq" => parse_uniq_pipe(lex)?,
            "stats" => parse_stats_pipe(lex)?,
            other => {
                return Err(lex.error(format!("unknown pipe {other:?}")));
            }
        };
        pipes.push(pipe);
        if lex.is_keyword("|") {
            continue;
        }
        if lex.at_end() {
            return Ok(pipes);
        }
        return Err(lex.error(format!("unexpected token {:?} after pipe", lex.token)));
    }
}

/// A single field-name token; the empty alias maps to `_msg`.
fn parse_field_name(lex: &mut Lexer<'_>) -> Result<String> {
    if lex.at_end() {
        return Err(lex.error("missing field name"));
    }
    if !lex.is_quoted
        && lex.is_any_keyword(&[
            "{", "}", "(", ")", "[", "]", ",", "|", "*", ":", "=", "!=", "=~", "!~", "!",
        ])
    {
        return Err(lex.error(format!("unexpected token {:?} instead of field name", lex.token)));
    }
    let name = if lex.token.is_empty() {
        "_msg".to_string()
    } else {
        lex.token.clone()
    };
    lex.next_token()?;
    Ok(name)
}

/// Comma-separated field names; `*` entries collapse the list to `["*"]`.
fn parse_comma_field_list(lex: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    loop {
        if lex.is_keyword("*") {
            lex.next_token()?;
            fields.push("*".to_string());
        } else {
            fields.push(parse_field_name(lex)?);
        }
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        break;
    }
    if fields.iter().any(|f| f == "*") {
        fields = vec!["*".to_string()];
    }
    Ok(fields)
}

fn parse_field_pairs(lex: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    lex.next_token()?;
    let mut pairs = Vec::new();
    loop {
        let src = parse_field_name(lex)?;
        if lex.is_keyword("as") {
            lex.next_token()?;
        }
        let dst = parse_field_name(lex)?;
        pairs.push((src, dst));
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        break;
    }
    Ok(pairs)
}

fn parse_uint_token(lex: &mut Lexer<'_>) -> Result<u64> {
    if lex.at_end() {
        return Err(lex.error("missing number"));
    }
    let n = parse_uint(&lex.token).ok_or_else(|| Error::InvalidNumeric(lex.token.clone()))?;
    lex.next_token()?;
    Ok(n)
}

/// Parenthesized field list with optional `*` entries and trailing commas.
fn parse_paren_field_list(lex: &mut Lexer<'_>) -> Result<Vec<String>> {
    if !lex.is_keyword("(") {
        return Err(lex.error("missing '('"));
    }
    lex.next_token()?;
    let mut fields = Vec::new();
    loop {
        if lex.is_keyword(")") {
            lex.next_token()?;
            return Ok(fields);
        }
        if lex.is_keyword("*") {
            lex.next_token()?;
            fields.push("*".to_string());
        } else {
            fields.push(parse_field_name(lex)?);
        }
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        if lex.is_keyword(")") {
            lex.next_token()?;
            return Ok(fields);
        }
        return Err(lex.error("missing ')' in field list"));
    }
}

fn parse_sort_pipe(lex: &mut Lexer<'_>) -> Result<Pipe> {
    lex.next_token()?;
    let mut by = Vec::new();
    if lex.is_keyword("by") {
        lex.next_token()?;
        if !lex.is_keyword("(") {
            return Err(lex.error("missing '(' after 'by'"));
        }
        lex.next_token()?;
        loop {
            if lex.is_keyword(")") {
                lex.next_token()?;
                break;
            }
            let name = parse_field_name(lex)?;
            let mut desc = false;
            if lex.is_keyword("desc") {
                lex.next_token()?;
                desc = true;
            }
            by.push(SortField { name, desc });
            if lex.is_keyword(",") {
                lex.next_token()?;
                continue;
            }
            if lex.is_keyword(")") {
                lex.next_token()?;
                break;
            }
            return Err(lex.error("missing ')' in sort fields"));
        }
    }
    let mut desc = false;
    let mut offset = None;
    let mut limit = None;
    loop {
        if lex.is_keyword("desc") && !desc {
            lex.next_token()?;
            desc = true;
        } else if lex.is_keyword("offset") && offset.is_none() {
            lex.next_token()?;
            offset = Some(parse_uint_token(lex)?);
        } else if lex.is_keyword("limit") && limit.is_none() {
            lex.next_token()?;
            limit = Some(parse_uint_token(lex)?);
        } else {
            break;
        }
    }
    if !lex.at_end() && !lex.is_keyword("|") {
        return Err(lex.error(format!("unexpected token {:?} in sort pipe", lex.token)));
    }
    Ok(Pipe::Sort {
        by,
        desc,
        offset: offset.unwrap_or(0),
        limit,
    })
}

fn parse_uniq_pipe(lex: &mut Lexer<'_>) -> Result<Pipe> {
    lex.next_token()?;
    let mut by = Vec::new();
    if lex.is_keyword("by") {
        lex.next_token()?;
        by = parse_paren_field_list(lex)?;
        if by.iter().any(|f| f == "*") {
            by.clear();
        }
    }
    let mut limit = None;
    if lex.is_keyword("limit") {
        lex.next_token()?;
        limit = Some(parse_uint_token(lex)?);
    }
    if !lex.at_end() && !lex.is_keyword("|") {
        return Err(lex.error(format!("unexpected token {:?} in uniq pipe", lex.token)));
    }
    Ok(Pipe::Uniq { by, limit })
}

// --- stats pipe ---

const TIME_BUCKET_UNITS: &[(&str, f64)] = &[
    ("nanosecond", 1.0),
    ("microsecond", 1e3),
    ("millisecond", 1e6),
    ("second", 1e9),
    ("minute", 60e9),
    ("hour", 3600e9),
    ("day", 86_400e9),
    ("week", 7.0 * 86_400e9),
    ("month", 31.0 * 86_400e9),
    ("year", 365.0 * 86_400e9),
];

fn parse_stats_pipe(lex: &mut Lexer<'_>) -> Result<Pipe> {
    lex.next_token()?;
    let mut by = Vec::new();
    if lex.is_keyword("by") {
        lex.next_token()?;
        by = parse_stats_by_fields(lex)?;
    }
    let mut funcs = Vec::new();
    loop {
        funcs.push(parse_stats_func(lex)?);
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        break;
    }
    if !lex.at_end() && !lex.is_keyword("|") {
        return Err(lex.error(format!("unexpected token {:?} in stats pipe", lex.token)));
    }
    Ok(Pipe::Stats { by, funcs })
}

fn parse_stats_by_fields(lex: &mut Lexer<'_>) -> Result<Vec<ByStatsField>> {
    if !lex.is_keyword("(") {
        return Err(lex.error("missing '(' after 'by'"));
    }
    lex.next_token()?;
    let mut fields = Vec::new();
    loop {
        if lex.is_keyword(")") {
            lex.next_token()?;
            return Ok(fields);
        }
        let name = parse_field_name(lex)?;
        let mut field = ByStatsField::plain(name);
        if lex.is_keyword(":") {
            lex.next_token()?;
            let bucket = get_compound_arg(lex)?;
            parse_bucket_size(&bucket, &mut field)
                .ok_or_else(|| lex.error(format!("invalid bucket size {bucket:?}")))?;
            field.bucket_size_str = bucket;
            if lex.is_keyword("offset") {
                lex.next_token()?;
                let off = get_compound_arg(lex)?;
                field.bucket_offset = parse_duration_ns(&off)
                    .map(|d| d as f64)
                    .or_else(|| parse_float_ext(&off))
                    .ok_or_else(|| lex.error(format!("invalid bucket offset {off:?}")))?;
                field.bucket_offset_str = off;
            }
        }
        fields.push(field);
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        if lex.is_keyword(")") {
            lex.next_token()?;
            return Ok(fields);
        }
        return Err(lex.error("missing ')' in stats by fields"));
    }
}

fn parse_bucket_size(s: &str, field: &mut ByStatsField) -> Option<()> {
    if let Some(bits) = s.strip_prefix('/') {
        let bits: u8 = bits.parse().ok().filter(|b| *b <= 32)?;
        field.ip_prefix_bits = Some(bits);
        return Some(());
    }
    for (unit, ns) in TIME_BUCKET_UNITS {
        if s.eq_ignore_ascii_case(unit) {
            field.bucket_size = *ns;
            return Some(());
        }
    }
    let size = parse_duration_ns(s)
        .map(|d| d as f64)
        .or_else(|| parse_float_ext(s))?;
    if size <= 0.0 {
        return None;
    }
    field.bucket_size = size;
    Some(())
}

const STATS_FUNC_NAMES: &[&str] = &[
    "count",
    "count_empty",
    "count_uniq",
    "sum",
    "min",
    "max",
    "avg",
    "median",
    "quantile",
    "uniq_values",
    "values",
    "sum_len",
];

fn parse_stats_func(lex: &mut Lexer<'_>) -> Result<StatsFuncExpr> {
    if lex.at_end() {
        return Err(lex.error("missing stats function"));
    }
    let name = lex.token.to_ascii_lowercase();
    if lex.is_quoted || !STATS_FUNC_NAMES.contains(&name.as_str()) {
        return Err(lex.error(format!("unknown stats function {:?}", lex.token)));
    }
    lex.next_token()?;
    if !lex.is_keyword("(") {
        return Err(lex.error(format!("missing '(' after {name}")));
    }

    if name == "quantile" {
        lex.next_token()?;
        let phi_str = get_compound_arg(lex)?;
        let phi = phi_str
            .parse::<f64>()
            .ok()
            .filter(|p| (0.0..=1.0).contains(p))
            .ok_or_else(|| lex.error(format!("invalid quantile level {phi_str:?}")))?;
        if lex.is_keyword(",") {
            lex.next_token()?;
        } else if !lex.is_keyword(")") {
            return Err(lex.error("missing ',' after quantile level"));
        }
        // re-enter the shared list parser at the field list
        let fields = parse_quantile_fields(lex)?;
        if fields.is_empty() {
            return Err(lex.error("quantile needs at least one field"));
        }
        let func = StatsFunc::Quantile {
            phi,
            phi_str,
            fields,
        };
        return finish_stats_func(lex, func);
    }

    // an empty argument list means "all columns", same as a `*` entry
    let mut fields = parse_paren_field_list(lex)?;
    if fields.iter().any(|f| f == "*") {
        fields = vec!["*".to_string()];
    }

    let mut limit = None;
    if matches!(name.as_str(), "count_uniq" | "uniq_values" | "values") && lex.is_keyword("limit") {
        lex.next_token()?;
        limit = Some(parse_uint_token(lex)?);
    }

    let func = match name.as_str() {
        "count" => StatsFunc::Count { fields },
        "count_empty" => StatsFunc::CountEmpty { fields },
        "count_uniq" => StatsFunc::CountUniq { fields, limit },
        "sum" => StatsFunc::Sum { fields },
        "min" => StatsFunc::Min { fields },
        "max" => StatsFunc::Max { fields },
        "avg" => StatsFunc::Avg { fields },
        "median" => StatsFunc::Median { fields },
        "uniq_values" => StatsFunc::UniqValues { fields, limit },
        "values" => StatsFunc::Values { fields, limit },
        "sum_len" => StatsFunc::SumLen { fields },
        other => {
            return Err(lex.error(format!("unknown stats function {other:?}")));
        }
    };
    finish_stats_func(lex, func)
}

fn parse_quantile_fields(lex: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    loop {
        if lex.is_keyword(")") {
            lex.next_token()?;
            break;
        }
        if lex.is_keyword("*") {
            lex.next_token()?;
            fields.push("*".to_string());
        } else {
            fields.push(parse_field_name(lex)?);
        }
        if lex.is_keyword(",") {
            lex.next_token()?;
            continue;
        }
        if lex.is_keyword(")") {
            lex.next_token()?;
            break;
        }
        return Err(lex.error("missing ')' in quantile fields"));
    }
    if fields.iter().any(|f| f == "*") {
        fields = vec!["*".to_string()];
    }
    Ok(fields)
}

fn finish_stats_func(lex: &mut Lexer<'_>, func: StatsFunc) -> Result<StatsFuncExpr> {
    if lex.is_keyword("as") {
        lex.next_token()?;
    }
    let result_name = parse_field_name(lex)
        .map_err(|_| lex.error(format!("missing result name for {}(...)", func.name())))?;
    Ok(StatsFuncExpr { func, result_name })
}
