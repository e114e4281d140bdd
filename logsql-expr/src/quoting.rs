//! Token quoting for canonical query rendering.

use std::borrow::Cow;

/// Words that must be quoted to survive a round-trip through the parser.
const RESERVED_WORDS: &[&str] = &[
    "and",
    "or",
    "not",
    "offset",
    "-",
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

/// Whether `s` can appear unquoted in a rendered query.
pub fn needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if RESERVED_WORDS.contains(&lower.as_str()) {
        return true;
    }
    s.chars()
        .any(|c| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '-'))
}

/// Double-quote `s` with backslash escapes.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote `s` only when required for a faithful round-trip.
pub fn quote_token(s: &str) -> Cow<'_, str> {
    if needs_quoting(s) {
        Cow::Owned(quote_string(s))
    } else {
        Cow::Borrowed(s)
    }
}

/// Field-name prefix for a filter: empty for the default `_msg` field,
/// otherwise the quoted name followed by `:`.
pub fn field_prefix(name: &str) -> String {
    if name.is_empty() || name == "_msg" {
        return String::new();
    }
    format!("{}:", quote_token(name))
}
