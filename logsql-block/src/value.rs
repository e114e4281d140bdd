//! Column value types and the canonical string codec for each of them.
//!
//! Canonical forms: decimal for unsigned integers, shortest round-trip
//! rendering for floats, dotted quad for ipv4, RFC3339 with a fixed
//! nine-digit fraction and `Z` zone for timestamps.

use time::{Date, Month, OffsetDateTime};

/// Encoding of a column within one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// Raw UTF-8 string cells.
    String,
    /// One-byte indexes into the column dictionary (≤ 256 entries).
    Dict,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// 8-byte IEEE-754 bit pattern, big-endian.
    Float64,
    /// 4-byte big-endian address.
    Ipv4,
    /// 8-byte big-endian nanosecond unix timestamp.
    TimestampIso8601,
}

impl ValueType {
    /// Fixed cell width in bytes, or `None` for variable-width types.
    pub fn cell_width(self) -> Option<usize> {
        match self {
            ValueType::String => None,
            ValueType::Dict => Some(1),
            ValueType::Uint8 => Some(1),
            ValueType::Uint16 => Some(2),
            ValueType::Uint32 => Some(4),
            ValueType::Uint64 => Some(8),
            ValueType::Float64 => Some(8),
            ValueType::Ipv4 => Some(4),
            ValueType::TimestampIso8601 => Some(8),
        }
    }
}

/// Decode a big-endian cell of 1..=8 bytes into a u64. The caller has
/// already validated the width.
#[inline]
pub fn decode_be_uint(cell: &[u8]) -> u64 {
    let mut n = 0u64;
    for &b in cell {
        n = (n << 8) | u64::from(b);
    }
    n
}

pub fn format_float(f: f64) -> String {
    f.to_string()
}

pub fn format_ipv4(addr: u32) -> String {
    let mut s = String::with_capacity(15);
    push_ipv4(&mut s, addr);
    s
}

/// Append the dotted-quad form of `addr` to `buf`.
pub fn push_ipv4(buf: &mut String, addr: u32) {
    use std::fmt::Write;
    let b = addr.to_be_bytes();
    let _ = write!(buf, "{}.{}.{}.{}", b[0], b[1], b[2], b[3]);
}

/// Byte length of every rendered iso8601 timestamp.
pub const ISO8601_STRING_LEN: u64 = 30;

pub fn format_timestamp_iso8601(ns: i64) -> String {
    let mut s = String::with_capacity(ISO8601_STRING_LEN as usize);
    push_timestamp_iso8601(&mut s, ns);
    s
}

/// Append the canonical iso8601 rendering of `ns` to `buf`.
pub fn push_timestamp_iso8601(buf: &mut String, ns: i64) {
    use std::fmt::Write;
    let t = OffsetDateTime::from_unix_timestamp_nanos(i128::from(ns))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let _ = write!(
        buf,
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        t.nanosecond(),
    );
}

/// Parse a plain decimal unsigned integer: no sign, no separators.
pub fn try_parse_uint64(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 20 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Tolerant float parse used when matching numeric filters against string
/// cells: optional sign, decimal point, exponent, and a single SI or IEC
/// size suffix (`K`, `KB`, `Ki`, `KiB`, ...). Suffix letters are
/// case-sensitive so duration-looking values (`5m`) do not parse as sizes.
pub fn try_parse_float(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    if let Ok(f) = s.parse::<f64>() {
        return Some(f);
    }
    let (num, mult) = split_size_suffix(s)?;
    let f = num.parse::<f64>().ok()?;
    Some(f * mult)
}

/// Split a trailing size suffix off `s`, returning the numeric part and the
/// multiplier.
pub(crate) fn split_size_suffix(s: &str) -> Option<(&str, f64)> {
    const SUFFIXES: [(&str, f64); 12] = [
        ("KiB", 1024.0),
        ("MiB", 1048576.0),
        ("GiB", 1073741824.0),
        ("TiB", 1099511627776.0),
        ("PiB", 1125899906842624.0),
        ("EiB", 1152921504606846976.0),
        ("KB", 1e3),
        ("MB", 1e6),
        ("GB", 1e9),
        ("TB", 1e12),
        ("PB", 1e15),
        ("EB", 1e18),
    ];
    for (suffix, mult) in SUFFIXES {
        if let Some(num) = s.strip_suffix(suffix) {
            return Some((num, mult));
        }
    }
    const SHORT: [(&str, f64); 12] = [
        ("Ki", 1024.0),
        ("Mi", 1048576.0),
        ("Gi", 1073741824.0),
        ("Ti", 1099511627776.0),
        ("Pi", 1125899906842624.0),
        ("Ei", 1152921504606846976.0),
        ("K", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
        ("E", 1e18),
    ];
    for (suffix, mult) in SHORT {
        if let Some(num) = s.strip_suffix(suffix) {
            return Some((num, mult));
        }
    }
    None
}

pub fn try_parse_ipv4(s: &str) -> Option<u32> {
    let mut octets = [0u32; 4];
    let mut parts = s.split('.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Reject non-canonical leading zeros so parse/format round-trips.
        if part.len() > 1 && part.starts_with('0') {
            return None;
        }
        let n: u32 = part.parse().ok()?;
        if n > 255 {
            return None;
        }
        *octet = n;
    }
    if parts.next().is_some() {
        return None;
    }
    Some((octets[0] << 24) | (octets[1] << 16) | (octets[2] << 8) | octets[3])
}

/// Parse the canonical iso8601 rendering `YYYY-MM-DDTHH:MM:SS.NNNNNNNNNZ`
/// into unix nanoseconds.
pub fn try_parse_timestamp_iso8601(s: &str) -> Option<i64> {
    let b = s.as_bytes();
    if b.len() != ISO8601_STRING_LEN as usize || b[b.len() - 1] != b'Z' {
        return None;
    }
    if b[4] != b'-' || b[7] != b'-' || b[10] != b'T' || b[13] != b':' || b[16] != b':' || b[19] != b'.'
    {
        return None;
    }
    let year: i32 = parse_digits(&s[0..4])?;
    let month: u8 = parse_digits(&s[5..7])?;
    let day: u8 = parse_digits(&s[8..10])?;
    let hour: u8 = parse_digits(&s[11..13])?;
    let minute: u8 = parse_digits(&s[14..16])?;
    let second: u8 = parse_digits(&s[17..19])?;
    let nanos: u32 = parse_digits(&s[20..29])?;
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let days = i64::from(date.to_julian_day() - epoch_julian_day());
    let secs = days * 86_400 + i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
    Some(secs * 1_000_000_000 + i64::from(nanos))
}

fn epoch_julian_day() -> i32 {
    Date::from_calendar_date(1970, Month::January, 1)
        .map(|d| d.to_julian_day())
        .unwrap_or(2_440_588)
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
