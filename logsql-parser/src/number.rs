//! Numeric literal grammar: underscores, radix prefixes, SI and IEC size
//! suffixes, duration terms and infinities.

/// Multipliers for size suffixes, longest spelling first so `KiB` wins over
/// `Ki` and `K`.
const SIZE_SUFFIXES: &[(&str, f64)] = &[
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

pub const NS_PER_SECOND: f64 = 1e9;

/// Duration suffixes, longest spelling first.
const DURATION_SUFFIXES: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("us", 1e3),
    ("ms", 1e6),
    ("s", NS_PER_SECOND),
    ("m", 60.0 * NS_PER_SECOND),
    ("h", 3600.0 * NS_PER_SECOND),
    ("d", 86_400.0 * NS_PER_SECOND),
    ("w", 7.0 * 86_400.0 * NS_PER_SECOND),
    ("y", 365.0 * 86_400.0 * NS_PER_SECOND),
];

fn is_inf(s: &str) -> bool {
    s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("+inf")
}

fn parse_radix(s: &str) -> Option<u64> {
    let (digits, radix) = if let Some(d) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (d, 16)
    } else if let Some(d) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (d, 8)
    } else if let Some(d) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (d, 2)
    } else {
        return None;
    };
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Sum of `<number><size-suffix>` terms; a final bare integer term is
/// allowed. `22MB100KB` → 22_100_000.
fn parse_size_terms(s: &str) -> Option<f64> {
    let mut rest = s;
    let mut total = 0f64;
    let mut terms = 0usize;
    while !rest.is_empty() {
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let num: f64 = rest[..end].parse().ok()?;
        rest = &rest[end..];
        let mut matched = false;
        for (suffix, mult) in SIZE_SUFFIXES {
            if let Some(tail) = rest.strip_prefix(suffix) {
                total += num * mult;
                rest = tail;
                matched = true;
                break;
            }
        }
        if !matched {
            // bare trailing number, integral only
            if !rest.is_empty() || num.fract() != 0.0 {
                return None;
            }
            total += num;
        }
        terms += 1;
    }
    (terms > 0).then_some(total)
}

/// Unsigned integer literal: plain decimal with `_` separators, radix
/// prefixes, size-suffix terms, or `inf` (saturating to `u64::MAX`).
pub fn parse_uint(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    if is_inf(s) {
        return Some(u64::MAX);
    }
    let s = s.replace('_', "");
    if let Some(n) = parse_radix(&s) {
        return Some(n);
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    let total = parse_size_terms(&s)?;
    if total < 0.0 || total.fract() != 0.0 || total > u64::MAX as f64 {
        return None;
    }
    Some(total as u64)
}

/// Signed duration: a sum of `<number><unit>` terms with an optional
/// leading sign. `1y2w2.5m3s5ms` and `-5.5m` both parse.
pub fn parse_duration_ns(s: &str) -> Option<i64> {
    let s = s.replace('_', "");
    let (sign, mut rest) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(&s)),
    };
    if rest.is_empty() {
        return None;
    }
    let mut total = 0f64;
    while !rest.is_empty() {
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let num: f64 = rest[..end].parse().ok()?;
        rest = &rest[end..];
        let mut matched = false;
        for (suffix, mult) in DURATION_SUFFIXES {
            if let Some(tail) = rest.strip_prefix(suffix) {
                // `m` must not swallow the `m` of an `ms` that follows a
                // longer match attempt; suffix table order handles it.
                total += num * mult;
                rest = tail;
                matched = true;
                break;
            }
        }
        if !matched {
            return None;
        }
    }
    let ns = sign * total;
    if !ns.is_finite() || ns.abs() > i64::MAX as f64 {
        return None;
    }
    Some(ns as i64)
}

/// Float literal for range bounds: plain floats with exponents, `inf`
/// spellings, radix integers, size terms and durations.
pub fn parse_float_ext(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    if is_inf(s) {
        return Some(f64::INFINITY);
    }
    if s.eq_ignore_ascii_case("-inf") {
        return Some(f64::NEG_INFINITY);
    }
    let cleaned = s.replace('_', "");
    if let Ok(f) = cleaned.parse::<f64>() {
        return Some(f);
    }
    if let Some(n) = parse_radix(&cleaned) {
        return Some(n as f64);
    }
    let (sign, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    if let Some(total) = parse_size_terms(body) {
        return Some(sign * total);
    }
    parse_duration_ns(&cleaned).map(|ns| ns as f64)
}

pub fn parse_ipv4(s: &str) -> Option<u32> {
    let mut octets = [0u32; 4];
    let mut parts = s.split('.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uints() {
        assert_eq!(parse_uint("10"), Some(10));
        assert_eq!(parse_uint("1_123_432"), Some(1_123_432));
        assert_eq!(parse_uint("10K"), Some(10_000));
        assert_eq!(parse_uint("12345M"), Some(12_345_000_000));
        assert_eq!(parse_uint("0x10"), Some(16));
        assert_eq!(parse_uint("0b100101"), Some(37));
        assert_eq!(parse_uint("0o7532"), Some(3930));
        assert_eq!(parse_uint("1.5KB"), Some(1500));
        assert_eq!(parse_uint("22MB100KB"), Some(22_100_000));
        assert_eq!(parse_uint("inf"), Some(u64::MAX));
        assert_eq!(parse_uint("+InF"), Some(u64::MAX));
        assert_eq!(parse_uint("1.5"), None);
        assert_eq!(parse_uint("-1"), None);
        assert_eq!(parse_uint("bar"), None);
    }

    #[test]
    fn durations() {
        const S: i64 = 1_000_000_000;
        assert_eq!(parse_duration_ns("5m"), Some(300 * S));
        assert_eq!(parse_duration_ns("-5.5m"), Some(-330 * S));
        assert_eq!(
            parse_duration_ns("3d2h12m34s45ms"),
            Some((3 * 86400 + 2 * 3600 + 12 * 60 + 34) * S + 45_000_000)
        );
        assert_eq!(parse_duration_ns("100ns"), Some(100));
        assert_eq!(parse_duration_ns("1h"), Some(3600 * S));
        assert_eq!(parse_duration_ns("5m45s"), Some(345 * S));
        assert_eq!(parse_duration_ns("foo"), None);
        assert_eq!(parse_duration_ns("5"), None);
    }

    #[test]
    fn floats() {
        assert_eq!(parse_float_ext("-1.234e-5"), Some(-1.234e-5));
        assert_eq!(parse_float_ext("2.34E+3"), Some(2340.0));
        assert_eq!(parse_float_ext("1_000"), Some(1000.0));
        assert_eq!(parse_float_ext("0x1ff"), Some(511.0));
        assert_eq!(parse_float_ext("1.5K"), Some(1500.0));
        assert_eq!(parse_float_ext("22.5GiB"), Some(22.5 * 1073741824.0));
        assert_eq!(parse_float_ext("-INF"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_ext("+inF"), Some(f64::INFINITY));
        assert_eq!(parse_float_ext("100ns"), Some(100.0));
        let y = 365.0 * 86400.0 * 1e9;
        let w = 7.0 * 86400.0 * 1e9;
        assert_eq!(
            parse_float_ext("1y2w2.5m3s5ms"),
            Some(y + 2.0 * w + 2.5 * 60.0 * 1e9 + 3.0 * 1e9 + 5e6)
        );
        assert_eq!(parse_float_ext("foo"), None);
    }

    #[test]
    fn ipv4() {
        assert_eq!(parse_ipv4("1.2.3.4"), Some(0x01020304));
        assert_eq!(parse_ipv4("5.6.7"), None);
        assert_eq!(parse_ipv4("1.2.3.4.5"), None);
    }
}
