//!
//! Literal parsing for environment values.
//!
//! Values are already trimmed by the time they reach here, nothing in this
//! module trims again.
//!
use crate::error::LiteralError;
use std::{borrow::Cow, convert::TryFrom, num::IntErrorKind, str::FromStr};

///
/// Split a delimited list into its raw elements.
///
/// `escape` masks the character right after it, so an escaped `delimiter`
/// doesn't end the element. Escape characters themselves never survive into
/// the output. An empty source is an empty list, a trailing delimiter yields
/// a trailing empty element.
///
pub fn split_list(source: &str, delimiter: char, escape: char) -> Vec<String> {
    let mut results = Vec::new();

    if source.is_empty() {
        return results;
    }

    let (mut is_escaped, mut has_escape) = (false, false);
    let mut last_index = 0;

    for (index, ch) in source.char_indices() {
        if is_escaped {
            is_escaped = false;
            continue;
        }

        if ch == escape {
            is_escaped = true;
            has_escape = true;
        } else if ch == delimiter {
            results.push(unescape(&source[last_index..index], escape, has_escape));
            has_escape = false;
            last_index = index + ch.len_utf8();
        }
    }

    results.push(unescape(&source[last_index..], escape, has_escape));
    results
}

#[inline]
fn unescape(segment: &str, escape: char, has_escape: bool) -> String {
    if has_escape {
        segment.chars().filter(|ch| *ch != escape).collect()
    } else {
        String::from(segment)
    }
}

///
/// Detect the radix of an integer literal.
///
/// `0x`, `0o` and `0b` select hex, octal and binary, a bare leading zero
/// selects octal. Returns the radix, the remaining digits and whether a
/// prefix was consumed.
///
fn split_radix(raw: &str) -> (u32, &str, bool) {
    let bytes = raw.as_bytes();

    if bytes.len() >= 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => (16, &raw[2..], true),
            b'o' | b'O' => (8, &raw[2..], true),
            b'b' | b'B' => (2, &raw[2..], true),
            _ => (8, &raw[1..], true),
        }
    } else {
        (10, raw, false)
    }
}

/// `_` may only separate digits (or follow a base prefix).
fn strip_underscores(digits: &str, prefixed: bool) -> Result<Cow<'_, str>, LiteralError> {
    if !digits.contains('_') {
        return Ok(Cow::Borrowed(digits));
    }

    if digits.ends_with('_') || digits.contains("__") || (digits.starts_with('_') && !prefixed)
    {
        Err(LiteralError::Syntax)
    } else {
        Ok(Cow::Owned(digits.replace('_', "")))
    }
}

fn parse_magnitude(raw: &str) -> Result<u128, LiteralError> {
    let (radix, digits, prefixed) = split_radix(raw);
    let digits = strip_underscores(digits, prefixed)?;

    // from_str_radix would otherwise accept a sign after the prefix
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(LiteralError::Syntax);
    }

    u128::from_str_radix(&digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => LiteralError::Range,
        _ => LiteralError::Syntax,
    })
}

///
/// Parse a signed integer literal with base auto-detection into `T`.
///
pub fn parse_int<T>(source: &str) -> Result<T, LiteralError>
where
    T: TryFrom<i128>,
{
    let (negative, raw) = if let Some(rest) = source.strip_prefix('-') {
        (true, rest)
    } else {
        (false, source.strip_prefix('+').unwrap_or(source))
    };

    let magnitude = parse_magnitude(raw)?;

    let value = if negative && magnitude == i128::MIN.unsigned_abs() {
        i128::MIN
    } else {
        let value = i128::try_from(magnitude).map_err(|_| LiteralError::Range)?;
        if negative {
            -value
        } else {
            value
        }
    };

    T::try_from(value).map_err(|_| LiteralError::Range)
}

///
/// Parse an unsigned integer literal with base auto-detection into `T`.
/// No sign is accepted, not even `+`.
///
pub fn parse_uint<T>(source: &str) -> Result<T, LiteralError>
where
    T: TryFrom<u128>,
{
    if source.starts_with('+') || source.starts_with('-') {
        return Err(LiteralError::Syntax);
    }

    let value = parse_magnitude(source)?;
    T::try_from(value).map_err(|_| LiteralError::Range)
}

///
/// Parse a decimal or scientific float literal. A finite literal that
/// overflows the target precision is out of range.
///
pub fn parse_float<T>(source: &str) -> Result<T, LiteralError>
where
    T: FromStr + Copy + Into<f64>,
{
    let value = source.parse::<T>().map_err(|_| LiteralError::Syntax)?;

    if value.into().is_infinite() && !spells_infinity(source) {
        Err(LiteralError::Range)
    } else {
        Ok(value)
    }
}

fn spells_infinity(source: &str) -> bool {
    source
        .trim_start_matches(|ch: char| ch == '+' || ch == '-')
        .get(..3)
        .map_or(false, |head| head.eq_ignore_ascii_case("inf"))
}

pub fn parse_bool(source: &str) -> Result<bool, LiteralError> {
    match source {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(LiteralError::Syntax),
    }
}

#[cfg(test)]
mod test {
    use super::{parse_bool, parse_float, parse_int, parse_uint, split_list};
    use crate::error::LiteralError;
    use proptest::prelude::*;

    #[test]
    fn test_split_list_escaped_delimiter() {
        assert_eq!(
            split_list(r"ren,stimpy,hapi\, hapi\, joi\, joi", ',', '\\'),
            vec!["ren", "stimpy", "hapi, hapi, joi, joi"]
        );
    }

    #[test]
    fn test_split_list_edges() {
        assert!(split_list("", ',', '\\').is_empty());
        assert_eq!(split_list("single", ',', '\\'), vec!["single"]);
        assert_eq!(split_list("a,", ',', '\\'), vec!["a", ""]);
        assert_eq!(split_list(",a", ',', '\\'), vec!["", "a"]);
        assert_eq!(split_list("a,,b", ',', '\\'), vec!["a", "", "b"]);
        assert_eq!(
            split_list("[::1]:6160,127.0.0.1:6160,:6160", ',', '\\'),
            vec!["[::1]:6160", "127.0.0.1:6160", ":6160"]
        );
    }

    #[test]
    fn test_split_list_escape_never_survives() {
        // escaped escape is dropped too, and only in the segment holding it
        assert_eq!(split_list(r"a\\,b", ',', '\\'), vec!["a", "b"]);
        assert_eq!(split_list(r"a\b,c", ',', '\\'), vec!["ab", "c"]);
        assert_eq!(split_list(r"x\", ',', '\\'), vec!["x"]);
        assert_eq!(split_list("a;b|;c", ';', '|'), vec!["a", "b;c"]);
    }

    #[test]
    fn test_parse_int_radix() {
        assert_eq!(parse_int::<i32>("123"), Ok(123));
        assert_eq!(parse_int::<i32>("-123"), Ok(-123));
        assert_eq!(parse_int::<i32>("+7"), Ok(7));
        assert_eq!(parse_int::<i32>("0x1f"), Ok(31));
        assert_eq!(parse_int::<i32>("0X1F"), Ok(31));
        assert_eq!(parse_int::<i32>("0o17"), Ok(15));
        assert_eq!(parse_int::<i32>("017"), Ok(15));
        assert_eq!(parse_int::<i32>("0b101"), Ok(5));
        assert_eq!(parse_int::<i32>("-0x10"), Ok(-16));
        assert_eq!(parse_int::<i32>("0"), Ok(0));
        assert_eq!(parse_int::<i64>("1_000_000"), Ok(1_000_000));
        assert_eq!(parse_int::<i64>("0x_ff"), Ok(255));
    }

    #[test]
    fn test_parse_int_errors() {
        assert_eq!(parse_int::<i32>(""), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("-"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("notanumber"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("08"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("0x"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("0x+5"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("_1"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("1__0"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("1_"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i32>("5s"), Err(LiteralError::Syntax));
        assert_eq!(parse_int::<i8>("128"), Err(LiteralError::Range));
        assert_eq!(parse_int::<i8>("-129"), Err(LiteralError::Range));
    }

    #[test]
    fn test_parse_int_bounds() {
        assert_eq!(parse_int::<i8>("-128"), Ok(i8::MIN));
        assert_eq!(parse_int::<i8>("127"), Ok(i8::MAX));
        assert_eq!(
            parse_int::<i128>("-170141183460469231731687303715884105728"),
            Ok(i128::MIN)
        );
        assert_eq!(
            parse_int::<i128>("170141183460469231731687303715884105728"),
            Err(LiteralError::Range)
        );
    }

    #[test]
    fn test_parse_uint() {
        assert_eq!(parse_uint::<u8>("255"), Ok(255));
        assert_eq!(parse_uint::<u8>("0xff"), Ok(255));
        assert_eq!(parse_uint::<u8>("256"), Err(LiteralError::Range));
        assert_eq!(parse_uint::<u32>("-1"), Err(LiteralError::Syntax));
        assert_eq!(parse_uint::<u32>("+1"), Err(LiteralError::Syntax));
        assert_eq!(parse_uint::<u128>(&u128::MAX.to_string()), Ok(u128::MAX));
        assert_eq!(
            parse_uint::<u128>("340282366920938463463374607431768211456"),
            Err(LiteralError::Range)
        );
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float::<f64>("1.5"), Ok(1.5));
        assert_eq!(parse_float::<f64>("-2.5e3"), Ok(-2500.0));
        assert_eq!(parse_float::<f32>(".25"), Ok(0.25));
        assert_eq!(parse_float::<f64>("inf"), Ok(f64::INFINITY));
        assert_eq!(parse_float::<f64>("-Infinity"), Ok(f64::NEG_INFINITY));
        assert!(parse_float::<f64>("NaN").unwrap().is_nan());
        assert_eq!(parse_float::<f32>("1e39"), Err(LiteralError::Range));
        assert_eq!(parse_float::<f64>("1e39"), Ok(1e39));
        assert_eq!(parse_float::<f64>("1_000.0"), Err(LiteralError::Syntax));
        assert_eq!(parse_float::<f64>("abc"), Err(LiteralError::Syntax));
    }

    #[test]
    fn test_parse_bool() {
        for s in &["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool(s), Ok(true));
        }

        for s in &["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool(s), Ok(false));
        }

        for s in &["", "yes", "tRuE", "on", "2"] {
            assert_eq!(parse_bool(s), Err(LiteralError::Syntax));
        }
    }

    proptest! {
        #[test]
        fn prop_split_unescaped_roundtrips(items in prop::collection::vec("[a-z0-9 :.]{1,8}", 1..8)) {
            let joined = items.join(",");
            prop_assert_eq!(split_list(&joined, ',', '\\'), items);
        }

        #[test]
        fn prop_split_escaped_delimiters_stay_in_one_element(parts in prop::collection::vec("[a-z]{1,6}", 1..6)) {
            let source = parts.join("\\,");
            prop_assert_eq!(split_list(&source, ',', '\\'), vec![parts.join(",")]);
        }

        #[test]
        fn prop_parse_int_matches_display(n in any::<i64>()) {
            prop_assert_eq!(parse_int::<i64>(&n.to_string()), Ok(n));
        }

        #[test]
        fn prop_parse_uint_hex(n in any::<u32>()) {
            prop_assert_eq!(parse_uint::<u32>(&format!("0x{:x}", n)), Ok(n));
        }
    }
}
