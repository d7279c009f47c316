//! Conversion of displayed figures to won.
//!
//! Filings print amounts in display units (`ADECIMAL="-6"` means millions)
//! with thousands separators, and mark negatives with parentheses, a minus
//! sign or the `△`/`▲` triangles. Everything is computed in `i128` and
//! checked; no floating point is involved.

use crate::error::ValueError;

/// Normalizes `raw` to won using the tag's decimal scale.
///
/// A negative scale `d` multiplies by `10^-d`. A zero or positive scale
/// leaves the figure unscaled: a positive `ADECIMAL` states how many
/// fractional digits of a won amount are accurate, so it is not read as
/// `10^d` display units. Fractional digits beyond the scale are rounded
/// half away from zero.
pub fn normalize_value(raw: &str, decimal_scale: i32) -> Result<i64, ValueError> {
    let text = raw.trim();
    if text.is_empty() || text == "-" {
        return Err(ValueError::Blank);
    }

    let overflow = || ValueError::Overflow(text.to_string());
    let invalid = || ValueError::Invalid(text.to_string());

    let (negative, body) = split_sign(text);
    let (mantissa, fraction_digits) = parse_digits(body).ok_or_else(invalid)?;
    let mantissa = mantissa.ok_or_else(overflow)?;

    let scale = decimal_scale.min(0).unsigned_abs();
    let magnitude = if scale >= fraction_digits {
        10i128
            .checked_pow(scale - fraction_digits)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(overflow)?
    } else {
        let divisor = 10i128
            .checked_pow(fraction_digits - scale)
            .ok_or_else(overflow)?;
        let (quotient, remainder) = (mantissa / divisor, mantissa % divisor);
        if remainder >= divisor - remainder {
            quotient + 1
        } else {
            quotient
        }
    };

    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| overflow())
}

/// Splits a leading sign marker or enclosing parentheses off the figure.
fn split_sign(text: &str) -> (bool, &str) {
    if let Some(inner) = text
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return (true, inner.trim());
    }
    for marker in ['-', '\u{2212}', '△', '▲'] {
        if let Some(rest) = text.strip_prefix(marker) {
            return (true, rest.trim());
        }
    }
    (false, text.strip_prefix('+').unwrap_or(text).trim())
}

/// Reads digits with optional separators and one decimal point.
///
/// Returns `None` for anything that is not a number, and `Some((None, _))`
/// when the digits overflow.
fn parse_digits(body: &str) -> Option<(Option<i128>, u32)> {
    let mut mantissa = Some(0i128);
    let mut fraction_digits = 0u32;
    let mut digits = 0usize;
    let mut seen_point = false;

    for ch in body.chars() {
        match ch {
            '0'..='9' => {
                let digit = i128::from(ch.to_digit(10)?);
                mantissa = mantissa
                    .and_then(|m| m.checked_mul(10))
                    .and_then(|m| m.checked_add(digit));
                digits += 1;
                if seen_point {
                    fraction_digits += 1;
                }
            }
            ',' | ' ' if !seen_point => {}
            '.' if !seen_point => seen_point = true,
            _ => return None,
        }
    }

    (digits > 0).then_some((mantissa, fraction_digits))
}
