//! Conversions between decimal values and the EXIF rational string forms
//! ("num/den", and space-separated degree/minute/second triples), plus the
//! small string encoders EXIF text tags need.

use chrono::FixedOffset;

use crate::error::{Result, WriteError};

/// Largest denominator produced when approximating a decimal value.
const MAX_DENOMINATOR: u128 = 1_000_000;

/// Splits non-negative decimal degrees into whole degrees, whole minutes, and
/// fractional seconds. Seconds are rounded to 8 decimal places so that the
/// rational approximation below stays stable across platforms.
pub fn to_dms(degrees: f64) -> (u32, u32, f64) {
    let d = degrees.trunc();
    let m = ((degrees - d) * 60.0).trunc();
    let s = (degrees - d - m / 60.0) * 3600.0;
    let s = (s * 1e8).round() / 1e8;
    (d as u32, m as u32, s)
}

/// Approximates a non-negative decimal as `num/den` with `den` at most
/// 1,000,000, choosing the closest such fraction to the exact binary value.
/// Values too small to distinguish from zero at that precision collapse to
/// `(0, 1)`.
pub fn to_rational(value: f64) -> (u32, u32) {
    if !value.is_finite() || value <= 0.0 {
        return (0, 1);
    }
    if value >= u32::MAX as f64 {
        return (u32::MAX, 1);
    }
    if value <= 0.5 / MAX_DENOMINATOR as f64 {
        return (0, 1);
    }
    let (num, den) = exact_fraction(value);
    if den <= MAX_DENOMINATOR {
        if num <= u128::from(u32::MAX) {
            return (num as u32, den as u32);
        }
        return (value.round() as u32, 1);
    }
    let (p, q) = limit_denominator(num, den, MAX_DENOMINATOR);
    if p > u128::from(u32::MAX) {
        // only reachable for values in the thousands of degrees; whole units
        // are the best a 32-bit numerator can do there
        return (value.round() as u32, 1);
    }
    (p as u32, q as u32)
}

/// Formats a non-negative decimal as an EXIF rational string such as
/// `"350/1"` or `"55221/2500"`.
pub fn rational_string(value: f64) -> String {
    let (num, den) = to_rational(value);
    format!("{num}/{den}")
}

/// Formats non-negative decimal degrees as the three-rational DMS string
/// EXIF expects for GPS coordinates, e.g. `"38/1 53/1 55221/2500"`.
pub fn dms_rational_string(degrees: f64) -> String {
    let (d, m, s) = to_dms(degrees);
    let (num, den) = to_rational(s);
    format!("{d}/1 {m}/1 {num}/{den}")
}

/// Parses a single rational such as `"55221/2500"` (or a bare integer) into
/// numerator and denominator.
pub fn parse_rational(value: &str) -> Result<(u32, u32)> {
    let malformed = || WriteError::MalformedRational(value.to_string());
    let mut parts = value.trim().splitn(2, '/');
    let num = parts
        .next()
        .ok_or_else(malformed)?
        .parse::<u32>()
        .map_err(|_| malformed())?;
    let den = match parts.next() {
        Some(den) => den.parse::<u32>().map_err(|_| malformed())?,
        None => 1,
    };
    if den == 0 {
        return Err(malformed());
    }
    Ok((num, den))
}

/// Evaluates a single rational string as a decimal.
pub fn rational_to_decimal(value: &str) -> Result<f64> {
    let (num, den) = parse_rational(value)?;
    Ok(f64::from(num) / f64::from(den))
}

/// Evaluates a space-separated DMS rational string back into decimal degrees.
pub fn dms_to_decimal(value: &str) -> Result<f64> {
    let mut parts = value.split_whitespace();
    let mut component = |scale: f64| -> Result<f64> {
        let part = parts
            .next()
            .ok_or_else(|| WriteError::MalformedRational(value.to_string()))?;
        Ok(rational_to_decimal(part)? / scale)
    };
    let degrees = component(1.0)?;
    let minutes = component(60.0)?;
    let seconds = component(3600.0)?;
    Ok(degrees + minutes + seconds)
}

/// Encodes a signed decimal as `"units/precision"` against a fixed
/// denominator, plus the sign flag byte (0 non-negative, 1 negative) that
/// pairs with it in tags like `GPSAltitude`/`GPSAltitudeRef`. The magnitude
/// is truncated at the chosen precision, not rounded.
pub fn signed_rational(value: f64, precision: u32) -> (String, u8) {
    let flag = if value < 0.0 { 1 } else { 0 };
    let units = (value.abs() * f64::from(precision)).trunc() as u64;
    (format!("{units}/{precision}"), flag)
}

/// Encodes a compass direction as a millidegree rational, normalizing any
/// real input into `[0, 360)` first; `-10 → "350000/1000"`.
pub fn direction_rational(degrees: f64) -> String {
    let (rational, _) = signed_rational(degrees.rem_euclid(360.0), 1000);
    rational
}

/// Formats a UTC offset as `"+HH:MM"` / `"-HH:MM"`, truncating any
/// sub-minute part toward zero so the sign applies to the whole offset.
pub fn utc_offset_string(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let magnitude = seconds.unsigned_abs();
    let hours = magnitude / 3600;
    let minutes = magnitude % 3600 / 60;
    format!("{sign}{hours:02}:{minutes:02}")
}

/// Escapes a string down to the 7-bit repertoire EXIF ASCII tags hold.
///
/// Printable ASCII passes through; everything else becomes a backslash
/// escape sized to the code point: `\xNN` through U+00FF, `\uNNNN` through
/// U+FFFF, `\UNNNNNNNN` above, with `\\`, `\t`, `\n` and `\r` for the
/// characters those escapes name.
pub fn escape_ascii(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' '..='\u{7e}' => out.push(c),
            _ => {
                let code = u32::from(c);
                if code <= 0xFF {
                    out.push_str(&format!("\\x{code:02x}"));
                } else if code <= 0xFFFF {
                    out.push_str(&format!("\\u{code:04x}"));
                } else {
                    out.push_str(&format!("\\U{code:08x}"));
                }
            }
        }
    }
    out
}

/// The exact fraction a finite positive f64 represents, reduced to lowest
/// terms. Subnormals are far below tag precision and collapse to zero.
fn exact_fraction(value: f64) -> (u128, u128) {
    let bits = value.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7ff) as i64;
    if exponent_bits == 0 {
        return (0, 1);
    }
    let mantissa = (bits & 0x000f_ffff_ffff_ffff) | 0x0010_0000_0000_0000;
    let exponent = exponent_bits - 1075;
    if exponent >= 0 {
        return (u128::from(mantissa) << exponent.min(64), 1);
    }
    let shift = (-exponent) as u32;
    let trailing = mantissa.trailing_zeros().min(shift);
    (
        u128::from(mantissa >> trailing),
        1u128 << (shift - trailing),
    )
}

/// Closest fraction to `num/den` whose denominator does not exceed
/// `max_den`, found by walking the continued-fraction convergents.
fn limit_denominator(num: u128, den: u128, max_den: u128) -> (u128, u128) {
    let (mut n, mut d) = (num, den);
    let (mut p0, mut q0, mut p1, mut q1) = (0u128, 1u128, 1u128, 0u128);
    loop {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max_den {
            break;
        }
        let p2 = p0 + a * p1;
        p0 = p1;
        q0 = q1;
        p1 = p2;
        q1 = q2;
        let r = n - a * d;
        n = d;
        d = r;
    }
    let k = (max_den - q0) / q1;
    let (bp, bq) = (p0 + k * p1, q0 + k * q1);
    // compare |p1/q1 - num/den| against |bp/bq - num/den| without floats
    let err1 = p1 * den;
    let err1 = err1.abs_diff(num * q1);
    let err2 = bp * den;
    let err2 = err2.abs_diff(num * bq);
    if err1 * bq <= err2 * q1 {
        (p1, q1)
    } else {
        (bp, bq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── DMS splitting ────────────────────────────────────────────────

    #[test]
    fn splits_degrees_into_dms() {
        let (d, m, s) = to_dms(38.889469);
        assert_eq!(d, 38);
        assert_eq!(m, 53);
        assert!((s - 22.0884).abs() < 1e-9);
    }

    #[test]
    fn zero_degrees_is_all_zero() {
        assert_eq!(to_dms(0.0), (0, 0, 0.0));
    }

    // ── rational approximation ───────────────────────────────────────

    #[test]
    fn exact_binary_fractions_pass_through() {
        assert_eq!(to_rational(0.5), (1, 2));
        assert_eq!(to_rational(350.0), (350, 1));
        assert_eq!(to_rational(22.25), (89, 4));
    }

    #[test]
    fn one_third_recovers_smallest_fraction() {
        assert_eq!(to_rational(1.0 / 3.0), (1, 3));
    }

    #[test]
    fn zero_and_negatives_collapse() {
        assert_eq!(to_rational(0.0), (0, 1));
        assert_eq!(to_rational(-3.5), (0, 1));
        assert_eq!(to_rational(f64::NAN), (0, 1));
    }

    #[test]
    fn pi_with_small_denominator_limit() {
        let (n, d) = exact_fraction(std::f64::consts::PI);
        assert_eq!(limit_denominator(n, d, 10), (22, 7));
    }

    #[test]
    fn dms_string_matches_exif_form() {
        assert_eq!(dms_rational_string(38.889469), "38/1 53/1 55221/2500");
        assert_eq!(dms_rational_string(0.0), "0/1 0/1 0/1");
    }

    #[test]
    fn dms_string_round_trips_within_tolerance() {
        let encoded = dms_rational_string(38.889469);
        let decoded = dms_to_decimal(&encoded).unwrap();
        assert!((decoded - 38.889469).abs() < 1e-5);
    }

    // ── parsing ──────────────────────────────────────────────────────

    #[test]
    fn parses_single_rationals() {
        assert_eq!(parse_rational("55221/2500").unwrap(), (55221, 2500));
        assert_eq!(parse_rational("38").unwrap(), (38, 1));
        assert!((rational_to_decimal("55221/2500").unwrap() - 22.0884).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_rationals() {
        assert!(parse_rational("x/y").is_err());
        assert!(parse_rational("5/0").is_err());
        assert!(parse_rational("-5/1").is_err());
        assert!(dms_to_decimal("38/1 53/1").is_err());
    }

    // ── altitude and direction ───────────────────────────────────────

    #[test]
    fn altitude_truncates_to_millimeters() {
        assert_eq!(signed_rational(120.4, 1000), ("120400/1000".to_string(), 0));
        assert_eq!(signed_rational(-5.2, 1000), ("5200/1000".to_string(), 1));
        assert_eq!(signed_rational(0.0, 1000), ("0/1000".to_string(), 0));
    }

    #[test]
    fn direction_normalizes_into_the_compass_circle() {
        assert_eq!(direction_rational(15.0), "15000/1000");
        assert_eq!(direction_rational(-10.0), "350000/1000");
        assert_eq!(direction_rational(360.0), "0/1000");
        assert_eq!(direction_rational(725.5), "5500/1000");
    }

    // ── UTC offsets ──────────────────────────────────────────────────

    #[test]
    fn formats_utc_offsets() {
        let east = |s| FixedOffset::east_opt(s).unwrap();
        assert_eq!(utc_offset_string(east(2 * 3600)), "+02:00");
        assert_eq!(utc_offset_string(east(5 * 3600 + 45 * 60)), "+05:45");
        assert_eq!(utc_offset_string(east(-3 * 3600)), "-03:00");
        assert_eq!(utc_offset_string(east(0)), "+00:00");
    }

    #[test]
    fn offset_truncates_toward_zero() {
        // 30 extra seconds either side must not shift the minute
        let east = |s| FixedOffset::east_opt(s).unwrap();
        assert_eq!(utc_offset_string(east(-(3 * 3600 + 30 * 60 + 30))), "-03:30");
        assert_eq!(utc_offset_string(east(3 * 3600 + 30 * 60 + 30)), "+03:30");
    }

    // ── ASCII escaping ───────────────────────────────────────────────

    #[test]
    fn plain_ascii_passes_through() {
        assert_eq!(escape_ascii("GoPro Max 360"), "GoPro Max 360");
        assert_eq!(escape_ascii(""), "");
    }

    #[test]
    fn non_ascii_becomes_backslash_escapes() {
        assert_eq!(escape_ascii("Ainulindal\u{eb}"), "Ainulindal\\xeb");
        assert_eq!(escape_ascii("\u{152}uvre"), "\\u0152uvre");
        assert_eq!(escape_ascii("clef \u{1d11e}"), "clef \\U0001d11e");
    }

    #[test]
    fn controls_and_backslashes_are_escaped() {
        assert_eq!(escape_ascii("a\\b"), "a\\\\b");
        assert_eq!(escape_ascii("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_ascii("\u{7f}"), "\\x7f");
    }
}
