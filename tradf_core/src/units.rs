//! Duration literals
//!
//! All times inside the engine are plain `f64` milliseconds. Graph files spell
//! durations as `<number><unit>` with `us`, `ms` or `s`.

use crate::error::{TradfError, TradfResult};

/// Parse a duration literal such as `"250us"` or `"1.5ms"` into milliseconds
pub fn parse_duration_ms(literal: &str) -> TradfResult<f64> {
    let trimmed = literal.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| TradfError::InvalidDuration(literal.to_string()))?;

    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| TradfError::InvalidDuration(literal.to_string()))?;

    match unit {
        "us" => Ok(value / 1000.0),
        "ms" => Ok(value),
        "s" => Ok(value * 1000.0),
        _ => Err(TradfError::UnknownUnit {
            literal: literal.to_string(),
            unit: unit.to_string(),
        }),
    }
}

/// Round to 3 decimals
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Render milliseconds as `"<value>ms"`, rounded to 3 decimals
pub fn format_ms(value: f64) -> String {
    let rounded = round3(value);
    // -0.0 prints as "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let mut text = rounded.to_string();
    if rounded.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text.push_str("ms");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration_ms("250us").unwrap(), 0.25);
        assert_eq!(parse_duration_ms("1.5ms").unwrap(), 1.5);
        assert_eq!(parse_duration_ms("2s").unwrap(), 2000.0);
    }

    #[test]
    fn test_unknown_unit() {
        let err = parse_duration_ms("3min").unwrap_err();
        assert!(matches!(err, TradfError::UnknownUnit { ref unit, .. } if unit == "min"));
    }

    #[test]
    fn test_malformed_duration() {
        assert!(matches!(
            parse_duration_ms("12"),
            Err(TradfError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_ms("ms"),
            Err(TradfError::InvalidDuration(_))
        ));
        assert!(matches!(
            parse_duration_ms("1.2.3ms"),
            Err(TradfError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_ms(3.0), "3.0ms");
        assert_eq!(format_ms(2.5), "2.5ms");
        assert_eq!(format_ms(1.23456), "1.235ms");
        assert_eq!(format_ms(0.0004), "0.0ms");
        assert_eq!(format_ms(0.001), "0.001ms");
    }
}
