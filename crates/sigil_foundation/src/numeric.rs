//! Numeric string recognition and number formatting.

#![allow(clippy::cast_precision_loss)]

/// A parsed number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Integral value that fits in 64 bits.
    Int(i64),
    /// Any other numeric value.
    Float(f64),
}

impl Number {
    /// Returns the value as a float.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(f) => f,
        }
    }
}

/// How much of a string is numeric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Numeric {
    /// The whole string is a number, optionally padded with whitespace.
    Whole(Number),
    /// A number followed by other characters (`"12abc"`).
    Leading(Number),
    /// No numeric prefix at all.
    NonNumeric,
}

const WHITESPACE: &[char] = &[' ', '\t', '\n', '\r', '\x0b', '\x0c'];

/// Classifies a string as numeric, leading-numeric, or non-numeric.
#[must_use]
pub fn classify(s: &str) -> Numeric {
    let trimmed = s.trim_start_matches(WHITESPACE);
    let bytes = trimmed.as_bytes();
    let mut pos = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }
    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = pos - int_start;

    let mut is_float = false;
    let mut frac_digits = 0;
    if pos < bytes.len() && bytes[pos] == b'.' {
        let mut probe = pos + 1;
        while probe < bytes.len() && bytes[probe].is_ascii_digit() {
            probe += 1;
        }
        frac_digits = probe - pos - 1;
        if int_digits > 0 || frac_digits > 0 {
            is_float = true;
            pos = probe;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return Numeric::NonNumeric;
    }

    if pos < bytes.len() && matches!(bytes[pos], b'e' | b'E') {
        let mut probe = pos + 1;
        if probe < bytes.len() && matches!(bytes[probe], b'+' | b'-') {
            probe += 1;
        }
        let exp_start = probe;
        while probe < bytes.len() && bytes[probe].is_ascii_digit() {
            probe += 1;
        }
        if probe > exp_start {
            is_float = true;
            pos = probe;
        }
    }

    let text = &trimmed[..pos];
    let number = if is_float {
        Number::Float(text.parse().unwrap_or(0.0))
    } else {
        text.parse::<i64>()
            .map_or_else(|_| Number::Float(text.parse().unwrap_or(0.0)), Number::Int)
    };

    if trimmed[pos..].trim_end_matches(WHITESPACE).is_empty() {
        Numeric::Whole(number)
    } else {
        Numeric::Leading(number)
    }
}

/// Parses a string that is numeric in its entirety.
#[must_use]
pub fn parse_numeric(s: &str) -> Option<Number> {
    match classify(s) {
        Numeric::Whole(n) => Some(n),
        _ => None,
    }
}

/// Returns true if the whole string is numeric.
#[must_use]
pub fn is_numeric(s: &str) -> bool {
    parse_numeric(s).is_some()
}

/// Formats a float the way string conversion renders it.
///
/// Uses the shortest representation that round-trips, drops the fraction of
/// integral values, and switches to exponent notation outside
/// `[1e-4, 1e15)`.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let magnitude = f.abs();
    if (1e-4..1e15).contains(&magnitude) {
        return format!("{f}");
    }

    let sci = format!("{f:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let mantissa = if mantissa.contains('.') {
        mantissa.to_string()
    } else {
        format!("{mantissa}.0")
    };
    if let Some(negative) = exponent.strip_prefix('-') {
        format!("{mantissa}E-{negative}")
    } else {
        format!("{mantissa}E+{exponent}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_whole_numbers() {
        assert_eq!(classify("42"), Numeric::Whole(Number::Int(42)));
        assert_eq!(classify("  -7 "), Numeric::Whole(Number::Int(-7)));
        assert_eq!(classify("1.5"), Numeric::Whole(Number::Float(1.5)));
        assert_eq!(classify(".5"), Numeric::Whole(Number::Float(0.5)));
        assert_eq!(classify("1e3"), Numeric::Whole(Number::Float(1000.0)));
        assert_eq!(classify("+3"), Numeric::Whole(Number::Int(3)));
    }

    #[test]
    fn classify_leading_and_non_numeric() {
        assert_eq!(classify("12abc"), Numeric::Leading(Number::Int(12)));
        assert_eq!(classify("1e"), Numeric::Leading(Number::Int(1)));
        assert_eq!(classify("php"), Numeric::NonNumeric);
        assert_eq!(classify(""), Numeric::NonNumeric);
        assert_eq!(classify("."), Numeric::NonNumeric);
        assert_eq!(classify("-"), Numeric::NonNumeric);
        assert_eq!(classify("0x1A"), Numeric::Leading(Number::Int(0)));
    }

    #[test]
    fn integer_overflow_becomes_float() {
        assert_eq!(
            classify("99999999999999999999"),
            Numeric::Whole(Number::Float(1e20))
        );
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e100), "1.0E+100");
        assert_eq!(format_float(1.5e-7), "1.5E-7");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NAN), "NAN");
        assert_eq!(format_float(0.0), "0");
    }
}
