//! Lenient float parsing for store fields.

/// Parse the longest leading decimal literal of `s`.
///
/// Leading whitespace is skipped, an optional sign, digits with an optional
/// fraction, and an optional exponent are accepted; anything after that is
/// ignored. `Infinity` is recognised. Returns `None` when no digits lead
/// the string.
///
/// # Example
///
/// ```
/// use image2vec::store::parse_float_prefix;
///
/// assert_eq!(parse_float_prefix(" 0.25"), Some(0.25));
/// assert_eq!(parse_float_prefix("12px"), Some(12.0));
/// assert_eq!(parse_float_prefix("1e-2x"), Some(0.01));
/// assert_eq!(parse_float_prefix(".5"), Some(0.5));
/// assert_eq!(parse_float_prefix("abc"), None);
/// ```
#[must_use]
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        let negative = bytes.first() == Some(&b'-');
        return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY });
    }

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end.min(bytes.len())..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_float_prefix("0"), Some(0.0));
        assert_eq!(parse_float_prefix("-3.5"), Some(-3.5));
        assert_eq!(parse_float_prefix("+2"), Some(2.0));
        assert_eq!(parse_float_prefix("7."), Some(7.0));
    }

    #[test]
    fn test_trailing_garbage() {
        assert_eq!(parse_float_prefix("0.5abc"), Some(0.5));
        assert_eq!(parse_float_prefix("3e"), Some(3.0));
        assert_eq!(parse_float_prefix("3e+"), Some(3.0));
        assert_eq!(parse_float_prefix("1.2.3"), Some(1.2));
    }

    #[test]
    fn test_infinity() {
        assert_eq!(parse_float_prefix("Infinity"), Some(f64::INFINITY));
        assert_eq!(parse_float_prefix("-Infinityx"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_not_numeric() {
        assert_eq!(parse_float_prefix(""), None);
        assert_eq!(parse_float_prefix("   "), None);
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("NaN"), None);
        assert_eq!(parse_float_prefix("x1"), None);
    }
}
