//! Certificate number rendering and parsing
//!
//! Rendering is literal placeholder substitution. Parsing recovers the
//! sequence from a previously rendered number, first against the active
//! template and then against three positional shapes:
//!
//! ```text
//! {YEAR}-{SEQ}            2024-0007
//! {PREFIX}-{YEAR}-{SEQ}   CERT-2024-0007
//! {SEQ}-{YEAR}            0007-2024
//! ```
//!
//! A number matching none of them parses as sequence `1`. That fallback can
//! reissue a number that already exists; it is kept because changing it would
//! change the numbering already observed by callers.

use regex::Regex;

/// Template used when a request carries no format
pub const DEFAULT_FORMAT: &str = "{YEAR}-{SEQUENTIAL_NUMBER}";

/// Replaced with the four-digit year
pub const YEAR_PLACEHOLDER: &str = "{YEAR}";

/// Replaced with the zero-padded sequence
pub const SEQUENCE_PLACEHOLDER: &str = "{SEQUENTIAL_NUMBER}";

/// Minimum rendered width of the sequence
pub const SEQUENCE_WIDTH: usize = 4;

/// Sequence reported for numbers no known shape recognises
pub const FALLBACK_SEQUENCE: u64 = 1;

/// Render a certificate number
///
/// Empty `prefix`/`suffix` are skipped, so `Some("")` behaves like `None`.
#[must_use]
pub fn render(
    format: &str,
    year: i32,
    sequence: u64,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> String {
    let body = format
        .replace(YEAR_PLACEHOLDER, &format!("{year:04}"))
        .replace(
            SEQUENCE_PLACEHOLDER,
            &format!("{sequence:0width$}", width = SEQUENCE_WIDTH),
        );

    let mut number = String::with_capacity(body.len() + 16);
    if let Some(prefix) = non_empty(prefix) {
        number.push_str(prefix);
        number.push('-');
    }
    number.push_str(&body);
    if let Some(suffix) = non_empty(suffix) {
        number.push('-');
        number.push_str(suffix);
    }
    number
}

/// Recover the sequence from `number` using the positional shapes only
///
/// Returns [`FALLBACK_SEQUENCE`] when no shape matches.
#[must_use]
pub fn extract_sequence_from_number(number: &str, year: i32) -> u64 {
    let year = regex::escape(&format!("{year:04}"));
    let shapes = [
        format!(r"^{year}-(\d+)$"),
        format!(r"^.+-{year}-(\d+)$"),
        format!(r"^(\d+)-{year}$"),
    ];

    for shape in &shapes {
        let Ok(re) = Regex::new(shape) else {
            continue;
        };
        if let Some(sequence) = capture_sequence(&re, number) {
            return sequence;
        }
    }

    tracing::debug!(number, "certificate number matched no known shape, using fallback");
    FALLBACK_SEQUENCE
}

/// Recover the sequence by matching `number` against the exact template
///
/// Returns `None` when the template has no `{SEQUENTIAL_NUMBER}` placeholder
/// or the number was not rendered from it.
#[must_use]
pub fn parse_with_format(
    number: &str,
    format: &str,
    year: i32,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> Option<u64> {
    let escaped_sequence = regex::escape(SEQUENCE_PLACEHOLDER);
    let body = regex::escape(format);
    if !body.contains(&escaped_sequence) {
        return None;
    }

    let body = body
        .replace(&regex::escape(YEAR_PLACEHOLDER), &format!("{year:04}"))
        .replacen(&escaped_sequence, r"(\d+)", 1)
        .replace(&escaped_sequence, r"\d+");

    let mut pattern = String::from("^");
    if let Some(prefix) = non_empty(prefix) {
        pattern.push_str(&regex::escape(prefix));
        pattern.push('-');
    }
    pattern.push_str(&body);
    if let Some(suffix) = non_empty(suffix) {
        pattern.push('-');
        pattern.push_str(&regex::escape(suffix));
    }
    pattern.push('$');

    let re = Regex::new(&pattern).ok()?;
    capture_sequence(&re, number)
}

/// Recover the sequence, preferring the exact template over the shapes
#[must_use]
pub fn recover_sequence(
    number: &str,
    format: &str,
    year: i32,
    prefix: Option<&str>,
    suffix: Option<&str>,
) -> u64 {
    parse_with_format(number, format, year, prefix, suffix)
        .unwrap_or_else(|| extract_sequence_from_number(number, year))
}

fn capture_sequence(re: &Regex, number: &str) -> Option<u64> {
    re.captures(number)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_default_format() {
        assert_eq!(render(DEFAULT_FORMAT, 2024, 1, None, None), "2024-0001");
    }

    #[test]
    fn render_with_prefix_and_suffix() {
        let number = render("CERT-{YEAR}-{SEQUENTIAL_NUMBER}", 2024, 1, Some("CUSTOM"), Some("A"));
        assert_eq!(number, "CUSTOM-CERT-2024-0001-A");
    }

    #[test]
    fn render_skips_empty_affixes() {
        assert_eq!(render(DEFAULT_FORMAT, 2024, 3, Some(""), Some("")), "2024-0003");
    }

    #[test]
    fn render_widens_past_four_digits() {
        assert_eq!(render(DEFAULT_FORMAT, 2024, 12_345, None, None), "2024-12345");
    }

    #[test]
    fn extract_year_first_shape() {
        assert_eq!(extract_sequence_from_number("2024-0042", 2024), 42);
    }

    #[test]
    fn extract_prefixed_shape() {
        assert_eq!(extract_sequence_from_number("CUSTOM-CERT-2024-0009", 2024), 9);
    }

    #[test]
    fn extract_sequence_first_shape() {
        assert_eq!(extract_sequence_from_number("0015-2024", 2024), 15);
    }

    #[test]
    fn extract_falls_back_on_unknown_shape() {
        assert_eq!(extract_sequence_from_number("UNKNOWN-FORMAT", 2024), FALLBACK_SEQUENCE);
        assert_eq!(extract_sequence_from_number("UNKNOWN-FORMAT", 2024), 1);
    }

    #[test]
    fn extract_ignores_other_years() {
        assert_eq!(extract_sequence_from_number("2023-0040", 2024), 1);
    }

    #[test]
    fn parse_with_format_handles_suffix() {
        let seq = parse_with_format("2024-0012-B", DEFAULT_FORMAT, 2024, None, Some("B"));
        assert_eq!(seq, Some(12));
        // positional shapes cannot see through a suffix
        assert_eq!(extract_sequence_from_number("2024-0012-B", 2024), 1);
    }

    #[test]
    fn parse_with_format_rejects_other_templates() {
        assert_eq!(
            parse_with_format("X-0001", "{YEAR}-{SEQUENTIAL_NUMBER}", 2024, None, None),
            None
        );
        assert_eq!(parse_with_format("2024", "{YEAR}", 2024, None, None), None);
    }

    #[test]
    fn parse_with_format_escapes_literals() {
        let template = "No.{YEAR}/{SEQUENTIAL_NUMBER}";
        let seq = parse_with_format("No.2024/0005", template, 2024, None, None);
        assert_eq!(seq, Some(5));
        assert_eq!(parse_with_format("NoX2024/0005", template, 2024, None, None), None);
    }

    #[test]
    fn recover_prefers_template() {
        let template = "{SEQUENTIAL_NUMBER}/{YEAR}";
        assert_eq!(recover_sequence("0007/2024", template, 2024, None, None), 7);
        assert_eq!(recover_sequence("2024-0007", template, 2024, None, None), 7);
    }
}
