//! Duration strings such as `500ms`, `2s`, `1.5m`, `1h`

use regex::Regex;
use std::sync::OnceLock;

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(\d+(?:\.\d+)?|\.\d+)\s*(ms|s|m|h)?\s*$").ok())
        .as_ref()
}

fn to_millis(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Milliseconds described by `text`; a bare number means milliseconds.
/// Anything unparsable yields 0.
pub fn parse_duration(text: &str) -> u64 {
    let captures = duration_pattern().and_then(|p| p.captures(text));
    let Some(captures) = captures else {
        return text.trim().parse::<f64>().map(to_millis).unwrap_or(0);
    };
    let amount: f64 = match captures[1].parse() {
        Ok(n) => n,
        Err(_) => return 0,
    };
    let factor = match captures.get(2).map(|m| m.as_str()) {
        Some("s") => 1_000.0,
        Some("m") => 60_000.0,
        Some("h") => 3_600_000.0,
        _ => 1.0,
    };
    to_millis(amount * factor)
}
