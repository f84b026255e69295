// src/config/duration.rs

use std::time::Duration;

/// Parse a config duration: an integer followed by `ms`, `s`, `m` or `h`
/// (case-insensitive), e.g. `"500ms"` or `"5m"`.
///
/// Values that do not fit in a `Duration` are rejected rather than wrapped.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("'{s}' has no unit (use ms, s, m or h)"))?;
    let (digits, unit) = s.split_at(split);
    if digits.is_empty() {
        return Err(format!("'{s}' does not start with a number"));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|e| format!("'{digits}' is not a valid amount: {e}"))?;

    let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(amount)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => return Err(format!("unknown unit '{other}' (use ms, s, m or h)")),
    };
    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("'{s}' is too large"))
}
