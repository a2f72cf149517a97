//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(in)\s+)?(\d+)\s+(minute|hour|day|week)s?(?:\s+(ago))?$")
        .expect("relative time regex is valid")
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either RFC 3339 or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Past: "2 hours ago", "30 minutes ago", "1 day ago"
/// - Future: "in 2 hours", "in 45 minutes", "in 1 week"
/// - "now"
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

/// [`parse_datetime`] with an explicit reference instant.
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    let invalid = || {
        anyhow::anyhow!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., 'in 2 hours', '30 minutes ago')"
        )
    };
    let caps = RELATIVE_TIME_RE.captures(s).ok_or_else(invalid)?;
    let future = caps.get(1).is_some();
    let past = caps.get(4).is_some();
    if future == past {
        return Err(invalid());
    }

    let n: i64 = caps[2]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[3] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[3]);
    }

    let duration = Duration::minutes(n * minutes_per_unit);
    Ok(if future { now + duration } else { now - duration })
}

/// Formats an instant as `YYYY-MM-DD HH:MM` in the given offset.
pub fn format_local(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Truncates by characters, not bytes, so multi-byte names never split.
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        format!("{}...", value.chars().take(width.saturating_sub(3)).collect::<String>())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_datetime_at("2030-01-15T12:30:00+02:00", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2030, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn parses_relative_past_and_future() {
        assert_eq!(
            parse_datetime_at("2 hours ago", now()).unwrap(),
            now() - Duration::hours(2)
        );
        assert_eq!(
            parse_datetime_at("in 45 minutes", now()).unwrap(),
            now() + Duration::minutes(45)
        );
        assert_eq!(
            parse_datetime_at("in 1 day", now()).unwrap(),
            now() + Duration::days(1)
        );
        assert_eq!(parse_datetime_at("now", now()).unwrap(), now());
    }

    #[test]
    fn rejects_ambiguous_or_unknown_input() {
        assert!(parse_datetime_at("in 2 hours ago", now()).is_err());
        assert!(parse_datetime_at("2 hours", now()).is_err());
        assert!(parse_datetime_at("tomorrow", now()).is_err());
        assert!(parse_datetime_at("in 2000000 weeks", now()).is_err());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Morning run", 20), "Morning run");
        assert_eq!(truncate("Schwimmen im Freibad über Mittag", 12), "Schwimmen...");
    }

    #[test]
    fn truncate_to_narrow_width() {
        assert_eq!(truncate("Rowing", 2), "...");
        assert_eq!(truncate("Rowing", 0), "...");
        assert_eq!(truncate("", 0), "");
    }
}
