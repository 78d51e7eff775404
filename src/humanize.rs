use chrono::Duration;

const MICROS_PER_SECOND: i128 = 1_000_000;

// Most significant first.
const UNITS: [(&str, &str, i128); 8] = [
    ("year", "years", 365 * 24 * 3600 * MICROS_PER_SECOND),
    ("week", "weeks", 7 * 24 * 3600 * MICROS_PER_SECOND),
    ("day", "days", 24 * 3600 * MICROS_PER_SECOND),
    ("hour", "hours", 3600 * MICROS_PER_SECOND),
    ("minute", "minutes", 60 * MICROS_PER_SECOND),
    ("second", "seconds", MICROS_PER_SECOND),
    ("millisecond", "milliseconds", 1_000),
    ("microsecond", "microseconds", 1),
];

/// Renders `elapsed` using at most `limit` of its most significant non-zero
/// units, e.g. `3 days 2 hours`.
pub fn format_elapsed(elapsed: Duration, limit: usize) -> String {
    let micros = elapsed
        .num_microseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(elapsed.num_milliseconds()) * 1_000);

    let sign = if micros < 0 { "-" } else { "" };
    let mut remaining = micros.abs();

    let mut parts = Vec::new();
    for (singular, plural, size) in UNITS {
        let value = remaining / size;
        remaining %= size;
        if value == 0 {
            continue;
        }
        let unit = if value == 1 { singular } else { plural };
        parts.push(format!("{value} {unit}"));
    }
    parts.truncate(limit);

    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    format!("{sign}{}", parts.join(" "))
}
