//! ISO-8601 duration rendering (`PT1H30M` -> `1 hr 30 min`).

use std::sync::LazyLock;

use regex::Regex;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^P(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("valid duration regex")
});

/// Convert an ISO-8601 duration into human units.
///
/// Minutes past 60 are carried into hours. Values that are not ISO
/// durations (already human text like "20 minutes") are returned trimmed.
pub fn humanize_duration(raw: &str) -> String {
    let raw = raw.trim();
    let Some(caps) = ISO_DURATION.captures(raw) else {
        return raw.to_string();
    };

    let field = |name: &str| -> u64 {
        caps.name(name)
            .and_then(|m| m.as_str().split('.').next())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    let days = field("days");
    let mut hours = field("hours");
    let mut minutes = field("minutes");
    let seconds = field("seconds");

    hours = hours.saturating_add(minutes / 60);
    minutes %= 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{} day", days));
    }
    if hours > 0 {
        parts.push(format!("{} hr", hours));
    }
    if minutes > 0 {
        parts.push(format!("{} min", minutes));
    }
    if seconds > 0 && parts.is_empty() {
        parts.push(format!("{} sec", seconds));
    }

    if parts.is_empty() {
        // "PT0M" and bare "P"
        String::new()
    } else {
        parts.join(" ")
    }
}
