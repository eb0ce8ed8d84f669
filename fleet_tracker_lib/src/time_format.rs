use chrono::{DateTime, Utc};

/// Short human-readable age of a sample, used for marker popups.
/// Anything older than a day gets an absolute date instead.
pub fn format_relative(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(timestamp).num_seconds().max(0);

    if secs < 60 {
        format!("{} seconds ago", secs)
    } else if secs < 60 * 60 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 24 * 60 * 60 {
        format!("{} hours ago", secs / (60 * 60))
    } else {
        timestamp.format("%d/%m/%Y").to_string()
    }
}
