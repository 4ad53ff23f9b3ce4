use chrono::{DateTime, Local};

/// Format a stored RFC 3339 timestamp in local time for display.
/// Anything that does not parse is shown as stored.
pub fn format_timestamp(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// Truncate to `max_chars` characters, adding an ellipsis if needed
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars == 0 {
        String::new()
    } else {
        let kept: String = s.chars().take(max_chars - 1).collect();
        format!("{}…", kept)
    }
}
