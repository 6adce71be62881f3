use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::domain::ConversationRecord;
use crate::error::Error;

/// Returns the latest message timestamp in the conversation.
/// ISO-8601 strings from one export share a format, so lexicographic order
/// is chronological order.
pub fn most_recent_timestamp(conversation: &ConversationRecord) -> Option<String> {
    conversation
        .messages
        .iter()
        .map(|m| m.timestamp.as_str())
        .filter(|ts| !ts.is_empty())
        .max()
        .map(str::to_string)
}

/// Checks that a user-supplied date bound is something the exporter can
/// understand. The value is passed through untouched.
pub fn validate_date_bound(value: &str) -> Result<String, Error> {
    let trimmed = value.trim();
    dateparser::parse(trimmed).map_err(|e| Error::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}

/// Parses a timestamp string and converts it to local timezone
/// Supports ISO 8601 with or without offset and plain dates
pub fn format_timestamp_to_local(timestamp_str: &str) -> String {
    if timestamp_str.is_empty() {
        return String::new();
    }

    // e.g. "2025-12-16T10:30:00Z" or "2025-12-16T10:30:00.123+00:00"
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp_str) {
        return dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string();
    }

    // No offset, assume UTC
    if let Ok(naive_dt) = NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%dT%H:%M:%S%.f") {
        let utc_dt = naive_dt.and_utc();
        return utc_dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string();
    }

    // Date only, midnight UTC
    if let Ok(date) = NaiveDate::parse_from_str(timestamp_str, "%Y-%m-%d") {
        if let Some(naive_dt) = date.and_hms_opt(0, 0, 0) {
            let utc_dt = naive_dt.and_utc();
            return utc_dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z").to_string();
        }
    }

    // If parsing fails, return the original string
    timestamp_str.to_string()
}

/// Formats a file modification time for listings
pub fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Size in megabytes with two decimals, as shown in export listings
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;

    fn conversation_with(timestamps: &[&str]) -> ConversationRecord {
        ConversationRecord {
            messages: timestamps
                .iter()
                .map(|ts| Message {
                    timestamp: ts.to_string(),
                    ..Message::default()
                })
                .collect(),
            ..ConversationRecord::default()
        }
    }

    #[test]
    fn test_most_recent_timestamp_empty() {
        assert_eq!(most_recent_timestamp(&ConversationRecord::default()), None);
    }

    #[test]
    fn test_most_recent_timestamp_picks_max_regardless_of_order() {
        let conversation = conversation_with(&[
            "2024-01-01T00:00:00Z",
            "2024-03-05T10:00:00Z",
            "2024-02-01T00:00:00Z",
        ]);
        assert_eq!(
            most_recent_timestamp(&conversation),
            Some("2024-03-05T10:00:00Z".to_string())
        );
    }

    #[test]
    fn test_most_recent_timestamp_ignores_missing_timestamps() {
        let conversation = conversation_with(&["", "2024-01-01T00:00:00Z", ""]);
        assert_eq!(
            most_recent_timestamp(&conversation),
            Some("2024-01-01T00:00:00Z".to_string())
        );
        assert_eq!(most_recent_timestamp(&conversation_with(&["", ""])), None);
    }

    #[test]
    fn test_validate_date_bound_accepts_dates_and_datetimes() {
        assert_eq!(validate_date_bound("2023-01-01").unwrap(), "2023-01-01");
        assert_eq!(
            validate_date_bound(" 2024-06-01T12:00:00Z ").unwrap(),
            "2024-06-01T12:00:00Z"
        );
    }

    #[test]
    fn test_validate_date_bound_rejects_garbage() {
        let err = validate_date_bound("next tuesday-ish").unwrap_err();
        assert!(matches!(err, Error::InvalidDate { .. }));
    }

    #[test]
    fn test_format_timestamp_to_local_empty() {
        assert_eq!(format_timestamp_to_local(""), "");
    }

    #[test]
    fn test_format_timestamp_to_local_rfc3339_with_fraction() {
        let result = format_timestamp_to_local("2025-12-16T10:30:00.123+00:00");
        assert!(result.starts_with("2025-12-1"));
        assert!(result.contains(':') && result.len() > 10);
    }

    #[test]
    fn test_format_timestamp_to_local_iso8601_no_timezone() {
        let result = format_timestamp_to_local("2025-12-16T10:30:00");
        assert!(result.starts_with("2025-12-1"));
        assert!(result.contains(':'));
    }

    #[test]
    fn test_format_timestamp_to_local_date_only() {
        let result = format_timestamp_to_local("2025-12-16");
        assert!(result.starts_with("2025-12-1"));
    }

    #[test]
    fn test_format_timestamp_to_local_invalid_returns_original() {
        let invalid = "not-a-timestamp";
        assert_eq!(format_timestamp_to_local(invalid), invalid);
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0.00 MB");
        assert_eq!(format_megabytes(1024 * 1024 * 3 / 2), "1.50 MB");
    }
}
