use chrono::{DateTime, Local};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Render a backend timestamp in local time as `HH:MM:SS dd/mm/YYYY`.
/// Anything unparsable is shown as-is.
pub fn format_timestamp(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Local).format("%H:%M:%S %d/%m/%Y").to_string(),
        Err(_) => value.to_string(),
    }
}

/// Human label for a role code
pub fn format_role(role: Option<&str>) -> String {
    match role {
        Some("superadmin") => "Super Admin".to_string(),
        Some("admin") => "Admin".to_string(),
        Some("user") => "Người dùng".to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Thiết bị kho", 8), "Thiết...");
    }

    #[test]
    fn test_format_timestamp_uses_local_time() {
        let utc = "2025-03-01T08:05:09Z";
        let expected = Local
            .from_utc_datetime(
                &DateTime::parse_from_rfc3339(utc).unwrap().naive_utc(),
            )
            .format("%H:%M:%S %d/%m/%Y")
            .to_string();
        assert_eq!(format_timestamp(utc), expected);
    }

    #[test]
    fn test_format_timestamp_passes_through_garbage() {
        assert_eq!(format_timestamp("hôm qua"), "hôm qua");
        assert_eq!(format_timestamp(""), "");
    }

    #[test]
    fn test_format_role() {
        assert_eq!(format_role(Some("superadmin")), "Super Admin");
        assert_eq!(format_role(Some("admin")), "Admin");
        assert_eq!(format_role(Some("user")), "Người dùng");
        assert_eq!(format_role(Some("auditor")), "auditor");
        assert_eq!(format_role(None), "");
    }
}
