use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_date(ms: i64) -> DateTime<Utc> {
    // from_timestamp_millis returns Option<DateTime<Utc>>
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap())
}

/// Parse a stored date into epoch milliseconds.
///
/// Rows carry either a bare calendar day (`2025-06-01`, interpreted as UTC
/// midnight) or a full RFC 3339 instant; a few legacy rows have a naive
/// `YYYY-MM-DDTHH:MM:SS` form without an offset.
pub fn parse_date_ms(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    // CURRENT_TIMESTAMP default columns use a space separator.
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(day.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}

/// Calendar-day bucket (`YYYY-MM-DD`, UTC) for a stored date string.
pub fn day_of(raw: &str) -> Option<String> {
    parse_date_ms(raw).map(|ms| to_date(ms).format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000); // after 2017
        assert!(a < 4_100_000_000_000); // before year ~2100
    }

    #[test]
    fn to_date_epoch() {
        let d = to_date(0);
        assert_eq!(d.timestamp_millis(), 0);
    }

    #[test]
    fn parses_day_strings_as_utc_midnight() {
        let ms = parse_date_ms("2025-06-01").unwrap();
        assert_eq!(
            to_date(ms).format("%Y-%m-%dT%H:%M:%S").to_string(),
            "2025-06-01T00:00:00"
        );
    }

    #[test]
    fn parses_rfc3339_instants() {
        let ms = parse_date_ms("2025-06-01T12:30:00-04:00").unwrap();
        assert_eq!(day_of("2025-06-01T12:30:00-04:00").unwrap(), "2025-06-01");
        assert_eq!(to_date(ms).format("%H:%M").to_string(), "16:30");
    }

    #[test]
    fn parses_sqlite_current_timestamp_format() {
        let ms = parse_date_ms("2025-06-01 08:15:00").unwrap();
        assert_eq!(day_of("2025-06-01 08:15:00").unwrap(), "2025-06-01");
        assert_eq!(to_date(ms).format("%H:%M").to_string(), "08:15");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date_ms(""), None);
        assert_eq!(parse_date_ms("not-a-date"), None);
        assert_eq!(day_of("  "), None);
    }
}
