use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// `<input type="datetime-local">` value format
pub const FORM_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// e.g. `Jan 2 2006 at 03:04 PM`
pub fn format_time(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%b %-d %Y at %I:%M %p").to_string()
}

/// Parse a form datetime as wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times that
/// do not exist in `tz` are rejected.
pub fn parse_form_time(input: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), FORM_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Human readable distance between `then` and `now`
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let (secs, suffix) = if diff.num_milliseconds() < 0 {
        (-diff.num_seconds(), "from now")
    } else {
        (diff.num_seconds(), "ago")
    };

    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let (count, unit) = match secs {
        0 => return "just now".to_string(),
        s if s < MINUTE => (s, "second"),
        s if s < HOUR => (s / MINUTE, "minute"),
        s if s < DAY => (s / HOUR, "hour"),
        s if s < MONTH => (s / DAY, "day"),
        s if s < YEAR => (s / MONTH, "month"),
        s => (s / YEAR, "year"),
    };

    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} {}", count, unit, plural, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_time_in_timezone() {
        let dt = Utc.with_ymd_and_hms(2006, 1, 2, 20, 4, 5).unwrap();
        assert_eq!(format_time(dt, chrono_tz::America::New_York), "Jan 2 2006 at 03:04 PM");
        assert_eq!(format_time(dt, chrono_tz::UTC), "Jan 2 2006 at 08:04 PM");
    }

    #[test]
    fn test_parse_form_time() {
        let parsed = parse_form_time("2025-07-04T19:30", chrono_tz::America::New_York).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 7, 4, 23, 30, 0).unwrap());
        assert!(parse_form_time("07/04/2025 7:30pm", chrono_tz::UTC).is_none());
        // Skipped by the spring-forward transition
        assert!(parse_form_time("2025-03-09T02:30", chrono_tz::America::New_York).is_none());
    }

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(relative_time(now + Duration::hours(1), now), "1 hour from now");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time(now - Duration::days(65), now), "2 months ago");
        assert_eq!(relative_time(now + Duration::days(800), now), "2 years from now");
    }
}
