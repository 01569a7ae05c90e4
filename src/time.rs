//! Time related utils.

use chrono::NaiveDateTime;
use chrono::Utc;

use crate::{Error, Result};

/// The datetime used by cloudcall, always in UTC.
pub type DateTime = chrono::DateTime<Utc>;

/// Return the current UTC time.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into date: `20220301`
pub fn format_date(t: DateTime) -> String {
    t.format("%Y%m%d").to_string()
}

/// Format time into ISO8601: `20220313T072004Z`
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Format time into ISO8601 with separators: `2022-03-13T07:20:04Z`
///
/// Query-protocol `Timestamp` parameters use this shape.
pub fn format_timestamp(t: DateTime) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Format time into http date: `Sun, 06 Nov 1994 08:49:37 GMT`
///
/// ## Note
///
/// HTTP date is slightly different from RFC2822.
///
/// - Timezone is fixed to GMT.
/// - Day must be 2 digit.
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a fixed-length `20220313T072004Z` datetime.
///
/// The input must be exactly 16 characters; anything else is rejected so a
/// truncated date header never produces a silently wrong signing time.
pub fn parse_iso8601(s: &str) -> Result<DateTime> {
    if s.len() != 16 {
        return Err(Error::auth_config(format!(
            "date `{s}` is not a 16-character ISO8601 timestamp"
        )));
    }

    let t = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .map_err(|e| Error::auth_config(format!("date `{s}` is invalid")).with_source(e))?;
    Ok(t.and_utc())
}

/// Parse an RFC1123/RFC2822 `date` header value.
pub fn parse_http_date(s: &str) -> Result<DateTime> {
    let t = chrono::DateTime::parse_from_rfc2822(s)
        .map_err(|e| Error::auth_config(format!("date `{s}` is not a valid http date")).with_source(e))?;
    Ok(t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed() -> DateTime {
        Utc.with_ymd_and_hms(2022, 3, 13, 7, 20, 4).unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(fixed()), "20220313");
    }

    #[test]
    fn test_format_iso8601() {
        assert_eq!(format_iso8601(fixed()), "20220313T072004Z");
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(format_http_date(fixed()), "Sun, 13 Mar 2022 07:20:04 GMT");
    }

    #[test]
    fn test_parse_iso8601_roundtrip() {
        assert_eq!(parse_iso8601("20220313T072004Z").unwrap(), fixed());
    }

    #[test]
    fn test_parse_iso8601_rejects_wrong_length() {
        assert!(parse_iso8601("20220313T072004").is_err());
        assert!(parse_iso8601("").is_err());
    }

    #[test]
    fn test_parse_http_date() {
        assert_eq!(
            parse_http_date("Sun, 13 Mar 2022 07:20:04 GMT").unwrap(),
            fixed()
        );
    }
}
