// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as a stored timestamp string.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Stored timestamp for a provider token that lives `expires_in` seconds from `now`.
pub fn expiry_from_now(now: DateTime<Utc>, expires_in: Option<i64>) -> Option<String> {
    expires_in.map(|secs| format_utc_rfc3339(now + chrono::Duration::seconds(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_from_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            expiry_from_now(now, Some(3600)).as_deref(),
            Some("2026-03-01T13:00:00Z")
        );
        assert_eq!(expiry_from_now(now, None), None);
    }
}
