use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};

/// Returns the current UNIX time in milliseconds.
///
/// A clock set before the epoch yields 0 instead of panicking; proposal
/// numbering guards against regressions separately.
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// RFC 3339 UTC timestamp used for the informational `timestamp` field.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_millis_non_zero() {
        assert!(current_millis() > 0, "Timestamp should be greater than zero");
    }

    #[test]
    fn test_current_millis_monotonic() {
        let t1 = current_millis();
        let t2 = current_millis();
        // pode ser igual: o relógio pode não avançar entre as chamadas
        assert!(t2 >= t1);
    }

    #[test]
    fn test_utc_timestamp_parses() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
