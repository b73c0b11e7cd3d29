//! Retry-delay extraction from scoring service error payloads.
//!
//! Known shapes, tried in order:
//! - structured JSON: `{"error": {"details": [{"retryDelay": "44s"}]}}`
//! - protobuf text: `retry_delay { seconds: 44 }`
//! - inline JSON fragment inside free text: `"retryDelay": "44s"`
//! - free text: `Please retry after 44 seconds`

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

/// Longest cool-down accepted from a payload; larger hints are clamped.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

static PROTO_DELAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"retry_delay\s*\{\s*seconds:\s*(\d+)").expect("valid regex")
});

static INLINE_DELAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"retry_?delay"\s*:\s*"?(\d+(?:\.\d+)?)s?"?"#).expect("valid regex")
});

static TEXT_DELAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry\s+(?:after|in)\s+(\d+(?:\.\d+)?)\s*(?:s\b|sec|seconds?)?")
        .expect("valid regex")
});

/// Extract the retry delay embedded in an error payload.
pub fn parse_retry_delay(payload: &str) -> Option<Duration> {
    if let Ok(value) = serde_json::from_str::<Value>(payload) {
        if let Some(delay) = find_json_delay(&value) {
            return Some(delay);
        }
    }

    for re in [&*PROTO_DELAY, &*INLINE_DELAY, &*TEXT_DELAY] {
        if let Some(delay) = re
            .captures(payload)
            .and_then(|caps| caps.get(1))
            .and_then(|m| seconds(m.as_str()))
        {
            return Some(delay);
        }
    }

    None
}

/// Whether the payload matches any daily-exhaustion signature.
pub fn is_daily_exhaustion(payload: &str, signatures: &[String]) -> bool {
    let lower = payload.to_lowercase();
    signatures
        .iter()
        .any(|sig| !sig.is_empty() && lower.contains(&sig.to_lowercase()))
}

fn find_json_delay(value: &Value) -> Option<Duration> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                let normalized = key.to_ascii_lowercase().replace('_', "");
                if normalized == "retrydelay" {
                    if let Some(delay) = json_delay_value(v) {
                        return Some(delay);
                    }
                }
            }
            map.values().find_map(find_json_delay)
        }
        Value::Array(items) => items.iter().find_map(find_json_delay),
        _ => None,
    }
}

fn json_delay_value(value: &Value) -> Option<Duration> {
    match value {
        Value::String(s) => seconds(s.trim().trim_end_matches('s')),
        Value::Number(n) => n.as_f64().and_then(|f| seconds(&f.to_string())),
        Value::Object(map) => map.get("seconds").and_then(json_delay_value),
        _ => None,
    }
}

fn seconds(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let capped = secs.min(MAX_RETRY_DELAY.as_secs_f64()).ceil();
    Duration::try_from_secs_f64(capped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_json() {
        let payload = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[
            {"@type":"type.googleapis.com/google.rpc.QuotaFailure"},
            {"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"44s"}]}}"#;
        assert_eq!(parse_retry_delay(payload), Some(Duration::from_secs(44)));
    }

    #[test]
    fn test_proto_text() {
        let payload = "429 Resource exhausted. retry_delay {\n  seconds: 44\n}";
        assert_eq!(parse_retry_delay(payload), Some(Duration::from_secs(44)));
    }

    #[test]
    fn test_inline_json_fragment() {
        let payload = r#"upstream said: {"retryDelay": "12.5s"} try later"#;
        assert_eq!(parse_retry_delay(payload), Some(Duration::from_secs(13)));
    }

    #[test]
    fn test_free_text() {
        assert_eq!(
            parse_retry_delay("Rate limited. Please retry after 30 seconds."),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_delay("please retry in 7s"),
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn test_oversized_delay_is_clamped() {
        assert_eq!(
            parse_retry_delay("Please retry after 99999999999999999999999 seconds"),
            Some(MAX_RETRY_DELAY)
        );
        assert_eq!(
            parse_retry_delay(r#"{"error":{"details":[{"retryDelay":"1e300s"}]}}"#),
            Some(MAX_RETRY_DELAY)
        );
        assert_eq!(parse_retry_delay(r#"{"retryDelay": "-3s"}"#), None);
    }

    #[test]
    fn test_no_delay() {
        assert_eq!(parse_retry_delay("quota exceeded"), None);
        assert_eq!(parse_retry_delay(r#"{"error":{"code":429}}"#), None);
    }

    #[test]
    fn test_daily_signature() {
        let sigs = vec!["perday".to_string(), "daily".to_string()];
        assert!(is_daily_exhaustion(
            "quotaId: GenerateRequestsPerDayPerProjectPerModel-FreeTier",
            &sigs
        ));
        assert!(!is_daily_exhaustion(
            "quotaId: GenerateRequestsPerMinutePerProjectPerModel",
            &sigs
        ));
    }
}
