//! Duration normalization
//!
//! The backend reports durations in different units depending on the payload:
//! `sessions_list` carries milliseconds, `session_details` carries Go
//! `time.Duration` nanoseconds, and some older metadata stores the Go
//! string form (`"1m30.5s"`). Everything is folded into seconds here so that
//! callers never need to know which authority produced the value.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Values above this are nanoseconds
const NANOS_THRESHOLD: f64 = 1e11;
/// Values above this (and below `NANOS_THRESHOLD`) are milliseconds
const MILLIS_THRESHOLD: f64 = 1e6;

/// A raw duration as it appears on the wire: either a number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Number(f64),
    Text(String),
}

impl Default for DurationValue {
    fn default() -> Self {
        DurationValue::Number(0.0)
    }
}

impl DurationValue {
    /// Normalized value in seconds
    pub fn seconds(&self) -> f64 {
        to_seconds(self)
    }
}

impl From<f64> for DurationValue {
    fn from(value: f64) -> Self {
        DurationValue::Number(value)
    }
}

impl From<&str> for DurationValue {
    fn from(value: &str) -> Self {
        DurationValue::Text(value.to_string())
    }
}

/// Convert a duration of unknown unit to seconds
pub fn to_seconds(value: &DurationValue) -> f64 {
    match value {
        DurationValue::Number(n) => number_to_seconds(*n),
        DurationValue::Text(s) => str_to_seconds(s),
    }
}

/// A duration the payload defines as milliseconds (`sessions_list` entries)
///
/// Compound strings still carry their own units.
pub fn millis_to_seconds(value: &DurationValue) -> f64 {
    match value {
        DurationValue::Number(n) => sanitize(*n / 1e3),
        DurationValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => sanitize(n / 1e3),
            Err(_) => str_to_seconds(s),
        },
    }
}

/// Numeric branch: magnitude decides the unit
pub fn number_to_seconds(value: f64) -> f64 {
    let seconds = if value > NANOS_THRESHOLD {
        value / 1e9
    } else if value > MILLIS_THRESHOLD {
        value / 1e3
    } else {
        value
    };
    sanitize(seconds)
}

/// String branch: plain number first, then compound `<number><unit>` tokens
pub fn str_to_seconds(value: &str) -> f64 {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return number_to_seconds(n);
    }

    // Go writes negative durations with one leading sign: "-1m30s"
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed),
    };

    let total: f64 = token_regex()
        .captures_iter(body)
        .filter_map(|caps| {
            let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
            let scale = match caps.get(2)?.as_str() {
                "ns" => 1e-9,
                "us" | "µs" | "μs" => 1e-6,
                "ms" => 1e-3,
                "s" => 1.0,
                "m" => 60.0,
                "h" => 3600.0,
                _ => return None,
            };
            Some(amount * scale)
        })
        .sum();

    sanitize(sign * total)
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    // "ms" must be tried before "m" and "s"
    TOKEN.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(ns|us|µs|μs|ms|s|m|h)").expect("valid duration regex")
    })
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_numeric_units() {
        // Go time.Duration for 20 minutes
        assert!(approx(number_to_seconds(1_200_000_000_000.0), 1200.0));
        // sessions_list milliseconds for ~20 minutes
        assert!(approx(number_to_seconds(1_220_666.0), 1220.666));
        // already seconds
        assert!(approx(number_to_seconds(42.5), 42.5));
    }

    #[test]
    fn test_non_positive_and_non_finite() {
        assert_eq!(number_to_seconds(0.0), 0.0);
        assert_eq!(number_to_seconds(-5.0), 0.0);
        assert_eq!(number_to_seconds(f64::NAN), 0.0);
        assert_eq!(number_to_seconds(f64::INFINITY), 0.0);
        assert_eq!(str_to_seconds("garbage"), 0.0);
        assert_eq!(str_to_seconds(""), 0.0);
    }

    #[test]
    fn test_numeric_strings() {
        assert!(approx(str_to_seconds("90"), 90.0));
        assert!(approx(str_to_seconds(" 5000000 "), 5000.0));
        assert!(approx(str_to_seconds("300000000000"), 300.0));
    }

    #[test]
    fn test_compound_strings() {
        assert!(approx(str_to_seconds("1h2m3.5s"), 3723.5));
        assert!(approx(str_to_seconds("1m30s"), 90.0));
        assert!(approx(str_to_seconds("500ms"), 0.5));
        assert!(approx(str_to_seconds("1.5µs"), 1.5e-6));
        assert!(approx(str_to_seconds("250us"), 2.5e-4));
        assert!(approx(str_to_seconds("100ns"), 1e-7));
        // trailing junk is ignored
        assert!(approx(str_to_seconds("2m10s and then some"), 130.0));
    }

    #[test]
    fn test_known_milliseconds() {
        // a 5 minute session would read as 300000 s through the magnitude rule
        assert!(approx(millis_to_seconds(&DurationValue::Number(300_000.0)), 300.0));
        assert!(approx(millis_to_seconds(&DurationValue::Number(999.0)), 0.999));
        assert!(approx(millis_to_seconds(&DurationValue::from("65000")), 65.0));
        assert!(approx(millis_to_seconds(&DurationValue::from("1m5s")), 65.0));
        assert_eq!(millis_to_seconds(&DurationValue::Number(-10.0)), 0.0);
    }

    #[test]
    fn test_negative_compound_strings() {
        assert_eq!(str_to_seconds("-5s"), 0.0);
        assert_eq!(str_to_seconds("-1m30s"), 0.0);
        assert_eq!(str_to_seconds(" -250ms"), 0.0);
        assert_eq!(str_to_seconds("-90"), 0.0);
    }

    #[test]
    fn test_round_trip_through_seconds_string() {
        let inputs = [
            DurationValue::Number(3_600_000_000_000.0), // ns
            DurationValue::Number(45_000_000.0),        // ms
            DurationValue::Number(12.25),               // s
            DurationValue::from("1h15m"),
            DurationValue::from("750ms"),
        ];

        for input in inputs {
            let seconds = to_seconds(&input);
            let again = to_seconds(&DurationValue::Text(format!("{}s", seconds)));
            assert!(
                approx(seconds, again),
                "{:?}: {} != {}",
                input,
                seconds,
                again
            );
        }
    }

    #[test]
    fn test_deserialize_untagged() {
        let n: DurationValue = serde_json::from_str("1220666").unwrap();
        assert!(approx(n.seconds(), 1220.666));
        let s: DurationValue = serde_json::from_str("\"2m\"").unwrap();
        assert!(approx(s.seconds(), 120.0));
    }
}
