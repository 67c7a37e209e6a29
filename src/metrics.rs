//! Turning decoded responses into metric keys and samples.

use chrono::{TimeZone, Utc};

use crate::client::decode::{Record, Scalar};
use crate::error::Error;
use crate::MetricSample;

/// Statistics batsd derives for every timer, in the order they are listed.
pub const TIMER_SUFFIXES: [&str; 6] = ["mean", "min", "max", "upper_90", "stddev", "count"];

/// Returns `true` for keys batsd stores as timers.
pub fn is_timer(key: &str) -> bool {
    key.starts_with("timer")
}

/// Expands every timer key into its six `<key>:<suffix>` statistics.
///
/// Non-timer keys pass through. Order is preserved, with each timer's
/// derived keys inserted where the timer key was.
pub fn expand_timer_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut expanded = Vec::new();
    for key in keys {
        if is_timer(&key) {
            expanded.extend(TIMER_SUFFIXES.iter().map(|suffix| format!("{}:{}", key, suffix)));
        } else {
            expanded.push(key);
        }
    }
    expanded
}

/// Converts one server record of `metric` into a [`MetricSample`].
///
/// `timestamp` may be an integer, a float (truncated toward zero) or a
/// numeric string; `value` may be any number or numeric string.
pub fn sample_from_record(metric: &str, record: &Record) -> Result<MetricSample, Error> {
    let malformed = |field: &'static str, raw: &Scalar| Error::MalformedSample {
        metric: metric.to_string(),
        field,
        raw: raw.to_string(),
    };

    let timestamp = epoch_seconds(&record.timestamp)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| malformed("timestamp", &record.timestamp))?;
    let value = float_value(&record.value).ok_or_else(|| malformed("value", &record.value))?;

    Ok(MetricSample { timestamp, value })
}

/// Converts every record of `metric`, stopping at the first malformed one.
pub fn samples_from_records(metric: &str, records: &[Record]) -> Result<Vec<MetricSample>, Error> {
    records
        .iter()
        .map(|record| sample_from_record(metric, record))
        .collect()
}

fn epoch_seconds(scalar: &Scalar) -> Option<i64> {
    match scalar {
        Scalar::Int(i) => Some(*i),
        Scalar::Float(x) => truncate(*x),
        Scalar::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
    }
}

fn float_value(scalar: &Scalar) -> Option<f64> {
    match scalar {
        Scalar::Int(i) => Some(*i as f64),
        Scalar::Float(x) => Some(*x),
        Scalar::Text(s) => s.trim().parse::<f64>().ok(),
    }
}

fn truncate(x: f64) -> Option<i64> {
    // `as` saturates, so bound-check first.
    if x.is_finite() && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Some(x.trunc() as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn record(timestamp: Scalar, value: Scalar) -> Record {
        Record { timestamp, value }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn timer_key_expands_in_place() {
        let keys = vec!["a".to_string(), "timer.x".to_string(), "b".to_string()];
        assert_eq!(
            expand_timer_keys(keys),
            vec![
                "a",
                "timer.x:mean",
                "timer.x:min",
                "timer.x:max",
                "timer.x:upper_90",
                "timer.x:stddev",
                "timer.x:count",
                "b",
            ]
        );
    }

    #[test]
    fn non_timer_keys_pass_through() {
        let keys = vec!["gauges:cpu".to_string(), "counters:hits".to_string()];
        assert_eq!(expand_timer_keys(keys.clone()), keys);
    }

    #[test]
    fn timer_prefix_must_be_at_start() {
        assert!(is_timer("timers:latency"));
        assert!(!is_timer("gauges:timer"));
        assert!(!is_timer("Timer"));
    }

    #[test]
    fn empty_keys_expand_to_empty() {
        assert!(expand_timer_keys(Vec::new()).is_empty());
    }

    #[test]
    fn integer_timestamp_and_string_value() {
        let rec = record(Scalar::Int(1000), Scalar::Text("1.5".into()));
        let sample = sample_from_record("m", &rec).expect("should convert");
        assert_eq!(sample.timestamp, at(1000));
        assert_eq!(sample.value, 1.5);
    }

    #[test]
    fn string_timestamp_and_integer_value() {
        let rec = record(Scalar::Text("1060".into()), Scalar::Int(7));
        let sample = sample_from_record("m", &rec).expect("should convert");
        assert_eq!(sample.timestamp, at(1060));
        assert_eq!(sample.value, 7.0);
    }

    #[test]
    fn fractional_timestamp_truncates() {
        let rec = record(Scalar::Float(1000.9), Scalar::Float(0.5));
        let sample = sample_from_record("m", &rec).expect("should convert");
        assert_eq!(sample.timestamp, at(1000));

        let rec = record(Scalar::Text("1000.9".into()), Scalar::Int(0));
        let sample = sample_from_record("m", &rec).expect("should convert");
        assert_eq!(sample.timestamp, at(1000));
    }

    #[test]
    fn unparsable_value_is_malformed() {
        let err = sample_from_record("m", &record(Scalar::Int(1000), Scalar::Text("n/a".into())))
            .expect_err("should reject");
        match err {
            Error::MalformedSample { metric, field, raw } => {
                assert_eq!(metric, "m");
                assert_eq!(field, "value");
                assert_eq!(raw, "\"n/a\"");
            }
            other => panic!("expected MalformedSample, got: {other:?}"),
        }
    }

    #[test]
    fn non_finite_timestamp_is_malformed() {
        let err = sample_from_record("m", &record(Scalar::Float(f64::INFINITY), Scalar::Int(1)))
            .expect_err("should reject");
        assert!(matches!(err, Error::MalformedSample { field: "timestamp", .. }));
    }

    #[test]
    fn samples_preserve_order() {
        let records = vec![
            record(Scalar::Int(3), Scalar::Int(30)),
            record(Scalar::Int(1), Scalar::Int(10)),
            record(Scalar::Int(2), Scalar::Int(20)),
        ];
        let samples = samples_from_records("m", &records).expect("should convert");
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![30.0, 10.0, 20.0]);
    }
}
