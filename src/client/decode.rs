//! Response decoding.
//!
//! The executor reads one raw line per command and hands it to a
//! [`ResponseDecoder`]. The default [`JsonDecoder`] returns `ping` responses
//! as plain text and parses everything else as JSON of the shape the command
//! expects.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::client::command::Command;

/// A decoded server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Plain text, newline stripped (`ping`).
    Text(String),
    /// Metric keys (`available`).
    Keys(Vec<String>),
    /// Records keyed by metric name (`values`). Holds at most the requested
    /// metric; a `null` entry counts as absent and other keys are ignored.
    Series(HashMap<String, Vec<Record>>),
}

/// One datapoint as sent by the server, before conversion to a sample.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    /// Epoch seconds, as a number or numeric string.
    pub timestamp: Scalar,
    /// Sample value, as a number or numeric string.
    pub value: Scalar,
}

/// A JSON field the server may send either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integral JSON number.
    Int(i64),
    /// Fractional (or out-of-range integral) JSON number.
    Float(f64),
    /// JSON string.
    Text(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// The response line could not be decoded for the command that was sent.
#[derive(Error, Debug)]
#[error("cannot decode response to '{command}': {source}")]
pub struct DecodeError {
    /// Wire line of the command.
    pub command: String,
    /// Underlying JSON error.
    #[source]
    pub source: serde_json::Error,
}

/// Turns a raw response line into a [`Response`].
pub trait ResponseDecoder: Send + Sync {
    /// Decodes `line`, the response read for `command`.
    fn decode(&self, command: &Command, line: &str) -> Result<Response, DecodeError>;
}

/// Decoder for the stock batsd wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl ResponseDecoder for JsonDecoder {
    fn decode(&self, command: &Command, line: &str) -> Result<Response, DecodeError> {
        let wrap = |source| DecodeError {
            command: command.to_string(),
            source,
        };

        match command {
            Command::Ping => Ok(Response::Text(
                line.trim_end_matches(&['\r', '\n'][..]).to_string(),
            )),
            Command::Available => serde_json::from_str(line).map(Response::Keys).map_err(wrap),
            Command::Values { metric, .. } => {
                let mut object: HashMap<String, serde_json::Value> =
                    serde_json::from_str(line).map_err(wrap)?;
                let mut series: HashMap<String, Vec<Record>> = HashMap::new();
                match object.remove(metric) {
                    None | Some(serde_json::Value::Null) => {}
                    Some(records) => {
                        let records: Vec<Record> =
                            serde_json::from_value(records).map_err(wrap)?;
                        series.insert(metric.clone(), records);
                    }
                }
                Ok(Response::Series(series))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn values_cmd() -> Command {
        let t = Utc.timestamp_opt(0, 0).single().expect("valid timestamp");
        Command::values("m", t, t).expect("valid metric")
    }

    #[test]
    fn ping_strips_trailing_newline() {
        let resp = JsonDecoder.decode(&Command::Ping, "pong\n").expect("ping decodes");
        assert_eq!(resp, Response::Text("pong".to_string()));
    }

    #[test]
    fn ping_strips_crlf() {
        let resp = JsonDecoder.decode(&Command::Ping, "PONG\r\n").expect("ping decodes");
        assert_eq!(resp, Response::Text("PONG".to_string()));
    }

    #[test]
    fn ping_is_not_parsed_as_json() {
        let resp = JsonDecoder.decode(&Command::Ping, "{not json\n").expect("ping decodes");
        assert_eq!(resp, Response::Text("{not json".to_string()));
    }

    #[test]
    fn available_decodes_string_array() {
        let resp = JsonDecoder
            .decode(&Command::Available, "[\"a\",\"timer.x\"]\n")
            .expect("array decodes");
        assert_eq!(
            resp,
            Response::Keys(vec!["a".to_string(), "timer.x".to_string()])
        );
    }

    #[test]
    fn available_rejects_object() {
        let err = JsonDecoder
            .decode(&Command::Available, "{\"a\": 1}\n")
            .expect_err("object is the wrong shape");
        assert_eq!(err.command, "available");
    }

    #[test]
    fn available_rejects_garbage() {
        assert!(JsonDecoder.decode(&Command::Available, "oops\n").is_err());
    }

    #[test]
    fn values_decodes_mixed_scalar_records() {
        let line =
            r#"{"m": [{"timestamp": 1000, "value": "1.5"}, {"timestamp": "1060", "value": 2}]}"#;
        let resp = JsonDecoder.decode(&values_cmd(), line).expect("object decodes");
        let Response::Series(series) = resp else {
            panic!("expected Series");
        };
        let records = &series["m"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, Scalar::Int(1000));
        assert_eq!(records[0].value, Scalar::Text("1.5".to_string()));
        assert_eq!(records[1].timestamp, Scalar::Text("1060".to_string()));
        assert_eq!(records[1].value, Scalar::Int(2));
    }

    #[test]
    fn values_decodes_float_value() {
        let line = r#"{"m": [{"timestamp": 1000, "value": 0.25}]}"#;
        let Response::Series(series) = JsonDecoder.decode(&values_cmd(), line).expect("decodes")
        else {
            panic!("expected Series");
        };
        assert_eq!(series["m"][0].value, Scalar::Float(0.25));
    }

    #[test]
    fn values_allows_missing_metric_key() {
        // Absence of the key is a query-level concern, not a decode failure.
        let resp = JsonDecoder.decode(&values_cmd(), "{}\n").expect("empty object decodes");
        assert_eq!(resp, Response::Series(HashMap::new()));
    }

    #[test]
    fn values_null_entry_is_absent() {
        let resp = JsonDecoder
            .decode(&values_cmd(), "{\"m\": null}\n")
            .expect("null entry decodes");
        assert_eq!(resp, Response::Series(HashMap::new()));
    }

    #[test]
    fn values_ignores_unrelated_keys() {
        let line = r#"{"m": [{"timestamp": 1, "value": 2}], "meta": 5, "other": null}"#;
        let Response::Series(series) = JsonDecoder.decode(&values_cmd(), line).expect("decodes")
        else {
            panic!("expected Series");
        };
        assert_eq!(series.len(), 1);
        assert_eq!(series["m"][0].value, Scalar::Int(2));
    }

    #[test]
    fn values_rejects_non_object() {
        assert!(JsonDecoder.decode(&values_cmd(), "[1, 2]\n").is_err());
    }

    #[test]
    fn values_rejects_record_without_value() {
        let line = r#"{"m": [{"timestamp": 1000}]}"#;
        assert!(JsonDecoder.decode(&values_cmd(), line).is_err());
    }
}
