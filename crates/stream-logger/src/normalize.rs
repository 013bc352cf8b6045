// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion of caller-supplied log input into canonical [`LogRecord`]s.
//!
//! | input                                   | record                                   |
//! |-----------------------------------------|------------------------------------------|
//! | single string                           | `{message: string, timestamp: default}`  |
//! | single non-string value                 | `{message: json(value), ...}`            |
//! | array element with message + timestamp  | passed through                           |
//! | array element with message only         | stamped with the default timestamp       |
//! | array element object without message    | `{message: json(element), ...}`          |
//! | array element primitive                 | `{message: string_of(element), ...}`     |

use crate::record::{now_millis, LogRecord};
use serde_json::Value;

/// Heterogeneous log input accepted by the logger.
#[derive(Debug, Clone, PartialEq)]
pub enum LogInput {
    Text(String),
    Json(Value),
    Records(Vec<LogRecord>),
}

/// Per-call options for a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Timestamp given to every record that does not carry its own.
    /// Defaults to the time of the call.
    pub timestamp: Option<i64>,
}

impl From<&str> for LogInput {
    fn from(message: &str) -> Self {
        LogInput::Text(message.to_string())
    }
}

impl From<String> for LogInput {
    fn from(message: String) -> Self {
        LogInput::Text(message)
    }
}

impl From<Value> for LogInput {
    fn from(value: Value) -> Self {
        LogInput::Json(value)
    }
}

impl From<LogRecord> for LogInput {
    fn from(record: LogRecord) -> Self {
        LogInput::Records(vec![record])
    }
}

impl From<Vec<LogRecord>> for LogInput {
    fn from(records: Vec<LogRecord>) -> Self {
        LogInput::Records(records)
    }
}

impl From<Vec<String>> for LogInput {
    fn from(messages: Vec<String>) -> Self {
        LogInput::Json(Value::Array(
            messages.into_iter().map(Value::String).collect(),
        ))
    }
}

impl From<Vec<&str>> for LogInput {
    fn from(messages: Vec<&str>) -> Self {
        LogInput::Json(Value::Array(
            messages.into_iter().map(Value::from).collect(),
        ))
    }
}

/// Normalizes `input` into an ordered sequence of records.
///
/// The default timestamp is read once, so all records produced by one call
/// share it unless they carry their own.
pub fn normalize(input: LogInput, default_timestamp: Option<i64>) -> Vec<LogRecord> {
    let timestamp = default_timestamp.unwrap_or_else(now_millis);

    match input {
        LogInput::Text(message) => vec![LogRecord::with_timestamp(message, timestamp)],
        LogInput::Records(records) => records,
        LogInput::Json(Value::Array(items)) => items
            .into_iter()
            .map(|item| normalize_element(item, timestamp))
            .collect(),
        LogInput::Json(value) => vec![LogRecord::with_timestamp(message_text(value), timestamp)],
    }
}

fn normalize_element(item: Value, default_timestamp: i64) -> LogRecord {
    let Value::Object(mut fields) = item else {
        return LogRecord::with_timestamp(message_text(item), default_timestamp);
    };

    if !fields.contains_key("message") {
        return LogRecord::with_timestamp(Value::Object(fields).to_string(), default_timestamp);
    }

    // A timestamp that is not an integer is treated as absent.
    let timestamp = fields
        .get("timestamp")
        .and_then(Value::as_i64)
        .unwrap_or(default_timestamp);
    let message = fields.remove("message").unwrap_or(Value::Null);

    LogRecord::with_timestamp(message_text(message), timestamp)
}

fn message_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
