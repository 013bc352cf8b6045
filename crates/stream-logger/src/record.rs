// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped log message, as appended to the remote stream.
///
/// Records are immutable once built; the append engine only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    message: String,
    timestamp: i64,
}

impl LogRecord {
    /// Builds a record stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_timestamp(message, now_millis())
    }

    /// Builds a record with an explicit timestamp in milliseconds since the epoch.
    pub fn with_timestamp(message: impl Into<String>, timestamp: i64) -> Self {
        LogRecord {
            message: message.into(),
            timestamp,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// The current time as an ISO-8601 string with millisecond precision, e.g.
/// `2024-05-01T12:30:45.123Z`.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
