// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Failures reported by a [`crate::client::LogStreamClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The supplied sequence token was stale. `expected` carries the token the
    /// remote wants next when it reports one in a structured field.
    #[error("Invalid sequence token: {message}")]
    InvalidSequenceToken {
        expected: Option<String>,
        message: String,
    },

    /// The batch was already accepted under the supplied token.
    #[error("Data already accepted: {message}")]
    DataAlreadyAccepted {
        expected: Option<String>,
        message: String,
    },

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Remote call failed with {status:?} {code}: {message}")]
    Remote {
        status: Option<StatusCode>,
        code: String,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Errors surfaced to callers of the logger, either inside an
/// [`crate::engine::AppendResult`] or from [`crate::batcher::StreamLogger::start`].
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Required input was missing, detected before any remote call.
    #[error("Parameter error: {0}")]
    Parameter(String),

    #[error(transparent)]
    Remote(#[from] ClientError),

    /// A conflict that could not be recovered: a second consecutive conflict,
    /// or a conflict response without an extractable token.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Stream logger service is not running")]
    ServiceStopped,

    #[error("Result handle was dropped before it was resolved")]
    WaiterAbandoned,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
