// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ClientError;
use crate::record::LogRecord;
use crate::sanitize::sanitize;
use async_trait::async_trait;

/// A stream created (or found to already exist) on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedStream {
    pub stream_id: String,
}

/// Acknowledgement of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendAck {
    /// Token to present with the next append to the same stream.
    pub next_sequence_token: Option<String>,
}

/// Remote log-storage operations the logger depends on.
///
/// Implementations report failures as [`ClientError`]s; in particular a stale
/// sequence token must surface as [`ClientError::InvalidSequenceToken`] and an
/// existing stream as [`ClientError::ResourceAlreadyExists`].
#[async_trait]
pub trait LogStreamClient: Send + Sync {
    async fn create_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<CreatedStream, ClientError>;

    /// Appends `records`, in order, after the position identified by
    /// `sequence_token`. `None` is only valid for a stream never appended to.
    async fn append_records(
        &self,
        group_name: &str,
        stream_id: &str,
        records: &[LogRecord],
        sequence_token: Option<&str>,
    ) -> Result<AppendAck, ClientError>;

    /// Maps a desired stream name onto one the remote accepts.
    fn sanitize(&self, name: &str) -> String {
        sanitize(name)
    }
}
