// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Optimistic-concurrency appends to a sequence-token ordered stream.
//!
//! The engine owns no state of its own; the caller passes the [`StreamHandle`]
//! it appends through. The handle's token is only replaced by a value observed
//! from the remote: a successful append, or a stream (re)selection, which
//! resets it. A failed append leaves the handle untouched so the next attempt
//! starts from the last known-good token.
//!
//! ```text
//!   append(token) ──ok──────────────────────────> token := next
//!        │
//!    conflict(expected)
//!        │
//!   append(expected) ──ok───────────────────────> token := next
//!        │
//!    conflict again / other error ──────────────> error, token unchanged
//! ```

use crate::client::LogStreamClient;
use crate::constants::EXPECTED_TOKEN_MARKER;
use crate::error::{ClientError, LoggerError};
use crate::lifecycle::{ensure_stream, StreamInfo};
use crate::record::LogRecord;
use std::sync::Arc;
use tracing::{debug, warn};

/// A writer's position in one remote stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHandle {
    /// Unset until a stream has been selected.
    pub stream_id: Option<String>,
    /// `None` until the first successful append; the remote assigns the first token.
    pub sequence_token: Option<String>,
}

impl StreamHandle {
    /// Resumes a stream another writer appended to.
    ///
    /// No two writers may append with the same token concurrently; nothing
    /// here detects that.
    pub fn resume(stream_id: impl Into<String>, sequence_token: Option<String>) -> Self {
        StreamHandle {
            stream_id: Some(stream_id.into()),
            sequence_token,
        }
    }
}

/// Outcome of one flushed batch, shared by every caller of the batch.
#[derive(Debug)]
pub struct AppendResult {
    pub group_name: String,
    pub stream_id: Option<String>,
    /// Absent when `error` is set.
    pub next_sequence_token: Option<String>,
    pub records: Vec<LogRecord>,
    pub error: Option<LoggerError>,
}

impl AppendResult {
    pub fn failed(
        group_name: &str,
        stream_id: Option<String>,
        records: Vec<LogRecord>,
        error: LoggerError,
    ) -> Self {
        AppendResult {
            group_name: group_name.to_string(),
            stream_id,
            next_sequence_token: None,
            records,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone)]
pub struct AppendEngine {
    client: Arc<dyn LogStreamClient>,
    group_name: String,
    /// Name used when a stream has to be created without an explicit one.
    default_stream_name: Option<String>,
}

impl AppendEngine {
    pub fn new(
        client: Arc<dyn LogStreamClient>,
        group_name: impl Into<String>,
        default_stream_name: Option<String>,
    ) -> Self {
        AppendEngine {
            client,
            group_name: group_name.into(),
            default_stream_name,
        }
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Selects (creating if needed) the stream subsequent appends go to.
    ///
    /// On success the handle points at the new stream with no token; on
    /// failure it is left as it was.
    pub async fn start(
        &self,
        handle: &mut StreamHandle,
        stream_name: Option<&str>,
    ) -> Result<StreamInfo, LoggerError> {
        let stream_name = stream_name.or(self.default_stream_name.as_deref());
        let info = ensure_stream(self.client.as_ref(), &self.group_name, stream_name).await?;
        handle.stream_id = Some(info.stream_id.clone());
        handle.sequence_token = None;
        Ok(info)
    }

    /// Appends `records` to the handle's stream, creating the stream first if
    /// none is selected. Never fails past this boundary: errors are carried in
    /// the returned [`AppendResult`].
    pub async fn append(&self, handle: &mut StreamHandle, records: Vec<LogRecord>) -> AppendResult {
        if self.group_name.is_empty() {
            return AppendResult::failed(
                &self.group_name,
                handle.stream_id.clone(),
                records,
                LoggerError::Parameter("log group name is empty".to_string()),
            );
        }
        if records.is_empty() {
            return AppendResult::failed(
                &self.group_name,
                handle.stream_id.clone(),
                records,
                LoggerError::Parameter("no log records to append".to_string()),
            );
        }

        let stream_id = match handle.stream_id.clone() {
            Some(stream_id) => stream_id,
            None => match self.start(handle, None).await {
                Ok(info) => info.stream_id,
                Err(e) => return AppendResult::failed(&self.group_name, None, records, e),
            },
        };

        let token = handle.sequence_token.clone();
        match self.append_with_recovery(&stream_id, &records, token).await {
            Ok(next_sequence_token) => {
                debug!(
                    "Appended {} records to {}/{stream_id}",
                    records.len(),
                    self.group_name
                );
                handle.sequence_token = next_sequence_token.clone();
                AppendResult {
                    group_name: self.group_name.clone(),
                    stream_id: Some(stream_id),
                    next_sequence_token,
                    records,
                    error: None,
                }
            }
            Err(e) => AppendResult::failed(&self.group_name, Some(stream_id), records, e),
        }
    }

    async fn append_with_recovery(
        &self,
        stream_id: &str,
        records: &[LogRecord],
        sequence_token: Option<String>,
    ) -> Result<Option<String>, LoggerError> {
        let first = self
            .client
            .append_records(&self.group_name, stream_id, records, sequence_token.as_deref())
            .await;

        let corrected = match first {
            Ok(ack) => return Ok(ack.next_sequence_token),
            Err(ClientError::InvalidSequenceToken { expected, message }) => {
                corrected_token(expected, &message)?
            }
            Err(ClientError::DataAlreadyAccepted { expected, message }) => {
                return already_accepted(stream_id, expected, &message);
            }
            Err(e) => return Err(e.into()),
        };

        warn!(
            "Sequence token for {}/{stream_id} was stale, retrying once with the expected token",
            self.group_name
        );
        let retry = self
            .client
            .append_records(&self.group_name, stream_id, records, corrected.as_deref())
            .await;

        match retry {
            Ok(ack) => Ok(ack.next_sequence_token),
            Err(ClientError::InvalidSequenceToken { message, .. }) => Err(LoggerError::Protocol(
                format!("sequence token conflict persisted after retry: {message}"),
            )),
            Err(ClientError::DataAlreadyAccepted { expected, message }) => {
                already_accepted(stream_id, expected, &message)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The batch is already stored; adopt the token the remote expects next.
fn already_accepted(
    stream_id: &str,
    expected: Option<String>,
    message: &str,
) -> Result<Option<String>, LoggerError> {
    debug!("Records for {stream_id} were already accepted, adopting the expected token");
    corrected_token(expected, message)
}

/// Extracts the token the remote expects from a conflict response.
///
/// The structured field wins; otherwise the token is read from the message
/// text, where the literal `null` means "send no token".
fn corrected_token(expected: Option<String>, message: &str) -> Result<Option<String>, LoggerError> {
    if let Some(token) = expected {
        return Ok(Some(token));
    }

    let Some((_, tail)) = message.split_once(EXPECTED_TOKEN_MARKER) else {
        return Err(LoggerError::Protocol(format!(
            "conflict response carries no expected sequence token: {message}"
        )));
    };

    match tail.split_whitespace().next() {
        Some("null") => Ok(None),
        Some(token) => Ok(Some(token.to_string())),
        None => Err(LoggerError::Protocol(format!(
            "conflict response carries an empty expected sequence token: {message}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ack, conflict, MockClient};
    use tracing_test::traced_test;

    fn engine(client: &Arc<MockClient>) -> AppendEngine {
        let client: Arc<dyn LogStreamClient> = client.clone();
        AppendEngine::new(client, "/logs/test", None)
    }

    fn records(messages: &[&str]) -> Vec<LogRecord> {
        messages
            .iter()
            .map(|m| LogRecord::with_timestamp(*m, 1))
            .collect()
    }

    #[tokio::test]
    async fn test_creates_stream_when_unset() {
        let client = Arc::new(MockClient::new());
        let mut handle = StreamHandle::default();

        let result = engine(&client).append(&mut handle, records(&["Some log"])).await;

        assert!(result.is_ok(), "unexpected error: {:?}", result.error);
        assert_eq!(client.creates().len(), 1);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.stream_id, handle.stream_id);
        assert_eq!(result.next_sequence_token.as_deref(), Some("token-1"));
        assert_eq!(handle.sequence_token.as_deref(), Some("token-1"));
        assert_eq!(client.appends()[0].sequence_token, None);
    }

    #[tokio::test]
    async fn test_threads_token_between_appends() {
        let client = Arc::new(MockClient::new());
        let engine = engine(&client);
        let mut handle = StreamHandle::resume("stream", None);

        engine.append(&mut handle, records(&["a"])).await;
        engine.append(&mut handle, records(&["b"])).await;

        let appends = client.appends();
        assert_eq!(appends[0].sequence_token, None);
        assert_eq!(appends[1].sequence_token.as_deref(), Some("token-1"));
        assert_eq!(handle.sequence_token.as_deref(), Some("token-2"));
        assert!(client.creates().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_conflict_is_retried_with_corrected_token() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(Some("T"), "The given sequenceToken is invalid.")));
        client.push_append(Ok(ack("after-retry")));
        let mut handle = StreamHandle::resume("stream", Some("stale".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(result.is_ok());
        assert_eq!(result.next_sequence_token.as_deref(), Some("after-retry"));
        assert_eq!(handle.sequence_token.as_deref(), Some("after-retry"));
        let appends = client.appends();
        assert_eq!(appends.len(), 2);
        assert_eq!(appends[0].sequence_token.as_deref(), Some("stale"));
        assert_eq!(appends[1].sequence_token.as_deref(), Some("T"));
        assert!(logs_contain("was stale, retrying once"));
    }

    #[tokio::test]
    async fn test_corrected_token_read_from_message() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(
            None,
            "The given sequenceToken is invalid. The next expected sequenceToken is: 4960123",
        )));
        let mut handle = StreamHandle::resume("stream", Some("stale".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(result.is_ok());
        assert_eq!(client.appends()[1].sequence_token.as_deref(), Some("4960123"));
    }

    #[tokio::test]
    async fn test_null_expected_token_retries_without_token() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(
            None,
            "The given sequenceToken is invalid. The next expected sequenceToken is: null",
        )));
        let mut handle = StreamHandle::resume("stream", Some("badToken".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(result.is_ok());
        assert_eq!(client.appends()[1].sequence_token, None);
    }

    #[tokio::test]
    async fn test_second_conflict_is_protocol_error() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(Some("T1"), "invalid")));
        client.push_append(Err(conflict(Some("T2"), "invalid again")));
        let mut handle = StreamHandle::resume("stream", Some("stale".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(matches!(result.error, Some(LoggerError::Protocol(_))));
        assert_eq!(result.next_sequence_token, None);
        assert_eq!(client.appends().len(), 2);
        assert_eq!(handle.sequence_token.as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_conflict_without_token_is_protocol_error() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(None, "The given sequenceToken is invalid.")));
        let mut handle = StreamHandle::resume("stream", Some("stale".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(matches!(result.error, Some(LoggerError::Protocol(_))));
        assert_eq!(client.appends().len(), 1);
        assert_eq!(handle.sequence_token.as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_retry_failure_is_surfaced() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(conflict(Some("T"), "invalid")));
        client.push_append(Err(ClientError::Transport("connection reset".to_string())));
        let mut handle = StreamHandle::resume("stream", Some("stale".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(matches!(
            result.error,
            Some(LoggerError::Remote(ClientError::Transport(_)))
        ));
        assert_eq!(handle.sequence_token.as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_token() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(ClientError::Remote {
            status: None,
            code: "ServiceUnavailableException".to_string(),
            message: "try later".to_string(),
        }));
        let mut handle = StreamHandle::resume("stream", Some("good".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a", "b"])).await;

        assert!(!result.is_ok());
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.next_sequence_token, None);
        assert_eq!(handle.sequence_token.as_deref(), Some("good"));
        assert_eq!(client.appends().len(), 1);
    }

    #[tokio::test]
    async fn test_data_already_accepted_adopts_token() {
        let client = Arc::new(MockClient::new());
        client.push_append(Err(ClientError::DataAlreadyAccepted {
            expected: Some("next".to_string()),
            message: "The given batch of log events has already been accepted.".to_string(),
        }));
        let mut handle = StreamHandle::resume("stream", Some("old".to_string()));

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(result.is_ok());
        assert_eq!(handle.sequence_token.as_deref(), Some("next"));
        assert_eq!(client.appends().len(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_skips_append() {
        let client = Arc::new(MockClient::new());
        client.push_create(Err(ClientError::Transport("unreachable".to_string())));
        let mut handle = StreamHandle::default();

        let result = engine(&client).append(&mut handle, records(&["a"])).await;

        assert!(matches!(result.error, Some(LoggerError::Remote(_))));
        assert!(client.appends().is_empty());
        assert_eq!(handle, StreamHandle::default());
    }

    #[tokio::test]
    async fn test_empty_batch_is_parameter_error() {
        let client = Arc::new(MockClient::new());
        let mut handle = StreamHandle::default();

        let result = engine(&client).append(&mut handle, Vec::new()).await;

        assert!(matches!(result.error, Some(LoggerError::Parameter(_))));
        assert!(client.creates().is_empty());
        assert!(client.appends().is_empty());
    }

    #[tokio::test]
    async fn test_start_resets_token() {
        let client = Arc::new(MockClient::new());
        let mut handle = StreamHandle::resume("old-stream", Some("token".to_string()));

        let info = engine(&client)
            .start(&mut handle, Some("new:stream"))
            .await
            .expect("failed to start stream");

        assert_eq!(info.stream_id, "new-stream");
        assert_eq!(handle, StreamHandle::resume("new-stream", None));
    }

    #[test]
    fn test_corrected_token_prefers_structured_field() {
        let token = corrected_token(
            Some("field".to_string()),
            "The next expected sequenceToken is: text",
        )
        .expect("token should be extracted");
        assert_eq!(token.as_deref(), Some("field"));
    }
}
