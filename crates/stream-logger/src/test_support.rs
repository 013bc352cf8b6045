// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`LogStreamClient`] that records calls and replays scripted outcomes.

use crate::client::{AppendAck, CreatedStream, LogStreamClient};
use crate::error::ClientError;
use crate::record::LogRecord;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedAppend {
    pub(crate) group_name: String,
    pub(crate) stream_id: String,
    pub(crate) records: Vec<LogRecord>,
    pub(crate) sequence_token: Option<String>,
}

impl RecordedAppend {
    pub(crate) fn messages(&self) -> Vec<&str> {
        self.records.iter().map(LogRecord::message).collect()
    }
}

#[derive(Default)]
pub(crate) struct MockClient {
    creates: Mutex<Vec<(String, String)>>,
    appends: Mutex<Vec<RecordedAppend>>,
    create_outcomes: Mutex<VecDeque<Result<(), ClientError>>>,
    append_outcomes: Mutex<VecDeque<Result<AppendAck, ClientError>>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every append takes `delay` to complete.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        MockClient {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn push_create(&self, outcome: Result<(), ClientError>) {
        self.create_outcomes.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn push_append(&self, outcome: Result<AppendAck, ClientError>) {
        self.append_outcomes.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn creates(&self) -> Vec<(String, String)> {
        self.creates.lock().unwrap().clone()
    }

    pub(crate) fn appends(&self) -> Vec<RecordedAppend> {
        self.appends.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub(crate) fn ack(token: &str) -> AppendAck {
    AppendAck {
        next_sequence_token: Some(token.to_string()),
    }
}

pub(crate) fn conflict(expected: Option<&str>, message: &str) -> ClientError {
    ClientError::InvalidSequenceToken {
        expected: expected.map(str::to_string),
        message: message.to_string(),
    }
}

#[async_trait]
impl LogStreamClient for MockClient {
    async fn create_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<CreatedStream, ClientError> {
        self.creates
            .lock()
            .unwrap()
            .push((group_name.to_string(), stream_name.to_string()));
        let outcome = self.create_outcomes.lock().unwrap().pop_front();
        outcome.unwrap_or(Ok(())).map(|()| CreatedStream {
            stream_id: stream_name.to_string(),
        })
    }

    async fn append_records(
        &self,
        group_name: &str,
        stream_id: &str,
        records: &[LogRecord],
        sequence_token: Option<&str>,
    ) -> Result<AppendAck, ClientError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let attempt = {
            let mut appends = self.appends.lock().unwrap();
            appends.push(RecordedAppend {
                group_name: group_name.to_string(),
                stream_id: stream_id.to_string(),
                records: records.to_vec(),
                sequence_token: sequence_token.map(str::to_string),
            });
            appends.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.append_outcomes.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome.unwrap_or_else(|| Ok(ack(&format!("token-{attempt}"))))
    }
}
