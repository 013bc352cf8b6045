// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! [`LogStreamClient`] over the JSON 1.1 log-service protocol.
//!
//! Every call is a `POST {endpoint}/` with the operation named in the
//! `X-Amz-Target` header. Failures come back as a JSON body whose `__type`
//! names the exception, e.g.
//!
//! ```text
//! {"__type": "InvalidSequenceTokenException",
//!  "message": "The given sequenceToken is invalid. The next expected sequenceToken is: 4958",
//!  "expectedSequenceToken": "4958"}
//! ```
//!
//! Request signing is left to a proxy or sidecar in front of the endpoint.

use crate::client::{AppendAck, CreatedStream, LogStreamClient};
use crate::config::LoggerConfig;
use crate::constants::SUBSTITUTE_CHARACTER;
use crate::error::ClientError;
use crate::record::LogRecord;
use crate::sanitize::sanitize_with;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, warn};

const CONTENT_TYPE_JSON_1_1: &str = "application/x-amz-json-1.1";
const TARGET_HEADER: &str = "X-Amz-Target";
const CREATE_LOG_STREAM: &str = "Logs_20140328.CreateLogStream";
const PUT_LOG_EVENTS: &str = "Logs_20140328.PutLogEvents";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [LogRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<RejectedLogEventsInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectedLogEventsInfo {
    too_new_log_event_start_index: Option<i64>,
    too_old_log_event_end_index: Option<i64>,
    expired_log_event_end_index: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<String>,
}

/// HTTP client for the remote log service.
#[derive(Debug, Clone)]
pub struct HttpLogStreamClient {
    client: reqwest::Client,
    endpoint: String,
    restricted_characters: Vec<char>,
}

impl HttpLogStreamClient {
    #[must_use]
    pub fn new(config: &LoggerConfig) -> Self {
        Self::with_client(
            get_client(config),
            config.endpoint.clone(),
            config.restricted_characters.clone(),
        )
    }

    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        restricted_characters: Vec<char>,
    ) -> Self {
        HttpLogStreamClient {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            restricted_characters,
        }
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        target: &'static str,
        body: &B,
    ) -> Result<String, ClientError> {
        let resp = self
            .client
            .post(format!("{}/", self.endpoint))
            .headers(headers(target))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send {target} request: {e}");
                ClientError::Transport(e.to_string())
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if status.is_success() {
            debug!("{target} succeeded with status {status}");
            Ok(text)
        } else {
            Err(decode_error(status, &text))
        }
    }
}

#[async_trait]
impl LogStreamClient for HttpLogStreamClient {
    async fn create_stream(
        &self,
        group_name: &str,
        stream_name: &str,
    ) -> Result<CreatedStream, ClientError> {
        let request = CreateLogStreamRequest {
            log_group_name: group_name,
            log_stream_name: stream_name,
        };
        self.call(CREATE_LOG_STREAM, &request).await?;

        Ok(CreatedStream {
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
        let request = PutLogEventsRequest {
            log_group_name: group_name,
            log_stream_name: stream_id,
            log_events: records,
            sequence_token,
        };
        let body = self.call(PUT_LOG_EVENTS, &request).await?;

        let response: PutLogEventsResponse = if body.trim().is_empty() {
            PutLogEventsResponse::default()
        } else {
            serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?
        };
        if let Some(rejected) = response.rejected_log_events_info {
            warn!(
                "Some log events in {stream_id} were rejected: too new from index {:?}, too old up to index {:?}, expired up to index {:?}",
                rejected.too_new_log_event_start_index,
                rejected.too_old_log_event_end_index,
                rejected.expired_log_event_end_index
            );
        }

        Ok(AppendAck {
            next_sequence_token: response.next_sequence_token,
        })
    }

    fn sanitize(&self, name: &str) -> String {
        sanitize_with(name, &self.restricted_characters, SUBSTITUTE_CHARACTER)
    }
}

fn headers(target: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_1_1));
    headers.insert(TARGET_HEADER, HeaderValue::from_static(target));
    headers
}

/// Maps an error response onto a [`ClientError`]. The exception name is the
/// part of `__type` after the last `#`, if any.
fn decode_error(status: StatusCode, body: &str) -> ClientError {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return ClientError::Remote {
            status: Some(status),
            code: String::from("Unknown"),
            message: body.to_string(),
        };
    };

    let code = parsed
        .error_type
        .as_deref()
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| String::from("Unknown"));
    let message = parsed.message.unwrap_or_default();
    let expected = parsed.expected_sequence_token;

    match code.as_str() {
        "InvalidSequenceTokenException" => ClientError::InvalidSequenceToken { expected, message },
        "DataAlreadyAcceptedException" => ClientError::DataAlreadyAccepted { expected, message },
        "ResourceAlreadyExistsException" => ClientError::ResourceAlreadyExists(message),
        "ResourceNotFoundException" => ClientError::ResourceNotFound(message),
        _ => ClientError::Remote {
            status: Some(status),
            code,
            message,
        },
    }
}

/// Builds the HTTP client, dropping the proxy when it cannot be parsed.
#[must_use]
pub fn get_client(config: &LoggerConfig) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(
    config: &LoggerConfig,
    allow_proxy: bool,
) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .timeout(config.timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(https_uri) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(https_uri.clone())?;
            client = client.proxy(proxy);
        }
    }

    Ok(client.build()?)
}
