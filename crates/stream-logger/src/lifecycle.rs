// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::client::LogStreamClient;
use crate::error::{ClientError, LoggerError};
use crate::record::now_iso8601;
use tracing::{debug, error};

/// The stream a logger writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub group_name: String,
    pub stream_id: String,
}

/// Creates the stream `desired_name` in `group_name`, or reuses it when it
/// already exists.
///
/// A missing or empty name defaults to the current ISO-8601 time. The name is
/// sanitized by the client before the remote call.
pub async fn ensure_stream(
    client: &dyn LogStreamClient,
    group_name: &str,
    desired_name: Option<&str>,
) -> Result<StreamInfo, LoggerError> {
    if group_name.is_empty() {
        return Err(LoggerError::Parameter(
            "log group name is empty".to_string(),
        ));
    }

    let desired_name = desired_name
        .filter(|name| !name.is_empty())
        .map_or_else(now_iso8601, str::to_string);
    let stream_name = client.sanitize(&desired_name);

    match client.create_stream(group_name, &stream_name).await {
        Ok(created) => {
            debug!("Created log stream {} in {group_name}", created.stream_id);
            Ok(StreamInfo {
                group_name: group_name.to_string(),
                stream_id: created.stream_id,
            })
        }
        Err(ClientError::ResourceAlreadyExists(_)) => {
            debug!("Log stream {stream_name} already exists in {group_name}, reusing it");
            Ok(StreamInfo {
                group_name: group_name.to_string(),
                stream_id: stream_name,
            })
        }
        Err(e) => {
            error!("Failed to create log stream {stream_name} in {group_name}: {e}");
            Err(e.into())
        }
    }
}
