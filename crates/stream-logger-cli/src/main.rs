// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Ships every line read from stdin to a remote log stream.
//!
//! Usage: `stream-logger [STREAM_NAME]`. Without a stream name, the configured
//! one (or a timestamped one) is created on the first flush.

use std::{env, process::ExitCode, sync::Arc};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use stream_logger::constants::DEFAULT_LOG_LEVEL;
use stream_logger::{HttpLogStreamClient, LogStreamClient, LoggerConfig, StreamLogger};

#[tokio::main]
pub async fn main() -> ExitCode {
    let config = LoggerConfig::from_env();

    let filter = match EnvFilter::try_new(log_filter(config.as_ref().ok())) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("could not parse log filter: {e}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
        return ExitCode::FAILURE;
    }

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let client: Arc<dyn LogStreamClient> = Arc::new(HttpLogStreamClient::new(&config));
    let logger = StreamLogger::spawn(client, &config);

    if let Some(stream_name) = env::args().nth(1) {
        match logger.start(Some(&stream_name)).await {
            Ok(info) => info!("Writing to stream {} in {}", info.stream_id, info.group_name),
            Err(e) => {
                error!("Failed to start stream {stream_name}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut pending = JoinSet::new();
    let mut failed = false;
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.is_empty() => continue,
            Ok(Some(line)) => {
                let waiter = logger.submit(line);
                pending.spawn(async move {
                    match waiter.await {
                        Ok(result) => result.error.is_none(),
                        Err(e) => {
                            error!("Log line was not shipped: {e}");
                            false
                        }
                    }
                });
                while let Some(shipped) = pending.try_join_next() {
                    failed |= !matches!(shipped, Ok(true));
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }

    if let Err(e) = logger.shutdown().await {
        error!("Failed to flush pending log lines: {e}");
        return ExitCode::FAILURE;
    }

    while let Some(shipped) = pending.join_next().await {
        failed |= !matches!(shipped, Ok(true));
    }
    if failed {
        return ExitCode::FAILURE;
    }

    debug!("All log lines flushed");
    ExitCode::SUCCESS
}

/// Filter directives for the configured level. The level is only trusted once
/// the configuration validated, so a rejected config still gets its error logged.
fn log_filter(config: Option<&LoggerConfig>) -> String {
    let log_level = config.map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());

    // reqwest's transport stack is noisy at debug level
    format!("h2=off,hyper=off,rustls=off,{log_level}")
}
