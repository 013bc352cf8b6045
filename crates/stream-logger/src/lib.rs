// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side log shipping to an append-only, sequence-token ordered remote
//! log stream.
//!
//! Log input is normalized into [`record::LogRecord`]s, coalesced by the
//! [`batcher`] into one outbound batch per debounce window, and appended by the
//! [`engine`] using optimistic concurrency on the stream's sequence token.
//! Every caller of one window receives the same shared [`engine::AppendResult`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batcher;
pub mod client;
pub mod config;
pub mod constants;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod normalize;
pub mod record;
pub mod sanitize;

#[cfg(test)]
pub(crate) mod test_support;

pub use batcher::{LoggerService, SharedResult, StreamLogger};
pub use client::LogStreamClient;
pub use config::LoggerConfig;
pub use engine::{AppendResult, StreamHandle};
pub use error::{ClientError, ConfigError, LoggerError};
pub use http::HttpLogStreamClient;
pub use normalize::{LogInput, SubmitOptions};
pub use record::LogRecord;
