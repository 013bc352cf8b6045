// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_LOG_LEVEL, DEFAULT_RESTRICTED_CHARACTERS, DEFAULT_TIMEOUT,
    DEFAULT_WINDOW, MAX_WINDOW, SUBSTITUTE_CHARACTER,
};
use crate::error::ConfigError;
use std::env;
use std::time::Duration;

pub const GROUP_ENV: &str = "STREAM_LOGGER_GROUP";

/// Configuration for a stream logger and its HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Log group every stream belongs to
    pub group_name: String,
    /// Stream to write to; a timestamped one is created when unset
    pub stream_name: Option<String>,
    /// Token to continue `stream_name` from another logger
    pub sequence_token: Option<String>,
    /// Debounce window between flushes
    pub window: Duration,
    /// Base URL of the log service
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Characters replaced in stream names before they are sent
    pub restricted_characters: Vec<char>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            stream_name: None,
            sequence_token: None,
            window: DEFAULT_WINDOW,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            https_proxy: None,
            restricted_characters: DEFAULT_RESTRICTED_CHARACTERS.to_vec(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let group_name = env::var(GROUP_ENV).map_err(|_| ConfigError::MissingEnv(GROUP_ENV))?;
        let stream_name = non_empty_var("STREAM_LOGGER_STREAM");
        let sequence_token = non_empty_var("STREAM_LOGGER_SEQUENCE_TOKEN");
        let window = env::var("STREAM_LOGGER_WINDOW_MS")
            .ok()
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WINDOW);
        let endpoint =
            env::var("STREAM_LOGGER_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let timeout = env::var("STREAM_LOGGER_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let https_proxy = env::var("STREAM_LOGGER_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();
        let restricted_characters = env::var("STREAM_LOGGER_RESTRICTED_CHARS")
            .map(|chars| chars.chars().collect())
            .unwrap_or_else(|_| DEFAULT_RESTRICTED_CHARACTERS.to_vec());
        let log_level = env::var("STREAM_LOGGER_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let config = Self {
            group_name,
            stream_name,
            sequence_token,
            window,
            endpoint,
            timeout,
            https_proxy,
            restricted_characters,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "{GROUP_ENV} cannot be empty"
            )));
        }

        if self.window > MAX_WINDOW {
            return Err(ConfigError::InvalidConfig(format!(
                "Window of {:?} exceeds the maximum of {:?}",
                self.window, MAX_WINDOW
            )));
        }

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Endpoint cannot be empty".to_string(),
            ));
        }

        // A continuation token is meaningless without the stream it belongs to
        if self.sequence_token.is_some() && self.stream_name.is_none() {
            return Err(ConfigError::InvalidConfig(
                "A sequence token requires a stream name".to_string(),
            ));
        }

        if self.restricted_characters.contains(&SUBSTITUTE_CHARACTER) {
            return Err(ConfigError::InvalidConfig(format!(
                "'{SUBSTITUTE_CHARACTER}' cannot be a restricted character"
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}
