// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Debounce window. Submissions arriving while a window is open share its flush.
pub const WINDOW_MS: u64 = 200;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(WINDOW_MS);

/// Upper bound accepted for a configured window.
pub const MAX_WINDOW: Duration = Duration::from_secs(60);

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:4586";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Characters the remote service rejects in stream names.
pub const DEFAULT_RESTRICTED_CHARACTERS: &[char] = &[':', '*'];

/// Replacement for every restricted character.
pub const SUBSTITUTE_CHARACTER: char = '-';

/// Prefix of the conflict message preceding the token the remote expects.
pub const EXPECTED_TOKEN_MARKER: &str = "The next expected sequenceToken is: ";
