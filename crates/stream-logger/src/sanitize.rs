// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{DEFAULT_RESTRICTED_CHARACTERS, SUBSTITUTE_CHARACTER};

/// Replaces every character the remote rejects in stream names with `-`.
pub fn sanitize(name: &str) -> String {
    sanitize_with(name, DEFAULT_RESTRICTED_CHARACTERS, SUBSTITUTE_CHARACTER)
}

/// Replaces every character of `restricted` found in `name` with `substitute`.
///
/// Idempotent as long as `substitute` is not itself restricted.
pub fn sanitize_with(name: &str, restricted: &[char], substitute: char) -> String {
    name.chars()
        .map(|c| if restricted.contains(&c) { substitute } else { c })
        .collect()
}
