// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Utility functions shared by the aggregation and encoding paths.

use std::sync::OnceLock;

use regex::Regex;

fn url_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:[^/?#]*?://)?[^/?#]*(/[^/?#]+)?(/[^/?#]+)?").ok())
        .as_ref()
}

/// Derives a transaction name from the first two path segments of a URL.
///
/// Scheme, host and port are ignored, as are the query string and fragment.
/// A URL without any path segment maps to `/`.
///
/// # Examples
///
/// ```
/// use apm_metrics::util::transaction_from_url;
///
/// assert_eq!(transaction_from_url("http://github.com/librato"), "/librato");
/// assert_eq!(transaction_from_url("github.com:8080/a/b/c"), "/a/b");
/// assert_eq!(transaction_from_url("http://github.com"), "/");
/// ```
#[must_use]
pub fn transaction_from_url(url: &str) -> String {
    let mut transaction = String::new();
    if let Some(captures) = url_path_regex().and_then(|re| re.captures(url)) {
        for group in [1, 2] {
            if let Some(segment) = captures.get(group) {
                transaction.push_str(segment.as_str());
            }
        }
    }
    if transaction.is_empty() {
        transaction.push('/');
    }
    transaction
}

/// Truncates `s` to at most `max` bytes without splitting a UTF-8 character.
#[must_use]
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
