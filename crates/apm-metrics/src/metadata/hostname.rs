// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::iter;
use tracing::warn;

use crate::config::MetadataConfig;
use crate::constants::UNKNOWN;

/// Hostname reported in every message.
///
/// Candidates in order: the configured override (`APM_HOSTNAME`), the
/// `HOSTNAME` environment variable, then the kernel hostname. The kernel is
/// only asked when the earlier candidates are blank.
#[must_use]
pub fn resolve_hostname(config: &MetadataConfig) -> String {
    let candidates = config
        .hostname_override
        .clone()
        .into_iter()
        .chain(env::var("HOSTNAME").ok())
        .chain(iter::once_with(system_hostname).flatten());

    first_usable(candidates).unwrap_or_else(|| {
        warn!("Could not determine hostname, using '{UNKNOWN}'");
        UNKNOWN.to_string()
    })
}

fn first_usable(candidates: impl IntoIterator<Item = String>) -> Option<String> {
    candidates
        .into_iter()
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

fn system_hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => name.into_string().ok(),
        Err(e) => {
            warn!("Failed to get system hostname: {e}");
            None
        }
    }
}
