// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Human readable distribution name built from release identification files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::constants::UNKNOWN;

/// One known release file and how to turn its content into a distro string.
struct ReleaseFile {
    file: &'static str,
    /// `KEY=` whose value is taken; `None` uses the first line.
    key: Option<&'static str>,
    prefix: &'static str,
}

// Red Hat derivatives also ship lsb-release and Ubuntu ships debian_version,
// so the more specific files are checked first.
const RELEASE_FILES: [ReleaseFile; 8] = [
    ReleaseFile { file: "os-release", key: Some("PRETTY_NAME"), prefix: "" },
    ReleaseFile { file: "redhat-release", key: None, prefix: "" },
    ReleaseFile { file: "release-cpe", key: None, prefix: "Amzn Linux " },
    ReleaseFile { file: "lsb-release", key: Some("DISTRIB_DESCRIPTION"), prefix: "" },
    ReleaseFile { file: "debian_version", key: None, prefix: "Debian " },
    ReleaseFile { file: "SuSE-release", key: None, prefix: "" },
    ReleaseFile { file: "slackware-version", key: None, prefix: "" },
    ReleaseFile { file: "gentoo-release", key: None, prefix: "" },
];

/// Distro of the running host. Always contains "unknown" off Linux or when no
/// release file can be parsed.
#[must_use]
pub fn get_distro(release_root: &Path) -> String {
    if cfg!(target_os = "linux") {
        distro_from_release_files(release_root).unwrap_or_else(|| format!("Linux {UNKNOWN}"))
    } else {
        format!("{} {UNKNOWN}", std::env::consts::OS)
    }
}

/// Parses the first matching release file under `root`.
pub fn distro_from_release_files(root: &Path) -> Option<String> {
    RELEASE_FILES.iter().find_map(|release| {
        let path = root.join(release.file);
        let content = fs::read_to_string(&path).ok()?;
        let value = match release.key {
            Some(key) => value_for_key(&content, key)?,
            None => content.lines().map(str::trim).find(|l| !l.is_empty())?.to_string(),
        };
        let value = release_cpe_version(release.file, value);
        debug!("Detected distro from {}: {value}", path.display());
        Some(format!("{}{value}", release.prefix))
    })
}

fn value_for_key(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        if k.trim() != key {
            return None;
        }
        let v = v.trim().trim_matches('"').trim();
        (!v.is_empty()).then(|| v.to_string())
    })
}

// release-cpe holds a CPE name such as `cpe:/o:amazon:linux:2018.03:ga`.
fn release_cpe_version(file: &str, value: String) -> String {
    if file != "release-cpe" {
        return value;
    }
    value
        .split(':')
        .nth(4)
        .filter(|version| !version.is_empty())
        .map_or(value.clone(), str::to_string)
}
