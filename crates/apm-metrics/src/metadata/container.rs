// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Container id extraction from the process cgroup descriptor.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Path markers left in cgroup lines by container runtimes.
const CONTAINER_MARKERS: [&str; 3] = ["/docker/", "/ecs/", "/kubepods"];

fn hex_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]+$").ok()).as_ref()
}

/// Container id of the current process, or an empty string.
#[must_use]
pub fn get_container_id(cgroup_path: &Path) -> String {
    let file = match File::open(cgroup_path) {
        Ok(file) => file,
        Err(e) => {
            debug!("Could not open {}: {e}", cgroup_path.display());
            return String::new();
        }
    };
    let line = BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .find(|line| CONTAINER_MARKERS.iter().any(|marker| line.contains(marker)));
    line.map(|line| container_id_from_line(&line))
        .unwrap_or_default()
}

/// Trailing hexadecimal identifier of a cgroup line such as
/// `12:cpu:/docker/3f0c...` or `1:name=systemd:/kubepods/.../docker-3f0c....scope`.
#[must_use]
pub fn container_id_from_line(line: &str) -> String {
    let last = line.trim().rsplit('/').next().unwrap_or_default();
    let id = last.strip_suffix(".scope").unwrap_or(last);
    let id = id
        .rsplit_once('-')
        .map_or(id, |(_, suffix)| suffix);
    if hex_id_regex().is_some_and(|re| re.is_match(id)) {
        id.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DOCKER_ID: &str = "3f0c5a8e1d4b6c2a9e7f0b1d3c5a7e9f1b3d5c7a9e1f3b5d7c9a1e3f5b7d9c1a";

    #[test]
    fn test_docker_line() {
        let line = format!("12:cpu,cpuacct:/docker/{DOCKER_ID}");
        assert_eq!(container_id_from_line(&line), DOCKER_ID);
    }

    #[test]
    fn test_ecs_line() {
        let line = "9:perf_event:/ecs/task-arn-uuid/5a0d5ceddda6f4a2e0f5b2b4d1f8c1a3e";
        assert_eq!(
            container_id_from_line(line),
            "5a0d5ceddda6f4a2e0f5b2b4d1f8c1a3e"
        );
    }

    #[test]
    fn test_systemd_scope_line() {
        let line = format!("1:name=systemd:/kubepods.slice/kubepods-pod1.slice/docker-{DOCKER_ID}.scope");
        assert_eq!(container_id_from_line(&line), DOCKER_ID);
    }

    #[test]
    fn test_non_hex_is_rejected() {
        assert_eq!(container_id_from_line("4:memory:/docker/not-an-id!"), "");
    }

    #[test]
    fn test_get_container_id_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cgroup");
        fs::write(
            &path,
            format!("13:name=systemd:/\n12:pids:/docker/{DOCKER_ID}\n"),
        )
        .unwrap();
        assert_eq!(get_container_id(&path), DOCKER_ID);
    }

    #[test]
    fn test_no_container_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cgroup");
        fs::write(&path, "0::/user.slice/user-1000.slice/session-3.scope\n").unwrap();
        assert_eq!(get_container_id(&path), "");
        assert_eq!(get_container_id(&dir.path().join("missing")), "");
    }
}
