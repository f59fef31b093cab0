// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! EC2 instance detection and instance metadata lookups.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

/// Tri-state result of EC2 detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ec2Detection {
    #[default]
    Unresolved,
    Positive,
    Negative,
}

impl From<bool> for Ec2Detection {
    fn from(is_ec2: bool) -> Self {
        if is_ec2 {
            Self::Positive
        } else {
            Self::Negative
        }
    }
}

fn ec2_uuid_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    // Big-endian UUIDs start with `ec2`; little-endian ones have the first
    // four bytes reversed, which turns the prefix into `45e12aec`.
    RE.get_or_init(|| Regex::new(r"(?i)^(?:ec2|45e12aec)").ok())
        .as_ref()
}

#[must_use]
pub fn is_ec2_uuid(uuid: &str) -> bool {
    ec2_uuid_regex().is_some_and(|re| re.is_match(uuid.trim()))
}

/// Checks the candidate UUID files in order; the first match wins.
#[must_use]
pub fn detect_ec2<P: AsRef<Path>>(uuid_files: &[P]) -> bool {
    uuid_files.iter().any(|path| {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(uuid) => {
                let hit = is_ec2_uuid(&uuid);
                debug!("EC2 UUID check on {}: {hit}", path.display());
                hit
            }
            Err(e) => {
                debug!("Could not read {}: {e}", path.display());
                false
            }
        }
    })
}

/// Single, non-retried instance metadata client.
#[derive(Clone, Debug)]
pub struct Ec2MetadataClient {
    client: Option<reqwest::Client>,
    instance_id_url: String,
    zone_url: String,
}

impl Ec2MetadataClient {
    #[must_use]
    pub fn new(instance_id_url: String, zone_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| debug!("Could not build instance metadata client: {e}"))
            .ok();
        Self {
            client,
            instance_id_url,
            zone_url,
        }
    }

    pub async fn instance_id(&self) -> String {
        self.fetch(&self.instance_id_url).await
    }

    pub async fn availability_zone(&self) -> String {
        self.fetch(&self.zone_url).await
    }

    /// Any failure, including a non-success status, yields an empty string.
    async fn fetch(&self, url: &str) -> String {
        let Some(client) = &self.client else {
            return String::new();
        };
        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Instance metadata request to {url} failed: {e}");
                return String::new();
            }
        };
        if !response.status().is_success() {
            debug!(
                "Instance metadata request to {url} returned {}",
                response.status()
            );
            return String::new();
        }
        match response.text().await {
            Ok(body) => body.trim().to_string(),
            Err(e) => {
                debug!("Could not read instance metadata body from {url}: {e}");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn detect_with(contents: &[&str]) -> bool {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = contents
            .iter()
            .enumerate()
            .map(|(i, content)| {
                let path = dir.path().join(format!("uuid{i}"));
                fs::write(&path, content).unwrap();
                path
            })
            .collect();
        detect_ec2(&files)
    }

    #[test]
    fn test_is_ec2_instance() {
        assert!(!detect_with(&["garbage"]));
        assert!(detect_with(&["ec2e1916-9099-7caf-fd21-012345abcdef"]));
        assert!(detect_with(&["EC2E1916-9099-7CAF-FD21-01234ABCDEF"]));
        assert!(!detect_with(&["EC3E1916-9099-7CAF-FD21-01234ABCDEF"]));
        assert!(detect_with(&["45e12aec-dcd1-b213-94ed-01234abcdef"]));
        assert!(detect_with(&["45E12AEC-DCD1-B213-94ED-01234ABCDEF"]));
        assert!(detect_with(&[
            "garbage",
            "ec2e1916-9099-7caf-fd21-012345abcdef"
        ]));
        assert!(!detect_with(&[
            "garbage",
            "ec3e1916-9099-7caf-fd21-012345abcdef"
        ]));
    }

    #[test]
    fn test_missing_files_are_negative() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!detect_ec2(&[dir.path().join("does-not-exist")]));
        assert!(!detect_ec2::<PathBuf>(&[]));
    }

    #[test]
    fn test_trailing_newline_is_ignored() {
        assert!(is_ec2_uuid("\nec2e1916-9099-7caf-fd21-012345abcdef\n"));
    }

    #[tokio::test]
    async fn test_get_aws_metadata() {
        let mut server = mockito::Server::new_async().await;
        let id_mock = server
            .mock("GET", "/latest/meta-data/instance-id")
            .with_status(200)
            .with_body("i-12345678")
            .expect(1)
            .create_async()
            .await;
        let zone_mock = server
            .mock("GET", "/latest/meta-data/placement/availability-zone")
            .with_status(200)
            .with_body("us-east-7")
            .create_async()
            .await;

        let client = Ec2MetadataClient::new(
            format!("{}/latest/meta-data/instance-id", server.url()),
            format!("{}/latest/meta-data/placement/availability-zone", server.url()),
            Duration::from_secs(1),
        );
        assert_eq!(client.instance_id().await, "i-12345678");
        assert_eq!(client.availability_zone().await, "us-east-7");
        id_mock.assert_async().await;
        zone_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_failure_is_empty_and_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/latest/meta-data/instance-id")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let client = Ec2MetadataClient::new(
            format!("{}/latest/meta-data/instance-id", server.url()),
            format!("{}/zone", server.url()),
            Duration::from_secs(1),
        );
        assert_eq!(client.instance_id().await, "");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_empty() {
        let client = Ec2MetadataClient::new(
            "http://127.0.0.1:1/latest/meta-data/instance-id".to_string(),
            "http://127.0.0.1:1/zone".to_string(),
            Duration::from_millis(200),
        );
        assert_eq!(client.availability_zone().await, "");
    }
}
