// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host and runtime facts for the report.
//!
//! Static facts (hostname, distro, addresses, container id, EC2 identity) are
//! resolved lazily and cached in a [`MetadataCache`] for the life of the
//! collector, so steady-state flushes do no disk or network I/O. Runtime
//! statistics are read live on every flush.
//!
//! Nothing here fails: any fact that cannot be resolved becomes an empty
//! string, an empty list or a documented sentinel.

pub mod container;
pub mod distro;
pub mod ec2;
pub mod hostname;
pub mod network;
pub mod runtime;

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::config::MetadataConfig;
use ec2::{Ec2Detection, Ec2MetadataClient};
use network::InterfaceAddresses;
use runtime::{HostStats, RuntimeStats, RuntimeStatsReader};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolved host facts. Each field is filled at most once.
#[derive(Debug, Default)]
pub struct MetadataCache {
    hostname: OnceLock<String>,
    distro: OnceLock<String>,
    container_id: OnceLock<String>,
    addresses: OnceLock<InterfaceAddresses>,
    ec2: Mutex<Ec2Detection>,
    ec2_instance_id: Mutex<Option<String>>,
    ec2_zone: Mutex<Option<String>>,
}

impl MetadataCache {
    #[must_use]
    pub fn ec2_detection(&self) -> Ec2Detection {
        *lock(&self.ec2)
    }

    /// Forces the next EC2 check to read the candidate files again.
    pub fn reset_ec2_detection(&self) {
        *lock(&self.ec2) = Ec2Detection::Unresolved;
    }

    /// Marks the EC2 check as resolved without touching the disk.
    pub fn set_ec2_detection(&self, detection: Ec2Detection) {
        *lock(&self.ec2) = detection;
    }

    /// Drops every cached fact.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// Everything known about the host, as sent in the init message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HostIdentity {
    pub hostname: String,
    pub pid: u32,
    pub distro: String,
    pub ec2_instance_id: String,
    pub ec2_availability_zone: String,
    pub container_id: String,
    pub ip_addresses: Vec<String>,
    pub mac_addresses: Vec<String>,
}

#[derive(Debug)]
pub struct MetadataCollector {
    config: MetadataConfig,
    cache: MetadataCache,
    ec2_client: Ec2MetadataClient,
    runtime: RuntimeStatsReader,
}

impl Default for MetadataCollector {
    fn default() -> Self {
        Self::new(MetadataConfig::default())
    }
}

impl MetadataCollector {
    #[must_use]
    pub fn new(config: MetadataConfig) -> Self {
        let ec2_client = Ec2MetadataClient::new(
            config.ec2_instance_id_url.clone(),
            config.ec2_zone_url.clone(),
            config.metadata_timeout,
        );
        Self {
            config,
            cache: MetadataCache::default(),
            ec2_client,
            runtime: RuntimeStatsReader::new(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut MetadataCache {
        &mut self.cache
    }

    pub fn hostname(&self) -> &str {
        self.cache
            .hostname
            .get_or_init(|| hostname::resolve_hostname(&self.config))
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        std::process::id()
    }

    pub fn distro(&self) -> &str {
        self.cache
            .distro
            .get_or_init(|| distro::get_distro(&self.config.release_root))
    }

    pub fn container_id(&self) -> &str {
        self.cache
            .container_id
            .get_or_init(|| container::get_container_id(&self.config.cgroup_path))
    }

    pub fn addresses(&self) -> &InterfaceAddresses {
        self.cache
            .addresses
            .get_or_init(network::physical_interface_addresses)
    }

    /// Reads the candidate UUID files only while the detection is unresolved.
    pub fn is_ec2_instance(&self) -> bool {
        let mut detection = lock(&self.cache.ec2);
        if *detection == Ec2Detection::Unresolved {
            *detection = Ec2Detection::from(ec2::detect_ec2(&self.config.ec2_uuid_files));
            debug!("EC2 detection resolved to {:?}", *detection);
        }
        *detection == Ec2Detection::Positive
    }

    pub async fn ec2_instance_id(&self) -> String {
        if let Some(id) = lock(&self.cache.ec2_instance_id).clone() {
            return id;
        }
        if !self.is_ec2_instance() {
            return String::new();
        }
        let id = self.ec2_client.instance_id().await;
        if !id.is_empty() {
            *lock(&self.cache.ec2_instance_id) = Some(id.clone());
        }
        id
    }

    pub async fn ec2_availability_zone(&self) -> String {
        if let Some(zone) = lock(&self.cache.ec2_zone).clone() {
            return zone;
        }
        if !self.is_ec2_instance() {
            return String::new();
        }
        let zone = self.ec2_client.availability_zone().await;
        if !zone.is_empty() {
            *lock(&self.cache.ec2_zone) = Some(zone.clone());
        }
        zone
    }

    /// Host and process statistics, read live.
    pub fn live_stats(&self) -> (Option<HostStats>, RuntimeStats) {
        self.runtime.read()
    }

    pub async fn identity(&self) -> HostIdentity {
        let addresses = self.addresses().clone();
        HostIdentity {
            hostname: self.hostname().to_string(),
            pid: self.pid(),
            distro: self.distro().to_string(),
            ec2_instance_id: self.ec2_instance_id().await,
            ec2_availability_zone: self.ec2_availability_zone().await,
            container_id: self.container_id().to_string(),
            ip_addresses: addresses.ipv4,
            mac_addresses: addresses.mac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config_with_uuid_file(path: PathBuf) -> MetadataConfig {
        MetadataConfig {
            ec2_uuid_files: vec![path],
            ec2_instance_id_url: "http://127.0.0.1:1/instance-id".to_string(),
            ec2_zone_url: "http://127.0.0.1:1/zone".to_string(),
            metadata_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[test]
    fn test_ec2_detection_is_cached_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uuid");
        fs::write(&path, "garbage").unwrap();

        let collector = MetadataCollector::new(config_with_uuid_file(path.clone()));
        assert_eq!(collector.cache().ec2_detection(), Ec2Detection::Unresolved);
        assert!(!collector.is_ec2_instance());
        assert_eq!(collector.cache().ec2_detection(), Ec2Detection::Negative);

        fs::write(&path, "ec2e1916-9099-7caf-fd21-012345abcdef").unwrap();
        assert!(!collector.is_ec2_instance(), "cached negative result");

        collector.cache().reset_ec2_detection();
        assert!(collector.is_ec2_instance());
        assert_eq!(collector.cache().ec2_detection(), Ec2Detection::Positive);
    }

    #[tokio::test]
    async fn test_identity_skips_metadata_off_ec2() {
        let dir = tempfile::tempdir().unwrap();
        let collector = MetadataCollector::new(config_with_uuid_file(dir.path().join("none")));
        assert_eq!(collector.ec2_instance_id().await, "");
        assert_eq!(collector.ec2_availability_zone().await, "");
    }

    #[tokio::test]
    async fn test_instance_id_cached_after_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/latest/meta-data/instance-id")
            .with_status(200)
            .with_body("i-12345678")
            .expect(1)
            .create_async()
            .await;

        let collector = MetadataCollector::new(MetadataConfig {
            ec2_instance_id_url: format!("{}/latest/meta-data/instance-id", server.url()),
            metadata_timeout: Duration::from_secs(1),
            ..Default::default()
        });
        collector.cache().set_ec2_detection(Ec2Detection::Positive);

        assert_eq!(collector.ec2_instance_id().await, "i-12345678");
        assert_eq!(collector.ec2_instance_id().await, "i-12345678");
        mock.assert_async().await;
    }

    #[test]
    fn test_invalidate_clears_cache() {
        let mut collector = MetadataCollector::new(MetadataConfig {
            hostname_override: Some("first".to_string()),
            ..Default::default()
        });
        assert_eq!(collector.hostname(), "first");
        collector.cache().set_ec2_detection(Ec2Detection::Negative);

        collector.cache_mut().invalidate();
        assert_eq!(collector.cache().ec2_detection(), Ec2Detection::Unresolved);
        assert_eq!(collector.hostname(), "first");
    }

    #[test]
    fn test_container_id_comes_from_configured_cgroup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cgroup");
        fs::write(&path, "12:pids:/docker/abc123def456\n").unwrap();
        let collector = MetadataCollector::new(MetadataConfig {
            cgroup_path: path,
            ..Default::default()
        });
        assert_eq!(collector.container_id(), "abc123def456");
    }
}
