// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    CGROUP_PATH, DEFAULT_FLUSH_INTERVAL, DEFAULT_METADATA_TIMEOUT, DEFAULT_TRANSACTION_NAME_LIMIT,
    EC2_METADATA_INSTANCE_ID_URL, EC2_METADATA_ZONE_URL, EC2_UUID_FILES, RELEASE_ROOT,
};
use crate::errors;

/// Where host facts are read from. Every location can be overridden so tests
/// can point the collector at fixtures and mock servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    /// Candidate files holding the DMI system UUID, checked in order.
    pub ec2_uuid_files: Vec<PathBuf>,
    pub ec2_instance_id_url: String,
    pub ec2_zone_url: String,
    pub cgroup_path: PathBuf,
    /// Directory holding the distro release files.
    pub release_root: PathBuf,
    /// Upper bound for a single instance metadata request.
    pub metadata_timeout: Duration,
    /// Overrides hostname detection when set.
    pub hostname_override: Option<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            ec2_uuid_files: EC2_UUID_FILES.iter().map(PathBuf::from).collect(),
            ec2_instance_id_url: EC2_METADATA_INSTANCE_ID_URL.to_string(),
            ec2_zone_url: EC2_METADATA_ZONE_URL.to_string(),
            cgroup_path: PathBuf::from(CGROUP_PATH),
            release_root: PathBuf::from(RELEASE_ROOT),
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
            hostname_override: None,
        }
    }
}

/// Configuration for the reporter and its flush loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    pub flush_interval: Duration,
    /// Distinct transaction names accepted per flush interval.
    pub transaction_name_limit: usize,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
    pub metadata: MetadataConfig,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            transaction_name_limit: DEFAULT_TRANSACTION_NAME_LIMIT,
            log_level: "info".to_string(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl ReporterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, errors::Config> {
        let defaults = Self::default();

        let flush_interval = env::var("APM_METRICS_FLUSH_INTERVAL")
            .ok()
            .and_then(|secs| secs.trim().parse::<u64>().ok())
            .map_or(defaults.flush_interval, Duration::from_secs);
        let transaction_name_limit = env::var("APM_TRANSACTION_NAME_LIMIT")
            .ok()
            .and_then(|limit| limit.trim().parse::<usize>().ok())
            .unwrap_or(defaults.transaction_name_limit);
        let log_level = env::var("APM_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);
        let metadata_timeout = env::var("APM_METADATA_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .map_or(defaults.metadata.metadata_timeout, Duration::from_millis);
        let hostname_override = env::var("APM_HOSTNAME")
            .ok()
            .filter(|hostname| !hostname.is_empty());

        let config = Self {
            flush_interval,
            transaction_name_limit,
            log_level,
            metadata: MetadataConfig {
                metadata_timeout,
                hostname_override,
                ..defaults.metadata
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), errors::Config> {
        if self.flush_interval.as_secs() == 0 {
            return Err(errors::Config::Invalid(
                "flush interval must be at least one second".to_string(),
            ));
        }
        if i32::try_from(self.flush_interval.as_secs()).is_err() {
            return Err(errors::Config::Invalid(
                "flush interval is too large".to_string(),
            ));
        }
        if self.metadata.metadata_timeout.is_zero() {
            return Err(errors::Config::Invalid(
                "metadata timeout must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(errors::Config::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReporterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.transaction_name_limit, 200);
        assert_eq!(config.metadata.ec2_uuid_files.len(), 2);
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = ReporterConfig {
            flush_interval: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(errors::Config::Invalid(_))));
    }

    #[test]
    fn test_validate_log_level() {
        let config = ReporterConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = ReporterConfig::default();
        config.metadata.metadata_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
