// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Lowest value the latency histogram can tell apart from zero.
pub const HISTOGRAM_LOWEST_DISCERNIBLE: u64 = 1;
/// One hour in microseconds.
pub const HISTOGRAM_HIGHEST_TRACKABLE: u64 = 3_600_000_000;
pub const HISTOGRAM_SIGNIFICANT_FIGURES: u8 = 3;

pub const MAX_TAG_KEY_LENGTH: usize = 64;
pub const MAX_TAG_VALUE_LENGTH: usize = 255;

/// Reserved name shared by response time measurements and histograms.
pub const TRANSACTION_RESPONSE_TIME: &str = "TransactionResponseTime";
pub const TRANSACTION_NAME_TAG: &str = "TransactionName";
pub const HTTP_METHOD_TAG: &str = "HttpMethod";
pub const HTTP_STATUS_TAG: &str = "HttpStatus";
pub const ERRORS_TAG: &str = "Errors";
/// Transaction name used once the per-interval limit is exhausted.
pub const OTHER_TRANSACTION_NAME: &str = "other";

pub const DEFAULT_TRANSACTION_NAME_LIMIT: usize = 200;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(1);

pub const EC2_UUID_FILES: [&str; 2] = [
    "/sys/hypervisor/uuid",
    "/sys/devices/virtual/dmi/id/product_uuid",
];
pub const EC2_METADATA_INSTANCE_ID_URL: &str =
    "http://169.254.169.254/latest/meta-data/instance-id";
pub const EC2_METADATA_ZONE_URL: &str =
    "http://169.254.169.254/latest/meta-data/placement/availability-zone";
pub const CGROUP_PATH: &str = "/proc/self/cgroup";
pub const RELEASE_ROOT: &str = "/etc";

/// Returned for any host fact that cannot be resolved.
pub const UNKNOWN: &str = "unknown";
