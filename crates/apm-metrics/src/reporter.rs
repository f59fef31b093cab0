// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::ReporterConfig;
use crate::double_buffered_aggregator::DoubleBufferedAggregator;
use crate::encoder::{self, MetricsMessage};
use crate::errors;
use crate::metadata::{HostIdentity, MetadataCollector};
use crate::queue_stats::QueueStats;
use crate::span_metrics::{self, HttpSpanMessage};
use crate::tags::SortedTags;

/// Entry point for instrumentation and for the flush loop.
///
/// Recording methods may be called from any thread. `generate_report` is meant
/// to be driven by a single flusher.
#[derive(Debug)]
pub struct MetricsReporter {
    aggregator: DoubleBufferedAggregator,
    metadata: MetadataCollector,
    transaction_name_limit: usize,
    last_timestamp_us: AtomicI64,
}

impl MetricsReporter {
    #[must_use]
    pub fn new(config: &ReporterConfig) -> Self {
        Self::with_metadata(
            MetadataCollector::new(config.metadata.clone()),
            config.transaction_name_limit,
        )
    }

    #[must_use]
    pub fn with_metadata(metadata: MetadataCollector, transaction_name_limit: usize) -> Self {
        Self {
            aggregator: DoubleBufferedAggregator::new(),
            metadata,
            transaction_name_limit,
            last_timestamp_us: AtomicI64::new(0),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataCollector {
        &self.metadata
    }

    pub fn record_measurement(
        &self,
        name: &str,
        tags: &SortedTags,
        value: f64,
        count: i64,
        report_sum: bool,
    ) {
        self.aggregator.with_active(|store| {
            store
                .measurements
                .record(name, tags, value, count, report_sum);
        });
    }

    pub fn record_histogram(&self, name: &str, duration: Duration) {
        self.aggregator
            .with_active(|store| store.histograms.record(name, duration));
    }

    /// Checks `name` against the active interval's transaction name set.
    pub fn is_within_limit(&self, name: &str, max: usize) -> bool {
        self.aggregator
            .with_active(|store| store.transaction_names.admit(name, max))
    }

    pub fn record_span(&self, span: &HttpSpanMessage) {
        let limit = self.transaction_name_limit;
        self.aggregator
            .with_active(|store| span_metrics::record_span(store, span, limit));
    }

    /// Ends the current interval and encodes everything recorded in it.
    ///
    /// The snapshot happens before any metadata is read so samples recorded
    /// while the host facts are gathered go to the next interval. Only local
    /// facts are read here; the EC2 lookups feed the init message alone.
    pub fn generate_report(
        &self,
        flush_interval_secs: i32,
        queue_stats: &QueueStats,
    ) -> Result<Vec<u8>, errors::Encode> {
        let store = self.aggregator.snapshot();

        let addresses = self.metadata.addresses();
        let (host_stats, runtime_stats) = self.metadata.live_stats();
        let message = MetricsMessage {
            hostname: self.metadata.hostname(),
            pid: self.metadata.pid(),
            distro: self.metadata.distro(),
            ip_addresses: &addresses.ipv4,
            mac_addresses: &addresses.mac,
            timestamp_us: self.next_timestamp(),
            flush_interval_secs,
            queue_stats,
            host_stats,
            runtime_stats,
            store: &store,
        };

        let payload = encoder::encode_metrics_message(&message)?;
        debug!(
            "Encoded metrics report: {} measurements, {} histograms, {} bytes",
            store.measurements.len(),
            store.histograms.len(),
            payload.len()
        );
        Ok(payload)
    }

    pub async fn host_identity(&self) -> HostIdentity {
        self.metadata.identity().await
    }

    pub async fn generate_init_report(&self) -> Result<Vec<u8>, errors::Encode> {
        let identity = self.host_identity().await;
        if let Ok(json) = serde_json::to_string(&identity) {
            debug!("Host identity: {json}");
        }
        encoder::encode_init_message(&identity, self.next_timestamp())
    }

    /// Wall clock in microseconds, bumped past the previous value when the
    /// clock has not advanced or went backwards.
    fn next_timestamp(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX));
        let mut last = self.last_timestamp_us.load(Ordering::Acquire);
        loop {
            let next = now.max(last.saturating_add(1));
            match self.last_timestamp_us.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataConfig;
    use crate::tags::EMPTY_TAGS;
    use bson::Document;

    fn reporter() -> MetricsReporter {
        let metadata = MetadataCollector::new(MetadataConfig {
            ec2_uuid_files: vec![],
            hostname_override: Some("test-host".to_string()),
            ..MetadataConfig::default()
        });
        MetricsReporter::with_metadata(metadata, 3)
    }

    fn decode(bytes: &[u8]) -> Document {
        Document::from_reader(&mut &bytes[..]).unwrap()
    }

    fn named<'a>(doc: &'a Document, name: &str) -> Vec<&'a Document> {
        doc.get_array("measurements")
            .unwrap()
            .iter()
            .filter_map(|m| m.as_document())
            .filter(|m| m.get_str("name").ok() == Some(name))
            .collect()
    }

    #[test]
    fn test_report_contains_recorded_measurement() {
        let reporter = reporter();
        let tags = SortedTags::from([("service", "web")]);
        reporter.record_measurement("requests", &tags, 2.5, 1, true);
        reporter.record_measurement("requests", &tags, 1.5, 2, true);

        let stats = QueueStats {
            request_count: 7,
            ..QueueStats::default()
        };
        let doc = decode(&reporter.generate_report(30, &stats).unwrap());
        assert_eq!(doc.get_str("Hostname").unwrap(), "test-host");
        assert_eq!(doc.get_i32("MetricsFlushInterval").unwrap(), 30);

        let requests = named(&doc, "requests");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].get_i32("count").unwrap(), 3);
        assert_eq!(requests[0].get_f64("sum").unwrap(), 4.0);

        let request_count = named(&doc, "RequestCount");
        assert_eq!(request_count[0].get_i64("value").unwrap(), 7);
    }

    #[test]
    fn test_report_resets_interval() {
        let reporter = reporter();
        reporter.record_measurement("m", &EMPTY_TAGS, 1.0, 1, false);
        reporter.record_histogram("tx", Duration::from_millis(5));
        assert!(reporter.is_within_limit("a", 1));
        assert!(!reporter.is_within_limit("b", 1));

        let stats = QueueStats::default();
        let first = decode(&reporter.generate_report(30, &stats).unwrap());
        assert_eq!(named(&first, "m").len(), 1);
        assert_eq!(named(&first, "TransactionResponseTime").len(), 1);

        let second = decode(&reporter.generate_report(30, &stats).unwrap());
        assert!(named(&second, "m").is_empty());
        assert!(named(&second, "TransactionResponseTime").is_empty());
        assert!(reporter.is_within_limit("b", 1));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let reporter = reporter();
        let stats = QueueStats::default();
        let mut previous = 0;
        for _ in 0..5 {
            let doc = decode(&reporter.generate_report(1, &stats).unwrap());
            let ts = doc.get_i64("Timestamp_u").unwrap();
            assert!(ts > previous);
            previous = ts;
        }
    }

    #[test]
    fn test_span_overflow_flag() {
        let reporter = reporter();
        for name in ["t1", "t2", "t3", "t4"] {
            reporter.record_span(&HttpSpanMessage {
                transaction: name.to_string(),
                duration: Duration::from_millis(1),
                ..HttpSpanMessage::default()
            });
        }
        let doc = decode(
            &reporter
                .generate_report(30, &QueueStats::default())
                .unwrap(),
        );
        assert_eq!(doc.get_bool("TransactionNameOverflow").unwrap(), true);
        let other = named(&doc, "TransactionResponseTime")
            .into_iter()
            .filter(|m| {
                m.get_document("tags")
                    .ok()
                    .and_then(|t| t.get_str("TransactionName").ok())
                    == Some("other")
            })
            .count();
        assert!(other > 0);
    }

    #[test]
    fn test_debug_output() {
        let debug = format!("{:?}", reporter());
        assert!(debug.contains("MetricsReporter"));
        assert!(debug.contains("transaction_name_limit: 3"));
    }

    #[tokio::test]
    async fn test_init_report() {
        let reporter = reporter();
        let doc = decode(&reporter.generate_init_report().await.unwrap());
        assert_eq!(doc.get_bool("__Init").unwrap(), true);
        assert_eq!(doc.get_str("Hostname").unwrap(), "test-host");
        assert!(!doc.contains_key("EC2InstanceID"));
    }
}
