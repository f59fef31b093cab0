// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! BSON wire messages for the collector.
//!
//! Field order, type mapping and tag truncation are part of the collector
//! contract. A metrics message is laid out as:
//!
//! ```text
//! Hostname, PID, Distro, [IPAddresses], [MACAddresses], Timestamp_u,
//! MetricsFlushInterval, measurements[...], [TransactionNameOverflow]
//! ```
//!
//! `measurements` holds, in order, the queue statistics, the host block, the
//! runtime block, every aggregated measurement sorted by key and every
//! histogram sorted by key.

use bson::{Bson, Document};
use tracing::{debug, warn};

use crate::constants::{MAX_TAG_KEY_LENGTH, MAX_TAG_VALUE_LENGTH, TRANSACTION_RESPONSE_TIME};
use crate::double_buffered_aggregator::Store;
use crate::errors;
use crate::histogram::HistogramEntry;
use crate::measurement::Measurement;
use crate::metadata::runtime::{HostStats, RuntimeStats};
use crate::metadata::HostIdentity;
use crate::queue_stats::QueueStats;
use crate::tags::SortedTags;
use crate::util::truncate_utf8;
use crate::value::MetricValue;

/// Inputs of one metrics message, captured after the snapshot was taken.
#[derive(Debug)]
pub struct MetricsMessage<'a> {
    pub hostname: &'a str,
    pub pid: u32,
    pub distro: &'a str,
    pub ip_addresses: &'a [String],
    pub mac_addresses: &'a [String],
    pub timestamp_us: i64,
    pub flush_interval_secs: i32,
    pub queue_stats: &'a QueueStats,
    pub host_stats: Option<HostStats>,
    pub runtime_stats: RuntimeStats,
    pub store: &'a Store,
}

fn pid_value(pid: u32) -> Bson {
    Bson::Int32(i32::try_from(pid).unwrap_or(i32::MAX))
}

fn integer_value(value: i64) -> Bson {
    i32::try_from(value).map_or(Bson::Int64(value), Bson::Int32)
}

/// Tags as a sub-document in key order, with keys and values truncated.
///
/// A document cannot repeat a key, so when two keys share the same truncated
/// prefix the first one in key order is kept and the later ones are dropped.
#[must_use]
pub fn tags_document(tags: &SortedTags) -> Document {
    let mut doc = Document::new();
    for (key, value) in tags.iter() {
        let key = truncate_utf8(key, MAX_TAG_KEY_LENGTH);
        if doc.contains_key(key) {
            debug!("Dropping tag colliding with '{key}' after truncation");
            continue;
        }
        doc.insert(key, truncate_utf8(value, MAX_TAG_VALUE_LENGTH));
    }
    doc
}

#[must_use]
pub fn value_element(name: &str, value: MetricValue) -> Document {
    let mut doc = Document::new();
    doc.insert("name", name);
    doc.insert("value", Bson::from(value));
    doc
}

#[must_use]
pub fn measurement_element(measurement: &Measurement) -> Document {
    let mut doc = Document::new();
    doc.insert("name", measurement.name.as_str());
    doc.insert("count", integer_value(measurement.count));
    if measurement.report_sum {
        doc.insert("sum", measurement.sum);
    }
    doc.insert("tags", tags_document(&measurement.tags));
    doc
}

pub fn histogram_element(histogram: &HistogramEntry) -> Result<Document, errors::Encode> {
    let mut doc = Document::new();
    doc.insert("name", TRANSACTION_RESPONSE_TIME);
    doc.insert("value", histogram.encode()?);
    doc.insert("tags", tags_document(&histogram.tags));
    Ok(doc)
}

fn queue_stats_elements(stats: &QueueStats) -> impl Iterator<Item = Document> + '_ {
    stats
        .named_values()
        .into_iter()
        .map(|(name, value)| value_element(name, MetricValue::Int64(value)))
}

fn host_elements(host: &HostStats) -> Vec<Document> {
    vec![
        value_element("Load1", MetricValue::Float64(host.load1)),
        value_element("TotalRAM", MetricValue::from(host.total_ram)),
        value_element("FreeRAM", MetricValue::from(host.free_ram)),
        process_ram_element(host.process_ram),
    ]
}

fn process_ram_element(process_ram: u64) -> Document {
    let mut doc = Document::new();
    doc.insert("name", "ProcessRAM");
    doc.insert(
        "value",
        integer_value(i64::try_from(process_ram).unwrap_or(i64::MAX)),
    );
    doc
}

fn runtime_elements(runtime: &RuntimeStats) -> Vec<Document> {
    let mut elements = Vec::with_capacity(5);
    if let Some(threads) = runtime.threads {
        elements.push(value_element(
            "JMX.type=threadcount,name=NumThreads",
            MetricValue::Int32(threads),
        ));
    }
    elements.push(value_element(
        "JMX.Memory:Process.Resident",
        MetricValue::from(runtime.resident_bytes),
    ));
    elements.push(value_element(
        "JMX.Memory:Process.Virtual",
        MetricValue::from(runtime.virtual_bytes),
    ));
    if let Some(peak) = runtime.peak_resident_bytes {
        elements.push(value_element(
            "JMX.Memory:Process.ResidentPeak",
            MetricValue::from(peak),
        ));
    }
    if let Some(data) = runtime.data_bytes {
        elements.push(value_element("JMX.Memory:Process.Data", MetricValue::from(data)));
    }
    elements
}

fn measurements_array(message: &MetricsMessage<'_>) -> Vec<Bson> {
    let mut elements: Vec<Document> = queue_stats_elements(message.queue_stats).collect();
    if let Some(host) = &message.host_stats {
        elements.extend(host_elements(host));
    }
    elements.extend(runtime_elements(&message.runtime_stats));

    for (_, measurement) in message.store.measurements.sorted() {
        elements.push(measurement_element(measurement));
    }
    for (name, histogram) in message.store.histograms.sorted() {
        match histogram_element(histogram) {
            Ok(element) => elements.push(element),
            Err(e) => warn!("Dropping histogram '{name}' from report: {e}"),
        }
    }

    elements.into_iter().map(Bson::Document).collect()
}

/// Builds the ordered metrics document.
#[must_use]
pub fn metrics_document(message: &MetricsMessage<'_>) -> Document {
    let mut doc = Document::new();
    doc.insert("Hostname", message.hostname);
    doc.insert("PID", pid_value(message.pid));
    doc.insert("Distro", message.distro);
    if !message.ip_addresses.is_empty() {
        doc.insert("IPAddresses", message.ip_addresses.to_vec());
    }
    if !message.mac_addresses.is_empty() {
        doc.insert("MACAddresses", message.mac_addresses.to_vec());
    }
    doc.insert("Timestamp_u", Bson::Int64(message.timestamp_us));
    doc.insert("MetricsFlushInterval", Bson::Int32(message.flush_interval_secs));
    doc.insert("measurements", measurements_array(message));
    if message.store.transaction_name_overflow {
        doc.insert("TransactionNameOverflow", true);
    }
    doc
}

pub fn encode_metrics_message(message: &MetricsMessage<'_>) -> Result<Vec<u8>, errors::Encode> {
    to_bytes(&metrics_document(message))
}

/// Builds the one-off init message describing the host.
#[must_use]
pub fn init_document(identity: &HostIdentity, timestamp_us: i64) -> Document {
    let mut doc = Document::new();
    doc.insert("__Init", true);
    doc.insert("Hostname", identity.hostname.as_str());
    doc.insert("PID", pid_value(identity.pid));
    doc.insert("Distro", identity.distro.as_str());
    for (key, value) in [
        ("EC2InstanceID", &identity.ec2_instance_id),
        ("EC2AvailabilityZone", &identity.ec2_availability_zone),
        ("DockerContainerID", &identity.container_id),
    ] {
        if !value.is_empty() {
            doc.insert(key, value.as_str());
        }
    }
    if !identity.ip_addresses.is_empty() {
        doc.insert("IPAddresses", identity.ip_addresses.clone());
    }
    if !identity.mac_addresses.is_empty() {
        doc.insert("MACAddresses", identity.mac_addresses.clone());
    }
    doc.insert("Timestamp_u", Bson::Int64(timestamp_us));
    doc
}

pub fn encode_init_message(
    identity: &HostIdentity,
    timestamp_us: i64,
) -> Result<Vec<u8>, errors::Encode> {
    to_bytes(&init_document(identity, timestamp_us))
}

fn to_bytes(doc: &Document) -> Result<Vec<u8>, errors::Encode> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf)?;
    Ok(buf)
}
