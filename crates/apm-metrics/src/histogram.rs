// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Latency histograms keyed by transaction name.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use hdrhistogram::serialization::{Serializer, V2DeflateSerializer};
use hdrhistogram::{Histogram, RecordError};
use tracing::{debug, warn};

use crate::constants::{
    HISTOGRAM_HIGHEST_TRACKABLE, HISTOGRAM_LOWEST_DISCERNIBLE, HISTOGRAM_SIGNIFICANT_FIGURES,
    TRANSACTION_NAME_TAG,
};
use crate::errors;
use crate::tags::SortedTags;

#[derive(Clone, Debug)]
pub struct HistogramEntry {
    hist: Histogram<u64>,
    pub tags: SortedTags,
}

impl HistogramEntry {
    pub fn new(tags: SortedTags) -> Result<Self, errors::Creation> {
        let hist = Histogram::new_with_bounds(
            HISTOGRAM_LOWEST_DISCERNIBLE,
            HISTOGRAM_HIGHEST_TRACKABLE,
            HISTOGRAM_SIGNIFICANT_FIGURES,
        )?;
        Ok(Self { hist, tags })
    }

    /// Records a value in microseconds.
    pub fn record(&mut self, value: u64) -> Result<(), RecordError> {
        self.hist.record(value)
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.hist.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    /// Base64 text of the V2 deflate-compressed HdrHistogram encoding.
    pub fn encode(&self) -> Result<String, errors::Encode> {
        let mut buf = Vec::new();
        V2DeflateSerializer::new()
            .serialize(&self.hist, &mut buf)
            .map_err(|e| errors::Encode::Histogram(format!("{e:?}")))?;
        Ok(STANDARD.encode(buf))
    }
}

#[derive(Debug, Default)]
pub struct HistogramAggregator {
    histograms: HashMap<String, HistogramEntry, FnvBuildHasher>,
}

impl HistogramAggregator {
    /// Records `duration` into the histogram for `name`, creating the entry if
    /// needed. Samples beyond the trackable range are logged and dropped; the
    /// entry is kept either way.
    pub fn record(&mut self, name: &str, duration: Duration) {
        let entry = match self.histograms.entry(name.to_string()) {
            hashbrown::hash_map::Entry::Occupied(occupied) => occupied.into_mut(),
            hashbrown::hash_map::Entry::Vacant(vacant) => {
                let mut tags = SortedTags::new();
                if !name.is_empty() {
                    tags.insert(TRANSACTION_NAME_TAG, name);
                }
                match HistogramEntry::new(tags) {
                    Ok(entry) => vacant.insert(entry),
                    Err(e) => {
                        warn!("Failed to create histogram for '{name}': {e}");
                        return;
                    }
                }
            }
        };

        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        match entry.record(micros) {
            Ok(()) => {}
            Err(RecordError::ValueOutOfRangeResizeDisabled) => {
                warn!("Failed to record histogram: value too large ({micros}us) for '{name}'");
            }
            Err(e) => {
                debug!("Failed to record histogram for '{name}': {e:?}");
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HistogramEntry> {
        self.histograms.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Entries ordered by histogram key.
    #[must_use]
    pub fn sorted(&self) -> Vec<(&str, &HistogramEntry)> {
        let mut entries: Vec<_> = self
            .histograms
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdrhistogram::serialization::Deserializer;
    use tracing_test::traced_test;

    #[test]
    fn test_record_histogram() {
        let mut aggregator = HistogramAggregator::default();
        aggregator.record("", Duration::from_micros(123));
        aggregator.record("", Duration::from_micros(1554));
        let h = aggregator.get("").expect("entry should exist");
        assert!(h.tags.get(TRANSACTION_NAME_TAG).is_none());
        assert_eq!(h.len(), 2);

        aggregator.record("hist1", Duration::from_micros(453_122));
        let h = aggregator.get("hist1").expect("entry should exist");
        assert_eq!(h.tags.get(TRANSACTION_NAME_TAG), Some("hist1"));
        assert_eq!(h.len(), 1);
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_value_too_large_is_dropped() {
        let mut aggregator = HistogramAggregator::default();
        aggregator.record("hist2", Duration::from_nanos(4_531_224_545_454_563));
        assert!(logs_contain("value too large"));

        let h = aggregator.get("hist2").expect("entry should be kept");
        assert!(h.is_empty());

        aggregator.record("hist2", Duration::from_micros(10));
        assert_eq!(aggregator.get("hist2").map(HistogramEntry::len), Some(1));
    }

    #[test]
    fn test_upper_bound_is_trackable() {
        let mut aggregator = HistogramAggregator::default();
        aggregator.record("edge", Duration::from_micros(HISTOGRAM_HIGHEST_TRACKABLE));
        assert_eq!(aggregator.get("edge").map(HistogramEntry::len), Some(1));
    }

    #[test]
    fn test_encode_round_trips_through_deserializer() {
        let mut entry = HistogramEntry::new(SortedTags::new()).expect("valid bounds");
        entry.record(34_532_123).expect("in range");
        entry.record(39_023).expect("in range");

        let text = entry.encode().expect("encode");
        assert!(text.starts_with("HISTF"), "unexpected prefix: {text}");

        let bytes = STANDARD.decode(text).expect("valid base64");
        let decoded: Histogram<u64> = Deserializer::new()
            .deserialize(&mut bytes.as_slice())
            .expect("valid histogram");
        assert_eq!(decoded.len(), 2);
        assert!(decoded.equivalent(39_023, decoded.min()));
    }
}
