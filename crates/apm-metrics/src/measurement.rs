// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Counter and sum aggregation keyed by name, tag set and `report_sum`.

use std::fmt::Write;

use derive_more::{Display, Into};
use fnv::FnvBuildHasher;
use hashbrown::HashMap;

use crate::tags::SortedTags;

/// Canonical identity of a measurement: `name&reportSum&k1:v1&k2:v2&`.
#[derive(Clone, Debug, Display, Into, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeasurementKey(String);

impl MeasurementKey {
    #[must_use]
    pub fn new(name: &str, tags: &SortedTags, report_sum: bool) -> Self {
        let mut key = String::with_capacity(name.len() + 8 + tags.len() * 16);
        key.push_str(name);
        key.push('&');
        key.push_str(if report_sum { "true" } else { "false" });
        key.push('&');
        for (k, v) in tags.iter() {
            // Writing to a String cannot fail.
            let _ = write!(key, "{k}:{v}&");
        }
        Self(key)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub tags: SortedTags,
    pub sum: f64,
    pub count: i64,
    /// When false only `count` is meaningful and `sum` is not reported.
    pub report_sum: bool,
}

#[derive(Debug, Default)]
pub struct MeasurementAggregator {
    measurements: HashMap<MeasurementKey, Measurement, FnvBuildHasher>,
}

impl MeasurementAggregator {
    /// Adds `value` to the sum and `count_delta` to the count of the entry for
    /// this key, creating it on first use. Tags and `report_sum` are fixed by
    /// the call that created the entry.
    pub fn record(
        &mut self,
        name: &str,
        tags: &SortedTags,
        value: f64,
        count_delta: i64,
        report_sum: bool,
    ) {
        let key = MeasurementKey::new(name, tags, report_sum);
        match self.measurements.get_mut(&key) {
            Some(existing) => {
                existing.sum += value;
                existing.count += count_delta;
            }
            None => {
                self.measurements.insert(
                    key,
                    Measurement {
                        name: name.to_string(),
                        tags: tags.clone(),
                        sum: value,
                        count: count_delta,
                        report_sum,
                    },
                );
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &MeasurementKey) -> Option<&Measurement> {
        self.measurements.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Entries ordered by canonical key.
    #[must_use]
    pub fn sorted(&self) -> Vec<(&MeasurementKey, &Measurement)> {
        let mut entries: Vec<_> = self.measurements.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
