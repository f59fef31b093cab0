// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Counters owned by the sampling layer and the event queue, reported as-is
/// with every metrics message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub request_count: i64,
    pub trace_count: i64,
    pub token_bucket_exhaustion_count: i64,
    pub sample_count: i64,
    pub through_trace_count: i64,
    pub num_sent: i64,
    pub num_overflowed: i64,
    pub num_failed: i64,
    pub total_events: i64,
    /// High-water mark of the event queue during the interval.
    pub queue_largest: i64,
}

impl QueueStats {
    /// Wire names in report order.
    #[must_use]
    pub fn named_values(&self) -> [(&'static str, i64); 10] {
        [
            ("RequestCount", self.request_count),
            ("TraceCount", self.trace_count),
            ("TokenBucketExhaustionCount", self.token_bucket_exhaustion_count),
            ("SampleCount", self.sample_count),
            ("ThroughTraceCount", self.through_trace_count),
            ("NumSent", self.num_sent),
            ("NumOverflowed", self.num_overflowed),
            ("NumFailed", self.num_failed),
            ("TotalEvents", self.total_events),
            ("QueueLargest", self.queue_largest),
        ]
    }
}

/// Supplies queue statistics at flush time, usually by draining counters.
pub trait QueueStatsSource: Send + Sync {
    fn queue_stats(&self) -> QueueStats;
}

impl<F> QueueStatsSource for F
where
    F: Fn() -> QueueStats + Send + Sync,
{
    fn queue_stats(&self) -> QueueStats {
        self()
    }
}
