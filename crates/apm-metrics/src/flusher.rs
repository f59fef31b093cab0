// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::errors;
use crate::queue_stats::QueueStatsSource;
use crate::reporter::MetricsReporter;

/// Outbound hand-off for encoded reports. Transport and retry live behind it.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn ship(&self, payload: Vec<u8>) -> Result<(), errors::Shipping>;
}

#[async_trait]
impl ReportSink for mpsc::Sender<Vec<u8>> {
    async fn ship(&self, payload: Vec<u8>) -> Result<(), errors::Shipping> {
        self.send(payload)
            .await
            .map_err(|e| errors::Shipping(e.to_string()))
    }
}

pub struct FlusherConfig {
    pub reporter: Arc<MetricsReporter>,
    pub sink: Arc<dyn ReportSink>,
    pub queue_stats: Arc<dyn QueueStatsSource>,
    pub interval: Duration,
    /// Ship the host identity message before the first report.
    pub send_init: bool,
}

#[derive(Clone)]
pub struct Flusher {
    reporter: Arc<MetricsReporter>,
    sink: Arc<dyn ReportSink>,
    queue_stats: Arc<dyn QueueStatsSource>,
    interval: Duration,
    send_init: bool,
}

impl Flusher {
    #[must_use]
    pub fn new(config: FlusherConfig) -> Self {
        Flusher {
            reporter: config.reporter,
            sink: config.sink,
            queue_stats: config.queue_stats,
            interval: config.interval,
            send_init: config.send_init,
        }
    }

    fn flush_interval_secs(&self) -> i32 {
        i32::try_from(self.interval.as_secs()).unwrap_or(i32::MAX)
    }

    /// Runs one flush cycle. Returns whether a report reached the sink.
    pub async fn flush(&self) -> bool {
        let stats = self.queue_stats.queue_stats();
        let payload = match self.reporter.generate_report(self.flush_interval_secs(), &stats) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode metrics report: {e}");
                return false;
            }
        };
        self.ship(payload).await
    }

    async fn send_init_message(&self) -> bool {
        match self.reporter.generate_init_report().await {
            Ok(payload) => self.ship(payload).await,
            Err(e) => {
                error!("Failed to encode init message: {e}");
                false
            }
        }
    }

    async fn ship(&self, payload: Vec<u8>) -> bool {
        let size = payload.len();
        match self.sink.ship(payload).await {
            Ok(()) => {
                debug!("Shipped {size} byte report");
                true
            }
            Err(e) => {
                error!("{e}");
                false
            }
        }
    }

    /// Flushes once per interval until `cancel` fires. A cycle already in
    /// progress runs to completion.
    pub async fn spin(self, cancel: CancellationToken) {
        if self.send_init {
            self.send_init_message().await;
        }

        let mut ticker = interval(self.interval);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Metrics flusher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }
    }
}
