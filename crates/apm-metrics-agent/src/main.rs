// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use apm_metrics::{
    config::ReporterConfig,
    flusher::{Flusher, FlusherConfig},
    queue_stats::QueueStats,
    reporter::MetricsReporter,
};
use bson::{Bson, Document};
use tokio_util::sync::CancellationToken;

const REPORT_CHANNEL_CAPACITY: usize = 16;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("APM_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ReporterConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on apm metrics agent startup: {e}");
            return;
        }
    };

    let reporter = Arc::new(MetricsReporter::new(&config));
    let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);

    let flusher = Flusher::new(FlusherConfig {
        reporter,
        sink: Arc::new(tx),
        // No trace queue runs in this process; counters stay at zero.
        queue_stats: Arc::new(QueueStats::default),
        interval: config.flush_interval,
        send_init: true,
    });

    let cancel = CancellationToken::new();
    let flusher_handle = tokio::spawn(flusher.spin(cancel.clone()));
    let consumer_handle = tokio::spawn(consume_reports(rx));

    info!(
        "apm metrics agent started, flushing every {}s",
        config.flush_interval.as_secs()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutting down apm metrics agent");
    cancel.cancel();

    if let Err(e) = flusher_handle.await {
        error!("Metrics flusher task failed: {e}");
    }
    // Dropping the flusher closed the channel, so the consumer drains and exits.
    if let Err(e) = consumer_handle.await {
        error!("Report consumer task failed: {e}");
    }
}

async fn consume_reports(mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(payload) = rx.recv().await {
        info!("Received {} byte report", payload.len());
        match Document::from_reader(&mut payload.as_slice()) {
            Ok(doc) => {
                let json = Bson::Document(doc).into_relaxed_extjson();
                debug!("Report contents: {json}");
            }
            Err(e) => error!("Failed to decode report: {e}"),
        }
    }
}
