// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process metrics aggregation and reporting for an APM agent.
//!
//! Instrumentation call sites record measurements and latency histograms into
//! a [`reporter::MetricsReporter`]. Once per flush interval the reporter takes
//! a consistent snapshot, gathers host and runtime facts, and encodes
//! everything into a BSON document for the collector.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod double_buffered_aggregator;
pub mod encoder;
pub mod errors;
pub mod flusher;
pub mod histogram;
pub mod limiter;
pub mod measurement;
pub mod metadata;
pub mod queue_stats;
pub mod reporter;
pub mod span_metrics;
pub mod tags;
pub mod util;
pub mod value;
