// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failure to build a histogram with the configured bounds.
#[derive(Debug, Error)]
#[error("failed to create histogram: {0}")]
pub struct Creation(#[from] pub hdrhistogram::CreationError);

#[derive(Debug, Error)]
pub enum Encode {
    #[error("failed to serialize message: {0}")]
    Bson(#[from] bson::ser::Error),
    #[error("failed to serialize histogram: {0}")]
    Histogram(String),
}

/// The sink refused or could not take a report.
#[derive(Debug, Error)]
#[error("failed to ship report: {0}")]
pub struct Shipping(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Config {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
