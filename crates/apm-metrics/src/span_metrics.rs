// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns finished HTTP spans into response time measurements and histograms.

use std::time::Duration;

use crate::constants::{
    ERRORS_TAG, HTTP_METHOD_TAG, HTTP_STATUS_TAG, OTHER_TRANSACTION_NAME,
    TRANSACTION_NAME_TAG, TRANSACTION_RESPONSE_TIME,
};
use crate::double_buffered_aggregator::Store;
use crate::tags::SortedTags;
use crate::util::transaction_from_url;

/// Summary of a finished HTTP span as handed over by instrumentation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpSpanMessage {
    /// Explicit transaction name; derived from `url` when empty.
    pub transaction: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub has_error: bool,
    pub duration: Duration,
}

impl HttpSpanMessage {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.has_error || self.status >= 500
    }

    fn transaction_name(&self) -> String {
        if self.transaction.is_empty() {
            transaction_from_url(&self.url)
        } else {
            self.transaction.clone()
        }
    }
}

/// Records one span into `store`. Transaction names beyond `limit` distinct
/// names per interval are folded into `other` and flag the overflow.
pub fn record_span(store: &mut Store, span: &HttpSpanMessage, limit: usize) {
    let mut transaction = span.transaction_name();
    if !store.transaction_names.admit(&transaction, limit) {
        transaction = OTHER_TRANSACTION_NAME.to_string();
        store.transaction_name_overflow = true;
    }

    store.histograms.record("", span.duration);
    store.histograms.record(&transaction, span.duration);

    let micros = span.duration.as_micros() as f64;
    let primary = SortedTags::from([(TRANSACTION_NAME_TAG, transaction.as_str())]);
    let measurements = &mut store.measurements;
    measurements.record(TRANSACTION_RESPONSE_TIME, &primary, micros, 1, true);

    if !span.method.is_empty() {
        let with_method = primary.with(HTTP_METHOD_TAG, span.method.as_str());
        measurements.record(TRANSACTION_RESPONSE_TIME, &with_method, micros, 1, true);
    }

    if span.status != 0 {
        let with_status = primary.with(HTTP_STATUS_TAG, span.status.to_string());
        measurements.record(TRANSACTION_RESPONSE_TIME, &with_status, micros, 1, true);
    }

    if span.is_error() {
        let with_errors = primary.with(ERRORS_TAG, "true");
        measurements.record(TRANSACTION_RESPONSE_TIME, &with_errors, micros, 1, true);
    }
}
