// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use bson::Bson;

use crate::constants::UNKNOWN;

/// Value of a single `{name, value}` element in the report.
///
/// Anything that has no numeric representation on the wire becomes
/// [`MetricValue::Unknown`], encoded as the string `"unknown"`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Unknown,
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Unknown, Self::Int64)
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Unknown, Self::Int64)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        Self::Float32(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for MetricValue {
    fn from(_: &str) -> Self {
        Self::Unknown
    }
}

impl From<MetricValue> for Bson {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Int32(v) => Bson::Int32(v),
            MetricValue::Int64(v) => Bson::Int64(v),
            MetricValue::Float32(v) => Bson::Double(f64::from(v)),
            MetricValue::Float64(v) => Bson::Double(v),
            MetricValue::Unknown => Bson::String(UNKNOWN.to_string()),
        }
    }
}
