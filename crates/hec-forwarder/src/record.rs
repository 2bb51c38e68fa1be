// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kinesis invocation input and the partial batch response returned to it.
//!
//! The record payload is kept as the base64 text Kinesis delivers, so the
//! decoder owns the whole base64 -> gzip -> JSON chain.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One Lambda invocation worth of Kinesis records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct KinesisEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<KinesisEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisEventRecord {
    pub kinesis: RawRecord,
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_source_arn: Option<String>,
}

/// Opaque record payload plus the tokens identifying it in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Base64 payload, usually a gzip-compressed CloudWatch Logs batch.
    pub data: String,
    pub sequence_number: String,
    #[serde(default)]
    pub partition_key: String,
}

impl KinesisEventRecord {
    #[must_use]
    pub fn sequence_number(&self) -> &str {
        &self.kinesis.sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Partial batch response: the sequence numbers the scheduler must redeliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisEventResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

/// Failed record identifiers, kept unique and in first-failure order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    failed: Vec<String>,
    seen: HashSet<String>,
}

impl FailureReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a record as failed. Returns `false` if it was already marked.
    pub fn mark_failed(&mut self, sequence_number: &str) -> bool {
        if !self.seen.insert(sequence_number.to_string()) {
            return false;
        }
        self.failed.push(sequence_number.to_string());
        true
    }

    #[must_use]
    pub fn contains(&self, sequence_number: &str) -> bool {
        self.seen.contains(sequence_number)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(String::as_str)
    }
}

impl From<FailureReport> for KinesisEventResponse {
    fn from(report: FailureReport) -> Self {
        KinesisEventResponse {
            batch_item_failures: report
                .failed
                .into_iter()
                .map(|item_identifier| BatchItemFailure { item_identifier })
                .collect(),
        }
    }
}
