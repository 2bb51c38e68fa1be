// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! CloudWatch Logs subscription batches and collector events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A CloudWatch Logs subscription batch, as found inside one Kinesis record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedLogBatch {
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub log_group: Option<String>,
    #[serde(default)]
    pub log_stream: Option<String>,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    pub log_events: Vec<LogLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LogLine {
    #[serde(default)]
    pub id: Option<String>,
    /// Milliseconds since the epoch. Direct producers may send a float.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One collector event, serialized as a single line of the request body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputEvent {
    /// Seconds since the epoch, fractional.
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub sourcetype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    pub event: Map<String, Value>,
}

/// Serializes events as newline-delimited compact JSON, without a trailing
/// newline.
///
/// Compact serialization escapes control characters, so each event occupies
/// exactly one line.
pub fn encode_events(events: &[OutputEvent]) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = Vec::with_capacity(events.len() * 256);
    for (i, event) in events.iter().enumerate() {
        if i > 0 {
            body.push(b'\n');
        }
        serde_json::to_writer(&mut body, event)?;
    }
    Ok(body)
}
