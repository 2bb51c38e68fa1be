// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reshaping of decoded records into collector events.
//!
//! A decoded record is one of:
//!
//! - a CloudWatch Logs subscription batch (a JSON object carrying
//!   `logEvents`), producing one event per log line, or nothing at all for
//!   control messages
//! - any other JSON value, producing a single `_json` event
//! - plain text, producing a single `text` event
//!
//! Log lines whose message is itself a JSON object get the parsed fields
//! overlaid on the event body. The transformation is pure.

use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::constants::{CONTROL_MESSAGE, DATA_MESSAGE, GENERIC_JSON_SOURCETYPE, TEXT_SOURCETYPE};
use crate::decoder::DecodedPayload;
use crate::error::TransformError;
use crate::event::{DecodedLogBatch, LogLine, OutputEvent};

/// Tags attached to every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTags {
    /// Source override. `None` falls back to the batch's log group.
    pub source: Option<String>,
    /// Sourcetype for CloudWatch events. Generic JSON and text events use
    /// their own fixed sourcetypes.
    pub sourcetype: String,
    /// `None` lets the collector token's default index apply.
    pub index: Option<String>,
    /// Copy the CloudWatch event id into the body.
    pub include_event_id: bool,
}

#[derive(Debug, Clone)]
pub struct EventTransformer {
    tags: EventTags,
}

impl EventTransformer {
    #[must_use]
    pub fn new(tags: EventTags) -> Self {
        Self { tags }
    }

    /// Converts one decoded record into zero or more events.
    ///
    /// Only a `logEvents` batch that fails to deserialize is an error.
    pub fn transform(&self, decoded: DecodedPayload) -> Result<Vec<OutputEvent>, TransformError> {
        match decoded {
            DecodedPayload::Json(Value::Object(map)) if map.contains_key("logEvents") => {
                let batch: DecodedLogBatch = serde_json::from_value(Value::Object(map))
                    .map_err(TransformError::MalformedLogBatch)?;
                Ok(self.transform_log_batch(&batch))
            }
            DecodedPayload::Json(Value::Object(map)) => Ok(vec![self.generic_json_event(map)]),
            DecodedPayload::Json(other) => {
                let mut body = Map::new();
                body.insert("message".to_string(), other);
                Ok(vec![self.generic_json_event(body)])
            }
            DecodedPayload::Text(text) => Ok(vec![self.text_event(text)]),
        }
    }

    /// Converts a subscription batch. Anything other than a data message is
    /// skipped.
    #[must_use]
    pub fn transform_log_batch(&self, batch: &DecodedLogBatch) -> Vec<OutputEvent> {
        match batch.message_type.as_deref() {
            // Direct producers sometimes omit the message type.
            None | Some(DATA_MESSAGE) => {}
            Some(CONTROL_MESSAGE) => {
                debug!(
                    "Skipping control message for log group {:?}",
                    batch.log_group
                );
                return Vec::new();
            }
            Some(other) => {
                warn!("Skipping log batch with unknown messageType {other:?}");
                return Vec::new();
            }
        }

        let source = self.tags.source.clone().or_else(|| batch.log_group.clone());
        batch
            .log_events
            .iter()
            .map(|line| self.log_line_event(batch, line, source.clone()))
            .collect()
    }

    fn log_line_event(
        &self,
        batch: &DecodedLogBatch,
        line: &LogLine,
        source: Option<String>,
    ) -> OutputEvent {
        let message = line.message.clone().unwrap_or_default();

        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(message.clone()));
        body.insert("owner".to_string(), optional_string(&batch.owner));
        body.insert("logGroup".to_string(), optional_string(&batch.log_group));
        body.insert("logStream".to_string(), optional_string(&batch.log_stream));
        if self.tags.include_event_id {
            if let Some(id) = &line.id {
                body.insert("id".to_string(), Value::String(id.clone()));
            }
        }
        merge_inline_json(&mut body, &message);

        OutputEvent {
            time: line.timestamp.map_or_else(now_secs, millis_to_secs),
            source,
            sourcetype: self.tags.sourcetype.clone(),
            index: self.tags.index.clone(),
            event: body,
        }
    }

    fn generic_json_event(&self, body: Map<String, Value>) -> OutputEvent {
        OutputEvent {
            time: now_secs(),
            source: self.tags.source.clone(),
            sourcetype: GENERIC_JSON_SOURCETYPE.to_string(),
            index: self.tags.index.clone(),
            event: body,
        }
    }

    fn text_event(&self, text: String) -> OutputEvent {
        let mut body = Map::new();
        body.insert("message".to_string(), Value::String(text));
        OutputEvent {
            time: now_secs(),
            source: self.tags.source.clone(),
            sourcetype: TEXT_SOURCETYPE.to_string(),
            index: self.tags.index.clone(),
            event: body,
        }
    }
}

/// Overlays the fields of an inline JSON object message onto `body`.
///
/// The message qualifies when, once trimmed, it starts with `{` and ends
/// with `}`. Parsed fields replace base fields of the same name and new
/// fields are appended; nothing is removed. Returns whether a merge
/// happened. A message that fails to parse leaves `body` untouched.
pub fn merge_inline_json(body: &mut Map<String, Value>, message: &str) -> bool {
    let trimmed = message.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return false;
    }
    match serde_json::from_str::<Map<String, Value>>(trimmed) {
        Ok(parsed) => {
            for (key, value) in parsed {
                body.insert(key, value);
            }
            true
        }
        Err(e) => {
            debug!("Message looks like JSON but did not parse: {e}");
            false
        }
    }
}

fn optional_string(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}

fn millis_to_secs(millis: f64) -> f64 {
    millis / 1000.0
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{decode_record, tests::gzip_base64};
    use serde_json::json;

    fn tags() -> EventTags {
        EventTags {
            source: Some("cloudwatch".to_string()),
            sourcetype: "aws:cloudwatchlogs".to_string(),
            index: Some("main".to_string()),
            include_event_id: false,
        }
    }

    fn data_batch(events: Value) -> Value {
        json!({
            "messageType": "DATA_MESSAGE",
            "owner": "123456789012",
            "logGroup": "/aws/lambda/orders",
            "logStream": "2024/01/01/[$LATEST]abc",
            "subscriptionFilters": ["to-kinesis"],
            "logEvents": events
        })
    }

    #[test]
    fn test_one_event_per_log_line_with_timestamp_in_seconds() {
        let batch = data_batch(json!([
            { "id": "a", "timestamp": 1_700_000_000_123_i64, "message": "first" },
            { "id": "b", "timestamp": 1_700_000_001_500_i64, "message": "second" },
            { "id": "c", "timestamp": 1_700_000_002_000_i64, "message": "third" }
        ]));
        let decoded = decode_record(&gzip_base64(batch.to_string().as_bytes())).unwrap();

        let events = EventTransformer::new(tags()).transform(decoded).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].time, 1_700_000_000_123_f64 / 1000.0);
        assert_eq!(events[1].time, 1_700_000_001.5);
        assert_eq!(events[2].time, 1_700_000_002.0);
        assert_eq!(
            events.iter().map(|e| e.event["message"].clone()).collect::<Vec<_>>(),
            vec![json!("first"), json!("second"), json!("third")]
        );
        assert_eq!(events[0].source.as_deref(), Some("cloudwatch"));
        assert_eq!(events[0].sourcetype, "aws:cloudwatchlogs");
        assert_eq!(events[0].index.as_deref(), Some("main"));
        assert_eq!(
            serde_json::to_value(&events[0].event).unwrap(),
            json!({
                "message": "first",
                "owner": "123456789012",
                "logGroup": "/aws/lambda/orders",
                "logStream": "2024/01/01/[$LATEST]abc"
            })
        );
    }

    #[test]
    fn test_control_message_yields_nothing() {
        let control = json!({
            "messageType": "CONTROL_MESSAGE",
            "owner": "CloudwatchLogs",
            "logGroup": "",
            "logStream": "",
            "subscriptionFilters": [],
            "logEvents": [
                { "id": "", "timestamp": 1_700_000_000_000_i64,
                  "message": "CWL CONTROL MESSAGE: Checking health of destination Kinesis stream." }
            ]
        });
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(control))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_unknown_message_type_yields_nothing() {
        let mut batch = data_batch(json!([{ "timestamp": 1, "message": "x" }]));
        batch["messageType"] = json!("SOMETHING_ELSE");
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(batch))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_missing_message_type_is_treated_as_data() {
        let mut batch = data_batch(json!([{ "timestamp": 1000, "message": "x" }]));
        batch.as_object_mut().unwrap().remove("messageType");
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(batch))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 1.0);
    }

    #[test]
    fn test_float_timestamps_are_accepted() {
        let mut batch = data_batch(json!([
            { "timestamp": 1_700_000_000_250.0, "message": "float" },
            { "timestamp": 1_700_000_001_000_i64, "message": "int" }
        ]));
        batch.as_object_mut().unwrap().remove("messageType");
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(batch))
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, 1_700_000_000.25);
        assert_eq!(events[1].time, 1_700_000_001.0);
    }

    #[test]
    fn test_missing_timestamp_uses_current_time() {
        let before = now_secs();
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(data_batch(json!([{ "message": "x" }]))))
            .unwrap();
        assert!(events[0].time >= before);
    }

    #[test]
    fn test_inline_json_is_merged_keeping_message() {
        let message = r#"  {"level":"error","requestId":"r-1"}  "#;
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(data_batch(
                json!([{ "timestamp": 1000, "message": message }]),
            )))
            .unwrap();

        let body = &events[0].event;
        assert_eq!(body["message"], json!(message));
        assert_eq!(body["level"], json!("error"));
        assert_eq!(body["requestId"], json!("r-1"));
        assert_eq!(body["logGroup"], json!("/aws/lambda/orders"));
        assert_eq!(
            body.keys().collect::<Vec<_>>(),
            vec!["message", "owner", "logGroup", "logStream", "level", "requestId"]
        );
    }

    #[test]
    fn test_inline_json_overlays_base_fields() {
        let mut body = Map::new();
        body.insert("message".to_string(), json!("raw"));
        body.insert("owner".to_string(), json!("123"));

        assert!(merge_inline_json(&mut body, r#"{"owner":"someone-else"}"#));
        assert_eq!(body["owner"], json!("someone-else"));
        assert_eq!(body["message"], json!("raw"));
    }

    #[test]
    fn test_json_like_message_that_fails_to_parse_is_left_alone() {
        let message = "{not really json}";
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(data_batch(
                json!([{ "timestamp": 1000, "message": message }]),
            )))
            .unwrap();

        assert_eq!(
            serde_json::to_value(&events[0].event).unwrap(),
            json!({
                "message": message,
                "owner": "123456789012",
                "logGroup": "/aws/lambda/orders",
                "logStream": "2024/01/01/[$LATEST]abc"
            })
        );
    }

    #[test]
    fn test_inline_json_array_is_not_merged() {
        let mut body = Map::new();
        assert!(!merge_inline_json(&mut body, r#"[{"a":1}]"#));
        assert!(!merge_inline_json(&mut body, "plain text"));
        assert!(body.is_empty());
    }

    #[test]
    fn test_empty_source_override_falls_back_to_log_group() {
        let transformer = EventTransformer::new(EventTags {
            source: None,
            ..tags()
        });
        let events = transformer
            .transform(DecodedPayload::Json(data_batch(
                json!([{ "timestamp": 1000, "message": "x" }]),
            )))
            .unwrap();
        assert_eq!(events[0].source.as_deref(), Some("/aws/lambda/orders"));
    }

    #[test]
    fn test_event_id_is_copied_when_enabled() {
        let transformer = EventTransformer::new(EventTags {
            include_event_id: true,
            ..tags()
        });
        let events = transformer
            .transform(DecodedPayload::Json(data_batch(json!([
                { "id": "3713836427", "timestamp": 1000, "message": "x" },
                { "timestamp": 2000, "message": "y" }
            ]))))
            .unwrap();
        assert_eq!(events[0].event["id"], json!("3713836427"));
        assert!(!events[1].event.contains_key("id"));
    }

    #[test]
    fn test_generic_json_is_forwarded_verbatim() {
        let object = json!({ "level": "warn", "detail": { "code": 7 } });
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(object.clone()))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sourcetype, GENERIC_JSON_SOURCETYPE);
        assert_eq!(serde_json::to_value(&events[0].event).unwrap(), object);
        assert!(events[0].time > 0.0);
    }

    #[test]
    fn test_non_object_json_is_wrapped() {
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Json(json!([1, 2, 3])))
            .unwrap();
        assert_eq!(events[0].sourcetype, GENERIC_JSON_SOURCETYPE);
        assert_eq!(events[0].event["message"], json!([1, 2, 3]));
    }

    #[test]
    fn test_plain_text_event() {
        let events = EventTransformer::new(tags())
            .transform(DecodedPayload::Text("disk almost full".to_string()))
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sourcetype, TEXT_SOURCETYPE);
        assert_eq!(
            serde_json::to_value(&events[0].event).unwrap(),
            json!({ "message": "disk almost full" })
        );
    }

    #[test]
    fn test_malformed_log_events_is_an_error() {
        let batch = data_batch(json!("not a list"));
        let result = EventTransformer::new(tags()).transform(DecodedPayload::Json(batch));
        assert!(matches!(result, Err(TransformError::MalformedLogBatch(_))));
    }
}
