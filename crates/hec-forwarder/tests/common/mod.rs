// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the delivery integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{write::GzEncoder, Compression};
use hec_forwarder::record::{KinesisEventRecord, RawRecord};
use hec_forwarder::retry::Sleeper;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sleeper that records the requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn gzip_base64(bytes: &[u8]) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}

pub fn record(sequence_number: &str, data: String) -> KinesisEventRecord {
    KinesisEventRecord {
        kinesis: RawRecord {
            data,
            sequence_number: sequence_number.to_string(),
            partition_key: "partition-0".to_string(),
        },
        event_id: Some(format!("shardId-000000000000:{sequence_number}")),
        event_source_arn: Some("arn:aws:kinesis:us-east-1:123456789012:stream/logs".to_string()),
    }
}

/// A gzip-compressed CloudWatch Logs subscription record with `events` lines.
pub fn cloudwatch_record(sequence_number: &str, events: usize) -> KinesisEventRecord {
    let log_events: Vec<_> = (0..events)
        .map(|i| {
            json!({
                "id": format!("{sequence_number}-{i}"),
                "timestamp": 1_700_000_000_000_i64 + i as i64,
                "message": format!("line {i}"),
            })
        })
        .collect();
    let batch = json!({
        "messageType": "DATA_MESSAGE",
        "owner": "123456789012",
        "logGroup": "/aws/lambda/orders",
        "logStream": "2024/01/01/[$LATEST]0123456789abcdef",
        "subscriptionFilters": ["orders-to-kinesis"],
        "logEvents": log_events,
    });
    record(sequence_number, gzip_base64(batch.to_string().as_bytes()))
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Collector stand-in that fails the first `fail_count` requests with 500.
pub struct FailingBackend {
    pub captured_requests: Arc<Mutex<Vec<CapturedRequest>>>,
    pub call_count: Arc<AtomicUsize>,
    pub addr: SocketAddr,
}

impl FailingBackend {
    pub async fn start(fail_count: usize) -> Self {
        let captured_requests = Arc::new(Mutex::new(Vec::new()));
        let call_count = Arc::new(AtomicUsize::new(0));

        let captured = Arc::clone(&captured_requests);
        let calls = Arc::clone(&call_count);
        let app = Router::new().route(
            "/services/collector/event",
            post(move |headers: HeaderMap, body: Bytes| {
                let captured = Arc::clone(&captured);
                let calls = Arc::clone(&calls);
                async move {
                    let count = calls.fetch_add(1, Ordering::SeqCst);
                    captured.lock().unwrap().push(CapturedRequest {
                        headers: headers
                            .iter()
                            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                            .collect(),
                        body: body.to_vec(),
                    });
                    if count < fail_count {
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            r#"{"text":"Internal Server Error","code":8}"#,
                        )
                    } else {
                        (StatusCode::OK, r#"{"text":"Success","code":0}"#)
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind failing backend");
        let addr = listener.local_addr().expect("Failed to get local addr");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failing backend server failed");
        });

        Self {
            captured_requests,
            call_count,
            addr,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/services/collector/event", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}
