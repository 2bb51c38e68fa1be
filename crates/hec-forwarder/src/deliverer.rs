// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Chunk delivery to the HTTP Event Collector.
//!
//! ```text
//!   events chunk
//!       │
//!       v
//!   ┌─────────────┐
//!   │   NDJSON    │ (encoded once)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │  HTTP POST  │ <────────┐
//!   └──────┬──────┘          │
//!          │                 │ backoff
//!          v                 │
//!   ┌─────────────┐          │
//!   │   Retry?    │ ─────────┘ (5xx / network errors)
//!   └─────────────┘
//! ```
//!
//! A 2xx response is success. A 4xx response means the collector will never
//! accept this body, so it fails the chunk without retrying. Anything else is
//! retried until the attempt budget runs out.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::constants::{AUTHORIZATION_SCHEME, MAX_RESPONSE_SNIPPET_BYTES, REQUEST_CHANNEL_HEADER};
use crate::error::DeliveryError;
use crate::event::{encode_events, OutputEvent};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::token::HecTokenFactory;

/// Sends one chunk of events downstream.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, events: &[OutputEvent]) -> Result<(), DeliveryError>;
}

/// Delivers chunks to a single collector endpoint.
#[derive(Clone)]
pub struct HecDeliverer {
    client: reqwest::Client,
    /// Full event endpoint URL.
    endpoint: String,
    token_factory: Arc<HecTokenFactory>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HecDeliverer {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        token_factory: Arc<HecTokenFactory>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            endpoint,
            token_factory,
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the backoff sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, token: &str, body: Vec<u8>) -> Result<Attempt, reqwest::Error> {
        let channel = Uuid::new_v4().to_string();
        let mut resp = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("{AUTHORIZATION_SCHEME} {token}"))
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_CHANNEL_HEADER, channel)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Attempt::Accepted);
        }
        // Only read the body when it is going to be reported, and only its head.
        let mut head = Vec::new();
        let body = loop {
            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    let room = MAX_RESPONSE_SNIPPET_BYTES + 3 - head.len();
                    head.extend_from_slice(&bytes[..bytes.len().min(room)]);
                    if head.len() > MAX_RESPONSE_SNIPPET_BYTES {
                        break snippet(&head);
                    }
                }
                Ok(None) => break snippet(&head),
                Err(e) => {
                    debug!("HEC | Failed to read response body for {status}: {e}");
                    if head.is_empty() {
                        break format!("<unreadable response body: {e}>");
                    }
                    break snippet(&head);
                }
            }
        };
        Ok(Attempt::Refused { status, body })
    }
}

impl std::fmt::Debug for HecDeliverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HecDeliverer")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

enum Attempt {
    Accepted,
    Refused { status: StatusCode, body: String },
}

#[async_trait]
impl Deliver for HecDeliverer {
    async fn deliver(&self, events: &[OutputEvent]) -> Result<(), DeliveryError> {
        if events.is_empty() {
            return Ok(());
        }

        let token = self.token_factory.get_token().await.map_err(|e| {
            error!("HEC | Skipping delivery: Failed to resolve collector token: {e}");
            e
        })?;
        let body = encode_events(events)?;
        let max_attempts = self.retry.max_attempts.max(1);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let time = Instant::now();
            let result = self.send_once(token, body.clone()).await;
            let elapsed = time.elapsed();

            let last = match result {
                Ok(Attempt::Accepted) => {
                    debug!(
                        "HEC | Delivered {} events in {} ms after {} attempt(s)",
                        events.len(),
                        elapsed.as_millis(),
                        attempts
                    );
                    return Ok(());
                }
                Ok(Attempt::Refused { status, body }) if status.is_client_error() => {
                    error!(
                        "HEC | Collector rejected {} events with {}: {}",
                        events.len(),
                        status,
                        body
                    );
                    return Err(DeliveryError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }
                Ok(Attempt::Refused { status, body }) => format!("{status}: {body}"),
                Err(e) => e.to_string(),
            };

            if attempts >= max_attempts {
                error!(
                    "HEC | Failed to deliver {} events after {} attempts: {}",
                    events.len(),
                    attempts,
                    last
                );
                return Err(DeliveryError::RetriesExhausted { attempts, last });
            }

            let delay = self.retry.next_delay(attempts);
            warn!(
                "HEC | Attempt {}/{} failed after {} ms: {}. Retrying in {} ms",
                attempts,
                max_attempts,
                elapsed.as_millis(),
                last,
                delay.as_millis()
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

/// Truncates a response body for logging, keeping UTF-8 boundaries intact.
fn snippet(head: &[u8]) -> String {
    let body = String::from_utf8_lossy(head);
    if body.len() <= MAX_RESPONSE_SNIPPET_BYTES {
        return body.into_owned();
    }
    let mut end = MAX_RESPONSE_SNIPPET_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
