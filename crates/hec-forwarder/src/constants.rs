// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Collector protocol constants and forwarding defaults.
//!
//! The HTTP Event Collector accepts several events per request as
//! newline-delimited JSON, but rejects oversized requests with a 413. The
//! per-request event count is therefore bounded, and the bound is
//! configurable because the safe value depends on average event size.

use std::time::Duration;

/// Path appended to the collector base URL for JSON event ingestion.
pub const HEC_EVENT_PATH: &str = "/services/collector/event";

/// Header carrying a fresh request channel per delivery attempt.
pub const REQUEST_CHANNEL_HEADER: &str = "X-Splunk-Request-Channel";

/// Scheme used in the `Authorization` header value.
pub const AUTHORIZATION_SCHEME: &str = "Splunk";

/// Maximum number of events per delivery request.
///
/// Roughly 1-2k events per POST stays under common collector payload limits.
pub const DEFAULT_MAX_EVENTS_PER_REQUEST: usize = 2000;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Total delivery attempts per chunk, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Upper bound for the summed backoff sleeps of one chunk.
///
/// Keeps a fully retried delivery well inside a typical invocation timeout.
pub const MAX_TOTAL_BACKOFF: Duration = Duration::from_secs(30);

/// Number of response body bytes kept on delivery errors.
pub const MAX_RESPONSE_SNIPPET_BYTES: usize = 512;

pub const DEFAULT_INDEX: &str = "main";
pub const DEFAULT_SOURCE: &str = "cloudwatch";
pub const DEFAULT_SOURCETYPE: &str = "aws:cloudwatchlogs";

/// Sourcetype for decoded records that are JSON but not a CloudWatch batch.
pub const GENERIC_JSON_SOURCETYPE: &str = "_json";

/// Sourcetype for decoded records that are plain text.
pub const TEXT_SOURCETYPE: &str = "text";

/// CloudWatch Logs subscription message types.
pub const DATA_MESSAGE: &str = "DATA_MESSAGE";
pub const CONTROL_MESSAGE: &str = "CONTROL_MESSAGE";
