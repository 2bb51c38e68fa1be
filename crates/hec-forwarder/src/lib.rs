// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forwards CloudWatch Logs delivered through Kinesis to an HTTP Event
//! Collector.
//!
//! One invocation runs the whole pipeline over its batch of records:
//!
//! ```text
//!   records ──> decoder ──> transformer ──> chunks ──> deliverer
//!                  │             │                        │
//!                  └─────────────┴──── failure report <───┘
//! ```
//!
//! Records that cannot be decoded, transformed or delivered are reported
//! back by sequence number so only they are redelivered.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod decoder;
pub mod deliverer;
pub mod error;
pub mod event;
pub mod http;
pub mod logger;
pub mod processor;
pub mod record;
pub mod retry;
pub mod token;
pub mod transformer;
