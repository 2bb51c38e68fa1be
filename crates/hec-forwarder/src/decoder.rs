// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Record payload decoding.
//!
//! ```text
//!   base64 text
//!       │
//!       v
//!   ┌─────────────┐
//!   │   base64    │
//!   └──────┬──────┘
//!          │ gzip magic?
//!          v
//!   ┌─────────────┐
//!   │    gunzip   │ (skipped for uncompressed records)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │ JSON / text │
//!   └─────────────┘
//! ```
//!
//! CloudWatch Logs subscriptions always deliver gzip-compressed JSON, so a
//! gzip payload that does not parse as JSON is corrupt. Producers writing
//! straight to the stream may send uncompressed JSON or plain text.
//! Whatever shape the JSON has is kept; recognizing a `logEvents` batch is
//! left to the transformer.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::MultiGzDecoder;
use serde_json::Value;
use std::io::Read;

use crate::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decoded content of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Json(Value),
    Text(String),
}

/// Decodes one base64 record payload.
///
/// Malformed base64, a corrupt gzip stream, inflated bytes that are not
/// JSON, or uncompressed bytes that are neither JSON nor UTF-8 are errors.
pub fn decode_record(payload: &str) -> Result<DecodedPayload, DecodeError> {
    let raw = STANDARD.decode(payload.trim())?;
    if is_gzip(&raw) {
        let inflated = gunzip(&raw).map_err(DecodeError::Gzip)?;
        let value = serde_json::from_slice::<Value>(&inflated).map_err(DecodeError::Json)?;
        return Ok(DecodedPayload::Json(value));
    }
    classify(raw)
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(bytes);
    // Subscription payloads inflate roughly tenfold.
    let mut out = Vec::with_capacity(bytes.len() * 10);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn classify(bytes: Vec<u8>) -> Result<DecodedPayload, DecodeError> {
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(DecodedPayload::Json(value)),
        Err(_) => Ok(DecodedPayload::Text(String::from_utf8(bytes)?)),
    }
}
