// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised while reading or validating the forwarder configuration.
///
/// These are fatal: the process refuses to serve invocations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Unable to load CA bundle {path}: {reason}")]
    CaBundle { path: String, reason: String },

    #[error("Unable to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised while turning a raw record payload into a decoded value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload looks gzip-compressed but failed to decompress: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("decompressed payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("payload is neither JSON nor UTF-8 text: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised while reshaping a decoded value into output events.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("logEvents batch has an unexpected shape: {0}")]
    MalformedLogBatch(#[source] serde_json::Error),
}

/// Per-record failure, caught at the processor boundary.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Errors raised while resolving the collector token.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("collector token unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while delivering one chunk of events.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("failed to serialize events: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("collector rejected request with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("collector delivery failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl DeliveryError {
    /// Whether the failure came from the caller side (4xx) rather than the
    /// collector or the network.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if (400..500).contains(status))
    }
}
