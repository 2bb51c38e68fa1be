// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for collector delivery.

use core::time::Duration;
use std::fs;
use tracing::debug;

use crate::config::ForwarderConfig;
use crate::error::ConfigError;

/// Builds the client shared by every delivery in the process.
///
/// The client is built once and reused across invocations so pooled
/// connections to the collector survive warm starts.
pub fn build_client(config: &ForwarderConfig) -> Result<reqwest::Client, ConfigError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if !config.verify_tls {
        debug!("HEC | TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(path) = &config.ca_bundle_path {
        let pem = fs::read(path).map_err(|e| ConfigError::CaBundle {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let certificates =
            reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| ConfigError::CaBundle {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if certificates.is_empty() {
            return Err(ConfigError::CaBundle {
                path: path.display().to_string(),
                reason: "no certificates found".to_string(),
            });
        }
        debug!(
            "HEC | Trusting {} additional root certificate(s) from {}",
            certificates.len(),
            path.display()
        );
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
    }

    if let Some(proxy) = &config.https_proxy {
        debug!("HEC | Using HTTPS proxy {proxy}");
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }

    Ok(builder.build()?)
}
