// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::Arc;
use std::{future::Future, pin::Pin};
use tokio::sync::OnceCell;

use crate::error::TokenError;

pub type TokenResolverFn = Arc<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<String, TokenError>> + Send>> + Send + Sync,
>;

/// Source of the collector token.
///
/// A dynamic token is resolved on first use and cached for the life of the
/// process; a failed resolution is not cached, so the next call retries.
#[derive(Clone)]
pub enum HecTokenFactory {
    Static(String),
    Dynamic {
        resolver_fn: TokenResolverFn,
        token: Arc<OnceCell<String>>,
    },
}

impl HecTokenFactory {
    pub fn new_from_resolver(resolver_fn: TokenResolverFn) -> Self {
        Self::Dynamic {
            resolver_fn,
            token: Arc::new(OnceCell::new()),
        }
    }

    pub fn new_from_static_token(token: &str) -> Self {
        Self::Static(token.to_string())
    }

    pub async fn get_token(&self) -> Result<&str, TokenError> {
        match self {
            Self::Static(token) => Ok(token),
            Self::Dynamic { resolver_fn, token } => token
                .get_or_try_init(|| async {
                    let resolved = (resolver_fn)().await?;
                    if resolved.trim().is_empty() {
                        return Err(TokenError::Unavailable("resolved token is empty".into()));
                    }
                    Ok(resolved.trim().to_string())
                })
                .await
                .map(String::as_str),
        }
    }
}

impl Debug for HecTokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HecTokenFactory")
    }
}
