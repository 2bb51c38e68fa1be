// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::{debug, error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use hec_forwarder::{
    config::{ForwarderConfig, TokenSource},
    deliverer::HecDeliverer,
    error::TokenError,
    http::build_client,
    logger::{env_filter_directive, Formatter},
    processor::RecordProcessor,
    record::{KinesisEvent, KinesisEventResponse},
    token::{HecTokenFactory, TokenResolverFn},
    transformer::EventTransformer,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let log_level = env::var("LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = EnvFilter::try_new(env_filter_directive(&log_level))
        .unwrap_or_else(|_| EnvFilter::new(env_filter_directive("info")));

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .event_format(Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Logging subsystem enabled");

    let config = match ForwarderConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on forwarder startup: {e}");
            return Err(e.into());
        }
    };
    debug!("Loaded configuration: {config:?}");

    let token_factory = match &config.token_source {
        TokenSource::Static(token) => HecTokenFactory::new_from_static_token(token),
        TokenSource::SecretArn(arn) => {
            HecTokenFactory::new_from_resolver(secrets_manager_resolver(arn.clone()))
        }
    };
    // Resolve now so a missing or unreadable token fails the cold start
    // instead of every batch.
    if let Err(e) = token_factory.get_token().await {
        error!("Unable to resolve collector token: {e}");
        return Err(e.into());
    }

    let client = match build_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Error building HTTP client: {e}");
            return Err(e.into());
        }
    };

    let deliverer = HecDeliverer::new(
        client,
        config.hec_endpoint(),
        Arc::new(token_factory),
        config.retry,
    );
    info!(
        "Forwarding to {} in chunks of up to {} events",
        deliverer.endpoint(),
        config.max_events_per_request
    );

    let processor = Arc::new(RecordProcessor::new(
        EventTransformer::new(config.event_tags()),
        deliverer,
        config.max_events_per_request,
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<KinesisEvent>| {
        let processor = Arc::clone(&processor);
        async move { handle(&processor, event).await }
    }))
    .await
}

async fn handle(
    processor: &RecordProcessor<HecDeliverer>,
    event: LambdaEvent<KinesisEvent>,
) -> Result<KinesisEventResponse, Error> {
    let span = info_span!("invocation", request_id = %event.context.request_id);
    let summary = processor
        .process(&event.payload.records)
        .instrument(span)
        .await;
    Ok(summary.into_response())
}

/// Reads the token from a Secrets Manager secret's `SecretString`.
fn secrets_manager_resolver(arn: String) -> TokenResolverFn {
    Arc::new(move || {
        let arn = arn.clone();
        Box::pin(async move {
            let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
            let client = aws_sdk_secretsmanager::Client::new(&sdk_config);
            let output = client
                .get_secret_value()
                .secret_id(&arn)
                .send()
                .await
                .map_err(|e| {
                    TokenError::Unavailable(format!(
                        "unable to read secret {arn}: {}",
                        DisplayErrorContext(&e)
                    ))
                })?;
            output
                .secret_string()
                .map(str::to_string)
                .ok_or_else(|| TokenError::Unavailable(format!("secret {arn} has no SecretString")))
        })
    })
}
