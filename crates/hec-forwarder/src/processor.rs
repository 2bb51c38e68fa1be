// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation batch processing.
//!
//! Every record is decoded and transformed on its own, so one bad record
//! never affects the others. The surviving events are cut into chunks in
//! record order and delivered one chunk at a time. A chunk that fails marks
//! every record that contributed to it as failed, and the source retries
//! those records.

use tracing::{debug, error, info};

use crate::decoder::decode_record;
use crate::deliverer::Deliver;
use crate::error::RecordError;
use crate::event::OutputEvent;
use crate::record::{FailureReport, KinesisEventRecord, KinesisEventResponse};
use crate::transformer::EventTransformer;

/// Outcome of one invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub records: usize,
    pub events_generated: usize,
    pub events_delivered: usize,
    pub chunks_sent: usize,
    pub failures: FailureReport,
}

impl ProcessingSummary {
    #[must_use]
    pub fn into_response(self) -> KinesisEventResponse {
        self.failures.into()
    }
}

pub struct RecordProcessor<D: Deliver> {
    transformer: EventTransformer,
    deliverer: D,
    max_events_per_request: usize,
}

impl<D: Deliver> RecordProcessor<D> {
    #[must_use]
    pub fn new(transformer: EventTransformer, deliverer: D, max_events_per_request: usize) -> Self {
        Self {
            transformer,
            deliverer,
            max_events_per_request: max_events_per_request.max(1),
        }
    }

    pub fn deliverer(&self) -> &D {
        &self.deliverer
    }

    /// Decodes and transforms a single record.
    pub fn prepare_record(
        &self,
        record: &KinesisEventRecord,
    ) -> Result<Vec<OutputEvent>, RecordError> {
        let decoded = decode_record(&record.kinesis.data)?;
        Ok(self.transformer.transform(decoded)?)
    }

    pub async fn process(&self, records: &[KinesisEventRecord]) -> ProcessingSummary {
        let mut summary = ProcessingSummary {
            records: records.len(),
            ..ProcessingSummary::default()
        };

        // `origins[i]` is the index of the record that produced `events[i]`.
        let mut events: Vec<OutputEvent> = Vec::new();
        let mut origins: Vec<usize> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match self.prepare_record(record) {
                Ok(produced) => {
                    debug!(
                        "HEC | Record {} produced {} events",
                        record.sequence_number(),
                        produced.len()
                    );
                    origins.extend(std::iter::repeat(index).take(produced.len()));
                    events.extend(produced);
                }
                Err(e) => {
                    error!(
                        "HEC | Failed to process record {}: {}",
                        record.sequence_number(),
                        e
                    );
                    summary.failures.mark_failed(record.sequence_number());
                }
            }
        }
        summary.events_generated = events.len();

        for (chunk, chunk_origins) in events
            .chunks(self.max_events_per_request)
            .zip(origins.chunks(self.max_events_per_request))
        {
            summary.chunks_sent += 1;
            match self.deliverer.deliver(chunk).await {
                Ok(()) => summary.events_delivered += chunk.len(),
                Err(e) => {
                    // Origins are grouped by record, so one mark per run.
                    let mut marked = 0;
                    let mut previous = None;
                    for &origin in chunk_origins {
                        if previous == Some(origin) {
                            continue;
                        }
                        previous = Some(origin);
                        if summary
                            .failures
                            .mark_failed(records[origin].sequence_number())
                        {
                            marked += 1;
                        }
                    }
                    let outcome = if e.is_client_error() {
                        "was rejected"
                    } else {
                        "failed"
                    };
                    error!(
                        "HEC | Chunk of {} events {}, marked {} record(s) for retry: {}",
                        chunk.len(),
                        outcome,
                        marked,
                        e
                    );
                }
            }
        }

        info!(
            "HEC | Processed {} records: {} events generated, {} delivered in {} chunk(s), {} failed record(s)",
            summary.records,
            summary.events_generated,
            summary.events_delivered,
            summary.chunks_sent,
            summary.failures.len()
        );
        summary
    }
}
