//! Ingestion loop: decode, calibrate, classify, report, persist.
//!
//! Messages are processed strictly one at a time and independently of each
//! other. Each stage that can fail has its own isolation boundary:
//!
//! - a payload that cannot be decoded is logged and dropped;
//! - a failed or stalled write is logged after the report is already out.
//!
//! Neither ever stops the loop.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::calibration::CalibrationRange;
use crate::channel::{ChannelEvent, InboundMessage, MessageSource};
use crate::classifier::Classifier;
use crate::models::{RiskStatus, SensorLogRecord, TelemetryMessage};
use crate::report::OperatorReport;
use crate::risk::RiskPolicy;
use crate::sink::{RecordSink, SinkError};

/// Default bound on a single sink write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes of a rejected payload echoed into the log.
const PAYLOAD_LOG_LIMIT: usize = 256;

// ---

/// Per-message failure that drops the message before classification.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("decode payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Connection and processing state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IngestState {
    Disconnected = 0,
    Idle = 1,
    Processing = 2,
    Reconnecting = 3,
}

impl IngestState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => IngestState::Idle,
            2 => IngestState::Processing,
            3 => IngestState::Reconnecting,
            _ => IngestState::Disconnected,
        }
    }
}

/// Shared counters, read by the health endpoint.
#[derive(Debug)]
pub struct IngestStats {
    state: AtomicU8,
    messages_received: AtomicU64,
    processed: AtomicU64,
    decode_failures: AtomicU64,
    persisted: AtomicU64,
    persist_failures: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub ingest_state: IngestState,
    pub messages_received: u64,
    pub processed: u64,
    pub decode_failures: u64,
    pub persisted: u64,
    pub persist_failures: u64,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(IngestState::Disconnected as u8),
            messages_received: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            persist_failures: AtomicU64::new(0),
        }
    }
}

impl IngestStats {
    // ---
    pub fn state(&self) -> IngestState {
        IngestState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: IngestState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        // ---
        StatsSnapshot {
            ingest_state: self.state(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Result of running one message through the pipeline.
#[derive(Debug)]
pub struct Processed {
    pub record: SensorLogRecord,
    pub status: RiskStatus,
    /// Outcome of the sink write; the rest of the pipeline already ran.
    pub persistence: Result<(), SinkError>,
}

/// The orchestrator. Holds no per-message state between calls.
pub struct Ingestor<C, S> {
    gas_range: CalibrationRange,
    classifier: Arc<C>,
    policy: RiskPolicy,
    sink: S,
    write_timeout: Duration,
    stats: Arc<IngestStats>,
}

impl<C, S> Ingestor<C, S>
where
    C: Classifier,
    S: RecordSink,
{
    // ---
    pub fn new(gas_range: CalibrationRange, classifier: Arc<C>, policy: RiskPolicy, sink: S) -> Self {
        // ---
        Self {
            gas_range,
            classifier,
            policy,
            sink,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            stats: Arc::new(IngestStats::default()),
        }
    }

    /// Bound each sink write to `timeout`.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Consume events until the source closes.
    pub async fn run<M: MessageSource>(&self, source: &mut M) {
        // ---
        self.stats.set_state(IngestState::Disconnected);
        tracing::info!("ingestion loop started");

        while let Some(event) = source.next_event().await {
            match event {
                ChannelEvent::Connected => {
                    tracing::info!("channel connected, waiting for telemetry");
                    self.stats.set_state(IngestState::Idle);
                }
                ChannelEvent::Disconnected => {
                    if self.stats.state() != IngestState::Reconnecting {
                        tracing::warn!("channel disconnected, waiting for reconnect");
                    }
                    self.stats.set_state(IngestState::Reconnecting);
                }
                ChannelEvent::Message(message) => {
                    self.stats.set_state(IngestState::Processing);
                    self.handle_message(&message).await;
                    self.stats.set_state(IngestState::Idle);
                }
            }
        }

        self.stats.set_state(IngestState::Disconnected);
        tracing::info!("channel closed, ingestion loop stopped");
    }

    /// Handle one delivered message inside its own span. Failures are logged
    /// and counted, never returned.
    pub async fn handle_message(&self, message: &InboundMessage) -> Option<Processed> {
        // ---
        let span = tracing::info_span!(
            "message",
            message_id = %uuid::Uuid::new_v4(),
            topic = %message.topic
        );

        self.handle_payload(&message.payload).instrument(span).await.ok()
    }

    /// Run a raw payload through every pipeline stage.
    ///
    /// Returns `Err` only when the payload cannot be decoded. A persistence
    /// failure is reported inside [`Processed::persistence`].
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<Processed, IngestError> {
        // ---
        IngestStats::bump(&self.stats.messages_received);

        // Steps 1-2: decode and default
        let message = match TelemetryMessage::decode(payload, Utc::now()) {
            Ok(message) => message,
            Err(e) => {
                IngestStats::bump(&self.stats.decode_failures);
                tracing::error!(
                    category = "decode",
                    error = %e,
                    payload = %payload_preview(payload),
                    "discarding message"
                );
                return Err(e.into());
            }
        };

        // Steps 3-5: calibrate, classify, derive status
        let reading = message.calibrate(&self.gas_range);
        let features = reading.features();
        let outcome = self.classifier.classify(&features);
        let status = self.policy.classify(&outcome);
        tracing::debug!(?features, ?outcome, %status, "classified");

        // Step 6: operator report
        OperatorReport {
            message: &message,
            reading: &reading,
            outcome: &outcome,
            status,
        }
        .emit();

        // Step 7: persist
        let record = SensorLogRecord::new(&reading, &outcome, status);
        let persistence = self.persist(&record).await;
        IngestStats::bump(&self.stats.processed);

        Ok(Processed {
            record,
            status,
            persistence,
        })
    }

    async fn persist(&self, record: &SensorLogRecord) -> Result<(), SinkError> {
        // ---
        let result = match tokio::time::timeout(self.write_timeout, self.sink.append(record)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.write_timeout)),
        };

        match &result {
            Ok(()) => IngestStats::bump(&self.stats.persisted),
            Err(e) => {
                IngestStats::bump(&self.stats.persist_failures);
                tracing::error!(
                    category = "persistence",
                    error = %e,
                    node_id = %record.node_id,
                    "failed to save record"
                );
            }
        }
        result
    }
}

/// Lossy UTF-8 prefix of `payload`, marked with the full length when cut.
fn payload_preview(payload: &[u8]) -> String {
    // ---
    if payload.len() <= PAYLOAD_LOG_LIMIT {
        return String::from_utf8_lossy(payload).into_owned();
    }
    format!(
        "{}... ({} bytes)",
        String::from_utf8_lossy(&payload[..PAYLOAD_LOG_LIMIT]),
        payload.len()
    )
}
