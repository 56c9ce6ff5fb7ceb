//! # Fire Gateway
//!
//! Subscribes to environmental telemetry published by sensor nodes over MQTT,
//! calibrates the raw gas reading, classifies each sample as fire/no-fire with
//! a pre-trained random forest, derives a risk status, and logs every
//! observation to PostgreSQL.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each exposes a
//! narrow surface and this gateway re-exports what the binary and the tests
//! need.

pub mod calibration;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod ingest;
pub mod models;
pub mod report;
pub mod risk;
pub mod routes;
pub mod schema;
pub mod sink;

pub use calibration::{calibrate, CalibrationRange};
pub use channel::{ChannelEvent, InboundMessage, MessageSource, MqttSource};
pub use classifier::{ArtifactError, Classifier, RandomForest};
pub use config::Config;
pub use ingest::{IngestError, IngestState, IngestStats, Ingestor, Processed, StatsSnapshot};
pub use models::{
    CalibratedReading, ClassificationOutcome, Features, RiskStatus, SensorLogRecord, TelemetryMessage,
};
pub use risk::RiskPolicy;
pub use sink::{PgSink, RecordSink, SinkError};
