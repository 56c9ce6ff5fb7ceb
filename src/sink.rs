//! Persistence of processed observations.
//!
//! Every append is its own auto-committed write on a fresh connection. There
//! is no pooling, batching, or retry queue: a failed write is reported to the
//! caller and the record is dropped.

use std::future::Future;
use std::time::Duration;

use sqlx::{Connection, PgConnection};
use thiserror::Error;

use crate::models::SensorLogRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// A [`RecordSink`] implementation refused the record for a reason of
    /// its own, outside the database and timeout categories.
    #[error("{0}")]
    Rejected(String),
}

/// Destination for `SensorLogRecord`s.
///
/// Implementations must be safe to call concurrently, each call using its own
/// connection or transaction.
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &SensorLogRecord) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// PostgreSQL sink writing to the `sensor_logs` table.
#[derive(Clone)]
pub struct PgSink {
    db_url: String,
}

impl PgSink {
    pub fn new<T: Into<String>>(db_url: T) -> Self {
        Self { db_url: db_url.into() }
    }
}

impl std::fmt::Debug for PgSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSink")
            .field("db_url", &crate::config::mask_db_url(&self.db_url))
            .finish()
    }
}

impl RecordSink for PgSink {
    // ---
    async fn append(&self, record: &SensorLogRecord) -> Result<(), SinkError> {
        // ---
        let mut conn = PgConnection::connect(&self.db_url).await?;

        let result = insert_record(&mut conn, record).await;

        // Close even when the insert failed; a close error only matters if
        // the insert itself succeeded.
        let closed = conn.close().await;
        result?;
        closed?;

        tracing::debug!(node_id = %record.node_id, status = %record.status, "record saved");
        Ok(())
    }
}

async fn insert_record(conn: &mut PgConnection, record: &SensorLogRecord) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO sensor_logs (
            node_id, temp_val, humidity_val,
            smoke_level, fire_risk, alert_status
        ) VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&record.node_id)
    .bind(record.temperature)
    .bind(record.humidity)
    .bind(record.gas_ppm)
    .bind(record.fire_risk_percent)
    .bind(record.status.as_str())
    .execute(conn)
    .await?;

    Ok(())
}
