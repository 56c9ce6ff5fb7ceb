//! Database schema management for `fire-gateway`.
//!
//! Ensures the `sensor_logs` table written by [`crate::sink::PgSink`] exists.
//! Applied once on startup from `main.rs` when `DB_INIT_SCHEMA` is enabled.

use anyhow::Result;
use sqlx::{Connection, PgConnection};

// ---

/// Create the `sensor_logs` table and its index (idempotent).
///
/// Safe to call on every startup; no-op if the objects already exist.
/// Errors are propagated if the connection or any SQL execution fails.
pub async fn create_schema(db_url: &str) -> Result<()> {
    // ---
    let mut conn = PgConnection::connect(db_url).await?;
    let mut tx = conn.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_logs (
            id            SERIAL PRIMARY KEY,
            node_id       TEXT             NOT NULL,
            temp_val      DOUBLE PRECISION NOT NULL,
            humidity_val  DOUBLE PRECISION NOT NULL,
            smoke_level   DOUBLE PRECISION NOT NULL,
            fire_risk     DOUBLE PRECISION NOT NULL,
            alert_status  TEXT             NOT NULL
                CHECK (alert_status IN ('SAFE', 'WARNING', 'CRITICAL')),
            created_at    TIMESTAMPTZ      NOT NULL DEFAULT now()
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_logs_node_id
            ON sensor_logs (node_id, created_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    conn.close().await?;
    Ok(())
}
