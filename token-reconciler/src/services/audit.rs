//! Audit-store lookups: last known owner of a token serial.

use crate::models::TokenSerial;
use async_trait::async_trait;
use reconciler_core::error::AppError;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Most recent owner value recorded for the serial, raw as stored.
    /// `None` when no audit row carries a usable owner.
    async fn owner_of(&self, serial: &TokenSerial) -> Result<Option<String>, AppError>;
}

/// Read-only client for the privacyIDEA audit database.
#[derive(Clone)]
pub struct MySqlAuditStore {
    pool: MySqlPool,
}

impl MySqlAuditStore {
    /// The pool is lazy: no connection is made until the first lookup, so
    /// an unreachable database only fails the run once ownership
    /// resolution actually starts.
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        info!(max_connections = max_connections, "Preparing audit database pool");

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(database_url)
            .map_err(|e| {
                AppError::AuditStoreError(anyhow::anyhow!("Failed to configure pool: {}", e))
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl AuditStore for MySqlAuditStore {
    async fn owner_of(&self, serial: &TokenSerial) -> Result<Option<String>, AppError> {
        let owner: Option<String> = sqlx::query_scalar(
            "SELECT user FROM pidea_audit \
             WHERE serial = ? AND user IS NOT NULL AND user <> '' \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(serial.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::AuditStoreError(anyhow::anyhow!("owner lookup for {} failed: {}", serial, e))
        })?;

        Ok(owner)
    }
}
