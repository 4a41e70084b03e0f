//! PostgreSQL connection implementation.
//!
//! This module implements the `WarehouseConnection` and `Transactional` traits
//! using SQLx's PgPool. Redshift speaks the same wire protocol, so the same
//! driver serves both; only Redshift understands `COPY ... FROM 's3://'` and
//! `UNLOAD`, which is reflected in [`PostgresConnection::supports`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres};

use super::types::PgValueConverter;
use crate::error::{Result, TransferError};
use crate::services::warehouse::traits::{
    BoxedConnection, Capability, ConnectionConfig, ConnectionParams, Row, Transaction,
    Transactional, Value, WarehouseConnection, WarehouseType,
};

/// PostgreSQL / Redshift warehouse connection.
///
/// Open transactions are held by the connection and addressed by the id in
/// the [`Transaction`] handle.
pub struct PostgresConnection {
    config: ConnectionConfig,
    pool: RwLock<Option<PgPool>>,
    transactions: Mutex<HashMap<u64, sqlx::Transaction<'static, Postgres>>>,
    next_transaction_id: AtomicU64,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("config", &self.config)
            .field("pool", &"<PgPool>")
            .finish()
    }
}

impl PostgresConnection {
    /// Create a new connection from configuration.
    ///
    /// This does not connect immediately - call `connect()` to establish the connection.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            transactions: Mutex::new(HashMap::new()),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    /// Create a boxed connection (for factory use).
    pub fn boxed(config: ConnectionConfig) -> BoxedConnection {
        Box::new(Self::new(config))
    }

    /// Build PgConnectOptions from the configuration.
    ///
    /// `sslrootcert` and `application_name` map to their driver settings;
    /// any other extra option is sent as a `-c key=value` runtime parameter.
    fn build_connect_options(&self) -> Result<PgConnectOptions> {
        match &self.config.params {
            ConnectionParams::Server {
                hostname,
                port,
                username,
                password,
                database,
                ssl_mode,
                extra_options,
            } => {
                let mut options = PgConnectOptions::new()
                    .host(hostname)
                    .port(*port)
                    .username(username)
                    .password(password)
                    .database(database)
                    .ssl_mode(PgValueConverter::map_ssl_mode(ssl_mode));

                let mut runtime: Vec<(&String, &String)> = Vec::new();
                for (key, value) in extra_options {
                    options = match key.as_str() {
                        "sslrootcert" => options.ssl_root_cert(value),
                        "application_name" => options.application_name(value),
                        _ => {
                            runtime.push((key, value));
                            options
                        }
                    };
                }
                if !runtime.is_empty() {
                    runtime.sort();
                    options = options.options(runtime);
                }
                Ok(options)
            }
            ConnectionParams::InMemory => Err(TransferError::Warehouse(format!(
                "{} requires server connection parameters",
                self.config.warehouse_type.display_name()
            ))),
        }
    }

    /// Get the connection pool, or an error if not connected.
    async fn get_pool(&self) -> Result<PgPool> {
        let guard = self.pool.read().await;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| TransferError::Warehouse("Warehouse not connected".to_string()))
    }

    /// Take an open transaction out of the map so no lock is held while it runs.
    async fn take_open(&self, tx: &Transaction) -> Result<sqlx::Transaction<'static, Postgres>> {
        self.transactions
            .lock()
            .await
            .remove(&tx.id)
            .ok_or_else(|| Self::inactive(tx))
    }

    async fn put_back(&self, tx: &Transaction, open: sqlx::Transaction<'static, Postgres>) {
        self.transactions.lock().await.insert(tx.id, open);
    }

    fn inactive(tx: &Transaction) -> TransferError {
        TransferError::Warehouse(format!("Transaction {} is not active", tx.id))
    }
}

#[async_trait]
impl WarehouseConnection for PostgresConnection {
    fn warehouse_type(&self) -> WarehouseType {
        self.config.warehouse_type
    }

    fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&mut self) -> Result<()> {
        let options = self.build_connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        tracing::info!(warehouse = %self.display_name(), "connected");
        let mut guard = self.pool.write().await;
        *guard = Some(pool);

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        // Dropping a sqlx transaction rolls it back
        self.transactions.lock().await.clear();

        let mut guard = self.pool.write().await;
        match guard.take() {
            Some(pool) => {
                pool.close().await;
                Ok(())
            }
            None => Err(TransferError::Warehouse(
                "No active warehouse connection to disconnect".to_string(),
            )),
        }
    }

    async fn is_connected(&self) -> bool {
        let guard = self.pool.read().await;
        if let Some(pool) = guard.as_ref() {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::BulkCopy | Capability::BulkUnload => {
                self.config.warehouse_type == WarehouseType::Redshift
            }
            _ => true,
        }
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let pool = self.get_pool().await?;
        tracing::debug!(%sql, "execute");

        let result = sqlx::query(sql)
            .execute(&pool)
            .await
            .map_err(PgValueConverter::map_error)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let pool = self.get_pool().await?;
        tracing::debug!(%sql, params = params.len(), "query");

        let query = params
            .iter()
            .fold(sqlx::query(sql), PgValueConverter::bind);
        let pg_rows = query
            .fetch_all(&pool)
            .await
            .map_err(PgValueConverter::map_error)?;

        Ok(PgValueConverter::convert_rows(&pg_rows))
    }
}

#[async_trait]
impl Transactional for PostgresConnection {
    async fn begin_transaction(&self) -> Result<Transaction> {
        let pool = self.get_pool().await?;
        let tx = pool.begin().await?;

        let id = self.next_transaction_id.fetch_add(1, Ordering::Relaxed);
        self.transactions.lock().await.insert(id, tx);
        tracing::debug!(transaction = id, "begin");

        Ok(Transaction::new(id))
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        let open = self
            .transactions
            .lock()
            .await
            .remove(&tx.id)
            .ok_or_else(|| Self::inactive(&tx))?;
        tracing::debug!(transaction = tx.id, "commit");
        open.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: Transaction) -> Result<()> {
        let open = self
            .transactions
            .lock()
            .await
            .remove(&tx.id)
            .ok_or_else(|| Self::inactive(&tx))?;
        tracing::debug!(transaction = tx.id, "rollback");
        open.rollback().await?;
        Ok(())
    }

    async fn execute_in_transaction(&self, tx: &Transaction, sql: &str) -> Result<u64> {
        let mut open = self.take_open(tx).await?;
        tracing::debug!(transaction = tx.id, %sql, "execute");

        let result = sqlx::query(sql).execute(&mut *open).await;
        self.put_back(tx, open).await;
        Ok(result.map_err(PgValueConverter::map_error)?.rows_affected())
    }

    async fn query_in_transaction(
        &self,
        tx: &Transaction,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>> {
        let mut open = self.take_open(tx).await?;
        tracing::debug!(transaction = tx.id, %sql, "query");

        let query = params
            .iter()
            .fold(sqlx::query(sql), PgValueConverter::bind);
        let result = query.fetch_all(&mut *open).await;
        self.put_back(tx, open).await;

        let pg_rows = result.map_err(PgValueConverter::map_error)?;
        Ok(PgValueConverter::convert_rows(&pg_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(warehouse_type: WarehouseType) -> ConnectionConfig {
        ConnectionConfig::new(
            "test".to_string(),
            warehouse_type,
            ConnectionParams::server(
                "localhost".to_string(),
                warehouse_type.default_port().unwrap_or(5432),
                "loader".to_string(),
                "password".to_string(),
                "analytics".to_string(),
            ),
        )
    }

    #[test]
    fn test_postgres_connection_new() {
        let conn = PostgresConnection::new(create_test_config(WarehouseType::Redshift));

        assert_eq!(conn.warehouse_type(), WarehouseType::Redshift);
        assert_eq!(conn.connection_config().name, "test");
        assert_eq!(conn.display_name(), "loader@localhost:5439/analytics");
    }

    #[test]
    fn test_extra_options_reach_connect_options() {
        let config = ConnectionConfig::from_url(
            "redshift://loader:pw@cluster.example.com/analytics?application_name=loader&search_path=staging",
        )
        .unwrap();
        let options = PostgresConnection::new(config).build_connect_options().unwrap();

        assert_eq!(options.get_application_name(), Some("loader"));
        assert_eq!(options.get_options(), Some("-c search_path=staging"));
    }

    #[test]
    fn test_bulk_capabilities_follow_warehouse_type() {
        let redshift = PostgresConnection::new(create_test_config(WarehouseType::Redshift));
        assert!(redshift.supports(Capability::BulkCopy));
        assert!(redshift.supports(Capability::BulkUnload));

        let postgres = PostgresConnection::new(create_test_config(WarehouseType::PostgreSQL));
        assert!(!postgres.supports(Capability::BulkCopy));
        assert!(!postgres.supports(Capability::BulkUnload));
        assert!(postgres.supports(Capability::Update));
    }

    #[test]
    fn test_build_connect_options() {
        let conn = PostgresConnection::new(create_test_config(WarehouseType::PostgreSQL));
        assert!(conn.build_connect_options().is_ok());
    }

    #[test]
    fn test_in_memory_params_rejected() {
        let config = ConnectionConfig::new(
            "test".to_string(),
            WarehouseType::Redshift,
            ConnectionParams::InMemory,
        );
        let conn = PostgresConnection::new(config);
        assert!(conn.build_connect_options().is_err());
    }

    #[test]
    fn test_not_connected() {
        let conn = PostgresConnection::new(create_test_config(WarehouseType::PostgreSQL));
        smol::block_on(async {
            assert!(!conn.is_connected().await);
            assert!(conn.execute("SELECT 1").await.is_err());
            assert!(conn.begin_transaction().await.is_err());
        });
    }

    #[test]
    fn test_unknown_transaction_rejected() {
        let conn = PostgresConnection::new(create_test_config(WarehouseType::PostgreSQL));
        smol::block_on(async {
            let result = conn.commit(Transaction::new(42)).await;
            assert!(matches!(result, Err(TransferError::Warehouse(_))));

            let result = conn
                .execute_in_transaction(&Transaction::new(42), "SELECT 1")
                .await;
            assert!(matches!(result, Err(TransferError::Warehouse(_))));
            assert!(conn.transactions.lock().await.is_empty());
        });
    }
}
