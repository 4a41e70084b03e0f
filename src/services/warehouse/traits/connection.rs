//! Core warehouse connection traits.
//!
//! This module defines the `WarehouseConnection` trait that all warehouse drivers must implement,
//! as well as the `Transactional` trait the table engine runs its statements through.

use async_trait::async_trait;

use super::row::{Row, Value};
use super::types::{ConnectionConfig, WarehouseType};
use crate::error::Result;

/// Operations a driver may or may not support.
///
/// The table engine checks the relevant capability before issuing any
/// statement, so an unsupported operation fails without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    /// `COPY ... FROM` an object store
    BulkCopy,
    /// `UNLOAD ... TO` an object store
    BulkUnload,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::BulkCopy => "COPY",
            Self::BulkUnload => "UNLOAD",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Core trait for all warehouse connections.
///
/// # Example
///
/// ```ignore
/// use warehouse_loader::services::warehouse::WarehouseConnection;
///
/// async fn example(conn: &dyn WarehouseConnection) -> Result<()> {
///     if conn.is_connected().await {
///         let rows = conn.query("SELECT 1", &[]).await?;
///         // Process rows...
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait WarehouseConnection: Send + Sync {
    /// Get the warehouse type for this connection
    fn warehouse_type(&self) -> WarehouseType;

    /// Get the connection configuration
    fn connection_config(&self) -> &ConnectionConfig;

    /// Establish a connection to the warehouse.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established, such as:
    /// - Invalid credentials
    /// - Network errors
    /// - Server not available
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from the warehouse and release any resources.
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if the connection is currently active.
    async fn is_connected(&self) -> bool;

    /// Whether this driver can run `capability`.
    fn supports(&self, capability: Capability) -> bool;

    /// Execute a statement outside any transaction and return the rows affected.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Run a query with positional `$n` parameters.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Get a display name for the current connection.
    fn display_name(&self) -> String {
        let config = self.connection_config();
        match &config.params {
            super::types::ConnectionParams::Server {
                hostname,
                port,
                username,
                database,
                ..
            } => {
                format!("{}@{}:{}/{}", username, hostname, port, database)
            }
            super::types::ConnectionParams::InMemory => ":memory:".to_string(),
        }
    }
}

/// Transaction handle.
///
/// Drivers keep the real transaction state keyed by `id`; the handle only
/// names it.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID (for tracking)
    pub id: u64,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

/// Trait for warehouses that support transactions.
#[async_trait]
pub trait Transactional: WarehouseConnection {
    /// Begin a new transaction.
    async fn begin_transaction(&self) -> Result<Transaction>;

    /// Commit a transaction.
    async fn commit(&self, tx: Transaction) -> Result<()>;

    /// Rollback a transaction.
    async fn rollback(&self, tx: Transaction) -> Result<()>;

    /// Execute a statement within a transaction.
    async fn execute_in_transaction(&self, tx: &Transaction, sql: &str) -> Result<u64>;

    /// Run a query within a transaction, seeing its uncommitted changes.
    async fn query_in_transaction(
        &self,
        tx: &Transaction,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>>;
}

/// A boxed transactional connection.
pub type BoxedConnection = Box<dyn Transactional>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_names() {
        assert_eq!(Capability::BulkCopy.to_string(), "COPY");
        assert_eq!(Capability::BulkUnload.to_string(), "UNLOAD");
        assert_eq!(Capability::Truncate.name(), "TRUNCATE");
    }

    #[test]
    fn test_transaction_names_id() {
        assert_eq!(Transaction::new(7).id, 7);
    }
}
