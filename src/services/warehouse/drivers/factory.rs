//! Connection factory for creating warehouse connections.
//!
//! The factory picks the driver from the configuration's warehouse type.

use super::memory::MemoryWarehouse;
use super::postgres::PostgresConnection;
use crate::error::{Result, TransferError};
use crate::services::warehouse::traits::{BoxedConnection, ConnectionConfig, WarehouseType};

/// Factory for creating warehouse connections based on configuration.
///
/// # Example
///
/// ```ignore
/// let config = ConnectionConfig::from_url("redshift://loader:pw@cluster:5439/analytics")?;
/// let connection = ConnectionFactory::create(config)?;
/// ```
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Create a new, not yet connected, warehouse connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters do not fit the warehouse type.
    pub fn create(config: ConnectionConfig) -> Result<BoxedConnection> {
        config.validate().map_err(TransferError::Warehouse)?;

        match config.warehouse_type {
            WarehouseType::Redshift | WarehouseType::PostgreSQL => {
                Ok(PostgresConnection::boxed(config))
            }
            // A fresh in-memory warehouse has no linked store; gateways
            // needing COPY/UNLOAD pass their own instance instead.
            WarehouseType::InMemory => Ok(MemoryWarehouse::new().boxed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::traits::{ConnectionParams, WarehouseConnection};

    #[test]
    fn test_factory_creates_redshift() {
        let config =
            ConnectionConfig::from_url("redshift://loader:pw@cluster.example.com/analytics")
                .unwrap();
        let conn = ConnectionFactory::create(config).unwrap();
        assert_eq!(conn.warehouse_type(), WarehouseType::Redshift);
    }

    #[test]
    fn test_factory_creates_memory() {
        let conn = ConnectionFactory::create(ConnectionConfig::in_memory("test")).unwrap();
        assert_eq!(conn.warehouse_type(), WarehouseType::InMemory);
    }

    #[test]
    fn test_factory_rejects_mismatched_params() {
        let config = ConnectionConfig::new(
            "test".to_string(),
            WarehouseType::PostgreSQL,
            ConnectionParams::InMemory,
        );
        assert!(matches!(
            ConnectionFactory::create(config),
            Err(TransferError::Warehouse(_))
        ));
    }
}
