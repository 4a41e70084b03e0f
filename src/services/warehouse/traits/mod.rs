//! Warehouse abstraction traits and types.
//!
//! - **Types** (`types`): Warehouse type enum, connection configuration, SSL modes
//! - **Row/Value** (`row`): Warehouse-agnostic value representation
//! - **Connection** (`connection`): Connection and transaction traits, capabilities
//!
//! # Example
//!
//! ```ignore
//! use warehouse_loader::services::warehouse::{ConnectionConfig, WarehouseType};
//!
//! let config = ConnectionConfig::from_url("redshift://loader:pw@cluster:5439/analytics")?;
//! assert_eq!(config.warehouse_type, WarehouseType::Redshift);
//! ```

pub mod connection;
pub mod row;
pub mod types;

pub use connection::{BoxedConnection, Capability, Transaction, Transactional, WarehouseConnection};

pub use row::{quote_literal, Cell, ColumnInfo, Row, Value};

pub use types::{ConnectionConfig, ConnectionParams, SslMode, WarehouseType};
