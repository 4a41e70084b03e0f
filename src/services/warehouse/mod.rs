//! Warehouse connections and the table transfer engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Table                               │
//! │  reload / rebuild behind a row-count gate, unload, catalog  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ &dyn Transactional
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//! ┌──────────────────────────┐ ┌──────────────────────────┐
//! │  PostgresConnection      │ │  MemoryWarehouse         │
//! │  (SQLx; Redshift, PG)    │ │  (linked MemoryStore)    │
//! └──────────────────────────┘ └──────────────────────────┘
//! ```

pub mod drivers;
pub mod table;
pub mod traits;

pub use drivers::{ConnectionFactory, MemoryWarehouse, PostgresConnection};
pub use table::{ColumnMetadata, CopyOptions, Table, TransactionOutcome};
pub use traits::{
    BoxedConnection, Capability, Cell, ColumnInfo, ConnectionConfig, ConnectionParams, Row,
    SslMode, Transaction, Transactional, Value, WarehouseConnection, WarehouseType,
};
