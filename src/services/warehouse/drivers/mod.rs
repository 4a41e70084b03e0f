//! Warehouse driver implementations.
//!
//! - **PostgreSQL / Redshift**: via SQLx; bulk COPY/UNLOAD on Redshift only
//! - **In-memory**: test double over a caller-owned object store
//!
//! Each driver implements the `WarehouseConnection` and `Transactional` traits.

mod factory;
pub mod memory;
pub mod postgres;

pub use factory::ConnectionFactory;
pub use memory::MemoryWarehouse;
pub use postgres::PostgresConnection;
