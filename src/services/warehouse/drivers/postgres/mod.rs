//! PostgreSQL / Redshift warehouse driver.
//!
//! # Example
//!
//! ```ignore
//! use warehouse_loader::services::warehouse::{ConnectionConfig, PostgresConnection};
//!
//! let config = ConnectionConfig::from_url("redshift://loader:pw@cluster:5439/analytics")?;
//! let mut conn = PostgresConnection::new(config);
//! conn.connect().await?;
//! ```

mod connection;
mod types;

pub use connection::PostgresConnection;
pub use types::PgValueConverter;
