//! Bulk transfer between an object store and a warehouse table, guarded by
//! a row-count check.
//!
//! - [`services::bucket`]: object addressing and access over S3 or memory
//! - [`services::warehouse`]: warehouse drivers and the [`Table`] engine
//! - [`services::gateway`]: configuration and backend selection

pub mod error;
pub mod services;
pub mod telemetry;

pub use error::{Result, TransferError};
pub use services::bucket::{BucketAccess, MemoryStore, ObjectLocation};
pub use services::gateway::{Gateway, GatewayConfig, Strategy};
pub use services::warehouse::{MemoryWarehouse, Table, TransactionOutcome};
