//! Error types shared by the bucket and warehouse services.

use thiserror::Error;

/// Errors raised while addressing buckets or moving data through a warehouse table.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Missing credentials: access key id and secret access key are required")]
    MissingCredentials,

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Table not found: {schema}.{table}")]
    TableNotFound { schema: String, table: String },

    #[error("Schema error: {0}")]
    Schema(String),

    /// The row count dropped across a destructive operation; the transaction was rolled back.
    #[error("Row count for {table} regressed from {before} to {after}; changes rolled back")]
    IntegrityRegression { table: String, before: i64, after: i64 },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] opendal::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransferError {
    /// Whether this error was produced by the row-count integrity gate.
    pub fn is_integrity_regression(&self) -> bool {
        matches!(self, Self::IntegrityRegression { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TransferError>;
