//! Entry point tying bucket access and warehouse tables to one configuration.
//!
//! The strategy picks the backends once, at construction:
//!
//! - [`Strategy::Live`]: S3 handles and a SQLx warehouse connection
//! - [`Strategy::Fake`]: a [`MemoryStore`] and a [`MemoryWarehouse`] linked to it
//!
//! # Example
//!
//! ```ignore
//! let mut gateway = Gateway::new(GatewayConfig::from_env()?)?;
//! gateway.connect_warehouse().await?;
//!
//! let bucket = gateway.bucket_subdir("public/account_facts", "example-bucket")?;
//! gateway
//!     .table("public", "account_facts")?
//!     .reload_from_bucket(bucket.as_ref(), role)
//!     .await?;
//! ```

mod config;

pub use config::{GatewayConfig, Strategy};

use crate::error::{Result, TransferError};
use crate::services::bucket::{
    as_folder, BoxedBucketAccess, BucketBackend, BucketFactory, MemoryStore, ObjectLocation,
};
use crate::services::warehouse::{
    BoxedConnection, ConnectionFactory, MemoryWarehouse, Table, WarehouseConnection,
};

/// Opens bucket handles and warehouse tables.
pub struct Gateway {
    config: GatewayConfig,
    buckets: BucketFactory,
    warehouse: Option<BoxedConnection>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("strategy", &self.config.strategy)
            .field("region", &self.config.region)
            .field("buckets", &self.buckets.backend_type())
            .field(
                "warehouse",
                &self.warehouse.as_ref().map(|w| w.warehouse_type()),
            )
            .finish()
    }
}

impl Gateway {
    /// Build the backends `config.strategy` selects.
    ///
    /// A fake gateway gets a fresh store and warehouse; use
    /// [`Gateway::fake`] to keep handles on them. Credentials are not
    /// checked until a bucket is opened.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        match config.strategy {
            Strategy::Live => {
                let warehouse = config
                    .warehouse
                    .clone()
                    .map(ConnectionFactory::create)
                    .transpose()?;
                let buckets = BucketFactory::new(BucketBackend::S3(config.storage_config()));
                Ok(Self {
                    config,
                    buckets,
                    warehouse,
                })
            }
            Strategy::Fake => Ok(Self::fake(config, MemoryStore::new(), MemoryWarehouse::new())),
        }
    }

    /// A fake gateway over a caller-owned store and warehouse.
    ///
    /// The warehouse is linked to the store, so `COPY` reads what buckets
    /// wrote and `UNLOAD` writes where buckets can read.
    pub fn fake(mut config: GatewayConfig, store: MemoryStore, warehouse: MemoryWarehouse) -> Self {
        config.strategy = Strategy::Fake;
        let buckets = BucketFactory::new(BucketBackend::Memory {
            store: store.clone(),
            config: config.storage_config(),
        });
        Self {
            config,
            buckets,
            warehouse: Some(warehouse.with_store(store).boxed()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn strategy(&self) -> Strategy {
        self.config.strategy
    }

    /// Handle on the root of `bucket_name`.
    ///
    /// # Errors
    ///
    /// `MissingCredentials` if the key pair is incomplete, before any store
    /// access.
    pub fn bucket(&self, bucket_name: &str) -> Result<BoxedBucketAccess> {
        self.buckets.open(ObjectLocation::new(bucket_name))
    }

    /// Handle on `path` inside `bucket_name`; its url is `s3://<bucket>/<path>/`.
    pub fn bucket_subdir(&self, path: &str, bucket_name: &str) -> Result<BoxedBucketAccess> {
        self.buckets
            .open(ObjectLocation::new(bucket_name).child(&as_folder(path)))
    }

    /// Connect the warehouse if it is not connected yet.
    pub async fn connect_warehouse(&mut self) -> Result<()> {
        let warehouse = self.warehouse.as_mut().ok_or_else(no_warehouse)?;
        if !warehouse.is_connected().await {
            warehouse.connect().await?;
        }
        Ok(())
    }

    /// Disconnect the warehouse, if any.
    pub async fn disconnect_warehouse(&mut self) -> Result<()> {
        if let Some(warehouse) = self.warehouse.as_mut() {
            if warehouse.is_connected().await {
                warehouse.disconnect().await?;
            }
        }
        Ok(())
    }

    /// Table `schema.name` on the gateway's warehouse.
    pub fn table(&self, schema: &str, name: &str) -> Result<Table<'_>> {
        let warehouse = self.warehouse.as_deref().ok_or_else(no_warehouse)?;
        Ok(Table::new(schema, name, warehouse))
    }
}

fn no_warehouse() -> TransferError {
    TransferError::Warehouse("gateway has no warehouse configured".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bucket::{BackendType, BucketAccess, Credentials};
    use crate::services::warehouse::ConnectionConfig;

    fn config(strategy: Strategy) -> GatewayConfig {
        GatewayConfig::new(
            Credentials::new("AMAZONKEYID", "AMAZONSECRETACCESSKEY"),
            "us-east-1",
            strategy,
        )
    }

    #[test]
    fn test_live_gateway_bucket() {
        let gateway = Gateway::new(config(Strategy::Live)).unwrap();
        let bucket = gateway.bucket("example-bucket").unwrap();

        assert_eq!(bucket.backend_type(), BackendType::S3);
        assert_eq!(bucket.url().unwrap(), "s3://example-bucket");
        assert_eq!(bucket.region(), "us-east-1");
    }

    #[test]
    fn test_bucket_subdir_url() {
        let gateway = Gateway::new(config(Strategy::Fake)).unwrap();
        let bucket = gateway
            .bucket_subdir("public/account_facts", "example-bucket")
            .unwrap();

        assert_eq!(bucket.backend_type(), BackendType::Memory);
        assert_eq!(
            bucket.url().unwrap(),
            "s3://example-bucket/public/account_facts/"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let gateway = Gateway::new(GatewayConfig::new(
            Credentials::new("", ""),
            "us-east-1",
            Strategy::Live,
        ))
        .unwrap();

        assert!(matches!(
            gateway.bucket("example-bucket"),
            Err(TransferError::MissingCredentials)
        ));
    }

    #[test]
    fn test_table_needs_warehouse() {
        let gateway = Gateway::new(config(Strategy::Live)).unwrap();
        assert!(matches!(
            gateway.table("public", "accounts"),
            Err(TransferError::Warehouse(_))
        ));
    }

    #[test]
    fn test_live_warehouse_is_not_connected_eagerly() {
        let live = config(Strategy::Live).with_warehouse(
            ConnectionConfig::from_url(
                "redshift://loader:pw@cluster.example.com/analytics",
            )
            .unwrap(),
        );
        let gateway = Gateway::new(live).unwrap();
        let table = gateway.table("public", "accounts").unwrap();

        assert_eq!(table.qualified_name(), "public.accounts");
        assert!(format!("{:?}", gateway).contains("Redshift"));
    }

    #[test]
    fn test_fake_gateway_connects() {
        let mut gateway = Gateway::fake(
            config(Strategy::Live),
            MemoryStore::new(),
            MemoryWarehouse::new(),
        );
        assert_eq!(gateway.strategy(), Strategy::Fake);

        smol::block_on(async {
            gateway.connect_warehouse().await.unwrap();
            gateway.disconnect_warehouse().await.unwrap();
        });
        let table = gateway.table("public", "accounts").unwrap();
        assert!(format!("{:?}", table).contains("InMemory"));
    }
}
