//! Gateway configuration.
//!
//! Loaded from a JSON file or from the process environment.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::services::bucket::{Credentials, StorageConfig};
use crate::services::warehouse::ConnectionConfig;

/// Which backends a gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// S3 through OpenDAL and a SQLx warehouse connection.
    #[default]
    #[serde(alias = "real")]
    Live,
    /// In-memory store and warehouse.
    Fake,
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" | "real" => Ok(Self::Live),
            "fake" => Ok(Self::Fake),
            other => Err(anyhow!("invalid warehouse strategy: {:?}", other)),
        }
    }
}

/// Everything a [`Gateway`](super::Gateway) needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub credentials: Credentials,
    pub region: String,
    #[serde(default)]
    pub strategy: Strategy,
    /// Warehouse to open tables on; `None` for bucket-only use.
    #[serde(default)]
    pub warehouse: Option<ConnectionConfig>,
    /// Endpoint of an S3-compatible store.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

impl GatewayConfig {
    pub fn new(credentials: Credentials, region: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            credentials,
            region: region.into(),
            strategy,
            warehouse: None,
            endpoint: None,
            path_style: false,
        }
    }

    pub fn with_warehouse(mut self, warehouse: ConnectionConfig) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// Storage settings for bucket handles.
    pub fn storage_config(&self) -> StorageConfig {
        let config = StorageConfig::new(self.credentials.clone(), self.region.clone());
        match &self.endpoint {
            Some(endpoint) => config.with_endpoint(endpoint.clone(), self.path_style),
            None => config,
        }
    }

    /// Read a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read gateway config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid gateway config {}", path.display()))
    }

    /// Build from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`,
    /// `WAREHOUSE_STRATEGY` (`live` or `fake`) and `WAREHOUSE_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] over any variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            lookup("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            lookup("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        );
        let region = lookup("AWS_REGION").context("AWS_REGION is not set")?;
        let strategy = match lookup("WAREHOUSE_STRATEGY") {
            Some(value) => value.parse()?,
            None => Strategy::default(),
        };

        let mut config = Self::new(credentials, region, strategy);
        if let Some(url) = lookup("WAREHOUSE_URL") {
            config.warehouse = Some(
                ConnectionConfig::from_url(&url).context("Invalid WAREHOUSE_URL")?,
            );
        }
        config.endpoint = lookup("AWS_ENDPOINT_URL");
        Ok(config)
    }
}
