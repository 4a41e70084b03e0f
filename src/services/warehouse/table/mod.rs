//! Reload, rebuild and unload for one warehouse table.
//!
//! Bulk `COPY` and `UNLOAD` are not transactional on their own. Destructive
//! operations here run inside one transaction and compare the row count
//! before and after; a drop rolls the whole transaction back.
//!
//! ```text
//!   count (before) ──► BEGIN ──► statements ──► count (after) ──┬─► COMMIT
//!                                    │                          │
//!                                    └── error ──► ROLLBACK     └─► after < before: ROLLBACK
//! ```

mod metadata;
pub mod statements;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransferError};
use crate::services::bucket::{BucketAccess, ObjectLocation};
use crate::services::warehouse::traits::{
    Capability, Row, Transaction, Transactional, Value, WarehouseConnection,
};

pub use metadata::ColumnMetadata;

/// Result of a guarded destructive operation.
///
/// `committed` holds exactly when `row_count_after >= row_count_before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub row_count_before: i64,
    pub row_count_after: i64,
    pub committed: bool,
}

impl TransactionOutcome {
    pub fn new(row_count_before: i64, row_count_after: i64) -> Self {
        Self {
            row_count_before,
            row_count_after,
            committed: row_count_after >= row_count_before,
        }
    }
}

/// Options for `COPY` from a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    pub encoding: String,
    /// Skip the first line of every source object.
    pub skip_header: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            encoding: "UTF8".to_string(),
            skip_header: true,
        }
    }
}

impl CopyOptions {
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn skip_header(mut self, skip_header: bool) -> Self {
        self.skip_header = skip_header;
        self
    }
}

/// A warehouse table addressed by `(schema, name)`.
///
/// The connection is borrowed; a `Table` never connects or disconnects it.
pub struct Table<'c> {
    schema: String,
    name: String,
    connection: &'c dyn Transactional,
}

impl std::fmt::Debug for Table<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema)
            .field("name", &self.name)
            .field("warehouse", &self.connection.warehouse_type())
            .finish()
    }
}

impl<'c> Table<'c> {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        connection: &'c dyn Transactional,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            connection,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.connection.supports(capability) {
            Ok(())
        } else {
            Err(TransferError::UnsupportedOperation(format!(
                "{} on {} is not supported by {}",
                capability,
                self.qualified_name(),
                self.connection.warehouse_type()
            )))
        }
    }

    fn require_all(&self, capabilities: &[Capability]) -> Result<()> {
        capabilities.iter().try_for_each(|c| self.require(*c))
    }

    /// Current row count.
    pub async fn count(&self) -> Result<i64> {
        self.require(Capability::Select)?;
        let rows = self
            .connection
            .query(&statements::count(&self.qualified_name()), &[])
            .await?;
        self.read_count(&rows)
    }

    async fn count_in(&self, tx: &Transaction) -> Result<i64> {
        let rows = self
            .connection
            .query_in_transaction(tx, &statements::count(&self.qualified_name()), &[])
            .await?;
        self.read_count(&rows)
    }

    fn read_count(&self, rows: &[Row]) -> Result<i64> {
        rows.first()
            .and_then(|row| row.get_value(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                TransferError::Warehouse(format!(
                    "COUNT(*) on {} returned no value",
                    self.qualified_name()
                ))
            })
    }

    /// Run `statements` in one transaction behind the row-count gate.
    ///
    /// `row_count_before` is taken by the caller, outside the transaction,
    /// since the statements may drop the table.
    async fn guarded(
        &self,
        operation: &str,
        row_count_before: i64,
        statements: &[String],
    ) -> Result<TransactionOutcome> {
        let table = self.qualified_name();
        let tx = self.connection.begin_transaction().await?;

        let mut result = Ok(());
        for sql in statements {
            debug!(%table, %sql, "{}", operation);
            if let Err(err) = self.connection.execute_in_transaction(&tx, sql).await {
                result = Err(err);
                break;
            }
        }

        let row_count_after = match result {
            Ok(()) => self.count_in(&tx).await,
            Err(err) => Err(err),
        };
        let row_count_after = match row_count_after {
            Ok(count) => count,
            Err(err) => {
                error!(%table, error = %err, "{} failed; rolling back", operation);
                if let Err(rollback_err) = self.connection.rollback(tx).await {
                    error!(%table, error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };

        let outcome = TransactionOutcome::new(row_count_before, row_count_after);
        if !outcome.committed {
            self.connection.rollback(tx).await?;
            warn!(
                %table,
                before = row_count_before,
                after = row_count_after,
                "{} shrank the table; rolled back",
                operation
            );
            return Err(TransferError::IntegrityRegression {
                table,
                before: row_count_before,
                after: row_count_after,
            });
        }

        self.connection.commit(tx).await?;
        info!(
            %table,
            before = row_count_before,
            after = row_count_after,
            "{} committed",
            operation
        );
        Ok(outcome)
    }

    /// Truncate and `COPY` every object under the bucket's location, with
    /// UTF8 encoding and a header line skipped.
    pub async fn reload_from_bucket(
        &self,
        bucket: &dyn BucketAccess,
        role: &str,
    ) -> Result<TransactionOutcome> {
        self.reload_from_bucket_with(bucket, role, &CopyOptions::default())
            .await
    }

    /// Truncate and `COPY` every object under the bucket's location.
    ///
    /// The region is the bucket handle's. Fails with `IntegrityRegression`
    /// if fewer rows were loaded than the table held before, leaving the
    /// table as it was.
    pub async fn reload_from_bucket_with(
        &self,
        bucket: &dyn BucketAccess,
        role: &str,
        options: &CopyOptions,
    ) -> Result<TransactionOutcome> {
        self.require_all(&[Capability::Select, Capability::Truncate, Capability::BulkCopy])?;
        let table = self.qualified_name();
        let source = bucket.url()?;

        let before = self.count().await?;
        let sql = [
            statements::truncate(&table),
            statements::copy_from(
                &table,
                &source,
                role,
                bucket.region(),
                &options.encoding,
                options.skip_header,
            ),
        ];
        self.guarded("reload from bucket", before, &sql).await
    }

    /// Delete every row and insert the result of `select`.
    pub async fn reload_from_sql(&self, select: &str) -> Result<TransactionOutcome> {
        self.require_all(&[Capability::Select, Capability::Delete, Capability::Insert])?;
        let table = self.qualified_name();

        let before = self.count().await?;
        let sql = [
            statements::delete_all(&table),
            statements::insert_select(&table, select),
        ];
        self.guarded("reload from sql", before, &sql).await
    }

    /// Drop the table and recreate it from `select`.
    ///
    /// On failure the original structure and data are restored.
    pub async fn rebuild_from_sql(&self, select: &str) -> Result<TransactionOutcome> {
        self.require_all(&[Capability::Select, Capability::Insert])?;
        let table = self.qualified_name();

        let before = self.count().await?;
        let sql = [
            statements::drop_cascade(&table),
            statements::create_as(&table, select),
        ];
        self.guarded("rebuild from sql", before, &sql).await
    }

    /// Key the unload for `date` is written to, under `location`.
    ///
    /// `<location>/<schema>/<table>/<YYYY-MM-DD>_<table>`
    pub fn unload_target(&self, location: &ObjectLocation, date: NaiveDate) -> Result<String> {
        location
            .child(&format!(
                "{}/{}/{}_{}",
                self.schema,
                self.name,
                date.format("%Y-%m-%d"),
                self.name
            ))
            .canonical_url()
    }

    /// Export the table as one quoted CSV object under the bucket's location.
    ///
    /// Returns the target written to. The row count is not verified.
    pub async fn unload_to_bucket(&self, bucket: &dyn BucketAccess, role: &str) -> Result<String> {
        self.require_all(&[Capability::Select, Capability::BulkUnload])?;
        let table = self.qualified_name();

        let columns = self.fetch_columns().await?;
        let select = statements::escaped_select(&table, &columns);
        let target = self.unload_target(bucket.location(), Utc::now().date_naive())?;

        let sql = statements::unload_to(&select, &target, role);
        debug!(%table, %sql, "unload");
        self.connection.execute(&sql).await?;

        info!(%table, %target, "unloaded");
        Ok(target)
    }

    fn not_found(&self) -> TransferError {
        TransferError::TableNotFound {
            schema: self.schema.clone(),
            table: self.name.clone(),
        }
    }

    /// Column names in physical order.
    pub async fn fetch_columns(&self) -> Result<Vec<String>> {
        let rows = self
            .connection
            .query(
                statements::COLUMNS_QUERY,
                &[Value::from(self.name.as_str()), Value::from(self.schema.as_str())],
            )
            .await?;
        if rows.is_empty() {
            return Err(self.not_found());
        }

        Ok(rows
            .iter()
            .filter_map(|row| row.get_value(0).and_then(Value::as_text))
            .collect())
    }

    /// Same as [`Table::fetch_columns`].
    pub async fn fetch_column_names(&self) -> Result<Vec<String>> {
        self.fetch_columns().await
    }

    /// Columns with types and comments. Never empty on success.
    pub async fn fetch_metadata(&self) -> Result<Vec<ColumnMetadata>> {
        let rows = self
            .connection
            .query(
                statements::METADATA_QUERY,
                &[
                    Value::from(self.qualified_name()),
                    Value::from(self.name.as_str()),
                    Value::from(self.schema.as_str()),
                ],
            )
            .await?;
        if rows.is_empty() {
            return Err(self.not_found());
        }

        Ok(rows.iter().map(ColumnMetadata::from_row).collect())
    }

    /// Up to `limit` rows.
    pub async fn fetch_rows(&self, limit: usize) -> Result<Vec<Row>> {
        self.require(Capability::Select)?;
        self.connection
            .query(&statements::fetch_rows(&self.qualified_name(), limit), &[])
            .await
    }

    /// Delete rows where `column = value`. Returns the rows affected.
    pub async fn delete_where(&self, column: &str, value: impl Into<Value>) -> Result<u64> {
        self.require(Capability::Delete)?;
        let sql = statements::delete_where(&self.qualified_name(), column, &value.into());
        self.connection.execute(&sql).await
    }

    /// Set `column = value` where `filter_column = filter_value`.
    pub async fn update_where(
        &self,
        column: &str,
        value: impl Into<Value>,
        filter_column: &str,
        filter_value: impl Into<Value>,
    ) -> Result<u64> {
        self.require(Capability::Update)?;
        let sql = statements::update_where(
            &self.qualified_name(),
            column,
            &value.into(),
            filter_column,
            &filter_value.into(),
        );
        self.connection.execute(&sql).await
    }

    /// Run any statement as is.
    pub async fn execute_raw(&self, statement: &str) -> Result<u64> {
        debug!(table = %self.qualified_name(), sql = %statement, "raw");
        self.connection.execute(statement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bucket::{Credentials, MemoryBucket, MemoryStore};
    use crate::services::warehouse::drivers::MemoryWarehouse;
    use bytes::Bytes;

    const ROLE: &str = "arn:aws:iam::123456789012:role/loader";

    fn warehouse_with(rows: usize) -> MemoryWarehouse {
        let warehouse = MemoryWarehouse::new();
        let rows = (1..=rows as i32)
            .map(|id| vec![Value::Int32(id), Value::from(format!("name {}", id))])
            .collect();
        smol::block_on(warehouse.create_table(
            "public",
            "accounts",
            &[("id", "integer"), ("name", "varchar")],
            rows,
        ))
        .unwrap();
        warehouse
    }

    fn bucket(store: &MemoryStore, prefix: &str) -> MemoryBucket {
        MemoryBucket::new(
            store.clone(),
            ObjectLocation::new("example-bucket").child(prefix),
            "us-east-1",
            &Credentials::new("AMAZONKEYID", "AMAZONSECRETACCESSKEY"),
        )
        .unwrap()
    }

    #[test]
    fn test_outcome_committed_flag() {
        assert!(TransactionOutcome::new(3, 3).committed);
        assert!(TransactionOutcome::new(3, 5).committed);
        assert!(!TransactionOutcome::new(3, 2).committed);
    }

    #[test]
    fn test_unload_target() {
        let warehouse = MemoryWarehouse::new();
        let table = Table::new("public", "accounts", &warehouse);
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();

        assert_eq!(
            table
                .unload_target(&ObjectLocation::new("example-bucket"), date)
                .unwrap(),
            "s3://example-bucket/public/accounts/2024-01-02_accounts"
        );
        assert_eq!(
            table
                .unload_target(&ObjectLocation::new("example-bucket").child("exports/"), date)
                .unwrap(),
            "s3://example-bucket/exports/public/accounts/2024-01-02_accounts"
        );
    }

    #[test]
    fn test_reload_from_bucket_replaces_rows() {
        let store = MemoryStore::new();
        let warehouse = warehouse_with(2).with_store(store.clone());
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            store.create_bucket("example-bucket").await;
            store
                .put(
                    "example-bucket",
                    "incoming/accounts.csv",
                    Bytes::from("id,name\n10,a\n11,b\n12,c\n"),
                    None,
                )
                .await
                .unwrap();

            let outcome = table
                .reload_from_bucket(&bucket(&store, "incoming"), ROLE)
                .await
                .unwrap();
            assert_eq!(outcome, TransactionOutcome::new(2, 3));
            assert_eq!(table.count().await.unwrap(), 3);

            let statements = warehouse.statements().await;
            assert!(statements.iter().any(|s| s.starts_with("COPY public.accounts FROM 's3://example-bucket/incoming'")
                && s.contains("region 'us-east-1'")
                && s.ends_with("IGNOREHEADER 1")));
        });
    }

    #[test]
    fn test_reload_from_bucket_rolls_back_on_regression() {
        let store = MemoryStore::new();
        let warehouse = warehouse_with(3).with_store(store.clone());
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            store.create_bucket("example-bucket").await;
            store
                .put(
                    "example-bucket",
                    "incoming/accounts.csv",
                    Bytes::from("id,name\n10,a\n"),
                    None,
                )
                .await
                .unwrap();

            let err = table
                .reload_from_bucket(&bucket(&store, "incoming"), ROLE)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                TransferError::IntegrityRegression { before: 3, after: 1, .. }
            ));

            let rows = warehouse.rows("public", "accounts").await.unwrap();
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[0][0], Value::Int32(1));
            assert_eq!(warehouse.statements().await.last().map(String::as_str), Some("ROLLBACK"));
        });
    }

    #[test]
    fn test_statement_failure_rolls_back() {
        let warehouse = warehouse_with(2);
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            warehouse.fail_statements_matching("^INSERT").await.unwrap();
            let result = table.reload_from_sql("SELECT * FROM public.accounts").await;

            assert!(matches!(result, Err(TransferError::Warehouse(_))));
            assert_eq!(warehouse.row_count("public", "accounts").await, Some(2));
        });
    }

    #[test]
    fn test_reload_from_sql() {
        let warehouse = warehouse_with(1);
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            warehouse
                .create_table(
                    "public",
                    "staging",
                    &[("id", "integer"), ("name", "varchar")],
                    vec![
                        vec![Value::Int32(5), Value::from("e")],
                        vec![Value::Int32(6), Value::from("f")],
                    ],
                )
                .await
                .unwrap();

            let outcome = table
                .reload_from_sql("SELECT * FROM public.staging")
                .await
                .unwrap();
            assert_eq!(outcome.row_count_after, 2);
            assert!(warehouse
                .statements()
                .await
                .contains(&"DELETE FROM public.accounts".to_string()));
        });
    }

    #[test]
    fn test_update_requires_capability() {
        let warehouse = warehouse_with(1);
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            let result = table.update_where("name", "x", "id", 1).await;
            assert!(matches!(result, Err(TransferError::UnsupportedOperation(_))));

            // Nothing ran, not even the count
            assert!(warehouse.statements().await.is_empty());
        });
    }

    #[test]
    fn test_fetch_metadata_missing_table() {
        let warehouse = MemoryWarehouse::new();
        let table = Table::new("fake_schema", "fake_table", &warehouse);

        smol::block_on(async {
            assert!(matches!(
                table.fetch_metadata().await,
                Err(TransferError::TableNotFound { .. })
            ));
            assert!(matches!(
                table.fetch_columns().await,
                Err(TransferError::TableNotFound { .. })
            ));
        });
    }

    #[test]
    fn test_pass_through_operations() {
        let warehouse = warehouse_with(3);
        let table = Table::new("public", "accounts", &warehouse);

        smol::block_on(async {
            assert_eq!(table.delete_where("id", 2).await.unwrap(), 1);
            assert_eq!(table.fetch_rows(10).await.unwrap().len(), 2);
            assert_eq!(table.fetch_rows(1).await.unwrap().len(), 1);
            assert_eq!(table.execute_raw("TRUNCATE public.accounts").await.unwrap(), 2);
            assert_eq!(table.count().await.unwrap(), 0);
        });
    }
}
