//! In-memory warehouse connection.
//!
//! Clones share state, so a test can hand one clone to a gateway and keep
//! another to seed tables and inspect the statement log.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_lock::RwLock;
use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;

use super::statement::{Copy, Filter, Projection, Select, Statement, TableRef, Unload};
use super::table::{MemoryColumn, MemoryTable};
use crate::error::{Result, TransferError};
use crate::services::bucket::{MemoryStore, ObjectLocation};
use crate::services::warehouse::traits::{
    BoxedConnection, Capability, ConnectionConfig, Row, Transaction, Transactional, Value,
    WarehouseConnection, WarehouseType,
};

#[derive(Debug, Default)]
struct WarehouseState {
    tables: BTreeMap<TableRef, MemoryTable>,
    /// Per open transaction, each table it changed as it was before the
    /// first change (`None` if the table did not exist).
    undo: HashMap<u64, BTreeMap<TableRef, Option<MemoryTable>>>,
    statements: Vec<String>,
    failures: Vec<Regex>,
    next_transaction_id: u64,
}

/// Warehouse double that runs the statements the table engine generates.
///
/// `COPY` and `UNLOAD` go through the linked [`MemoryStore`]. Statements are
/// applied as they run; a rollback restores only the tables the transaction
/// changed.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    config: ConnectionConfig,
    state: Arc<RwLock<WarehouseState>>,
    store: Option<MemoryStore>,
    connected: bool,
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::in_memory("memory"),
            state: Arc::new(RwLock::new(WarehouseState::default())),
            store: None,
            connected: true,
        }
    }

    /// Link the object store `COPY` reads from and `UNLOAD` writes to.
    pub fn with_store(mut self, store: MemoryStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn boxed(self) -> BoxedConnection {
        Box::new(self)
    }

    /// Create (or replace) a table.
    ///
    /// `columns` are `(name, data_type)` pairs; `rows` are coerced to the
    /// column types.
    pub async fn create_table(
        &self,
        schema: &str,
        name: &str,
        columns: &[(&str, &str)],
        rows: Vec<Vec<Value>>,
    ) -> Result<()> {
        let mut table = MemoryTable::new(
            columns
                .iter()
                .map(|(name, data_type)| MemoryColumn::new(*name, *data_type))
                .collect(),
        );
        table.append(rows)?;

        self.state
            .write()
            .await
            .tables
            .insert(TableRef::new(schema, name), table);
        Ok(())
    }

    pub async fn set_table_comment(&self, schema: &str, name: &str, comment: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let table = table_mut(&mut state.tables, &TableRef::new(schema, name))?;
        table.comment = Some(comment.to_string());
        Ok(())
    }

    pub async fn set_column_comment(
        &self,
        schema: &str,
        name: &str,
        column: &str,
        comment: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let table = table_mut(&mut state.tables, &TableRef::new(schema, name))?;
        let index = table.column_index(column).ok_or_else(|| {
            TransferError::Warehouse(format!("column \"{}\" does not exist", column))
        })?;
        table.columns[index].comment = Some(comment.to_string());
        Ok(())
    }

    pub async fn table_exists(&self, schema: &str, name: &str) -> bool {
        self.state
            .read()
            .await
            .tables
            .contains_key(&TableRef::new(schema, name))
    }

    /// Current rows of a table, in insertion order.
    pub async fn rows(&self, schema: &str, name: &str) -> Option<Vec<Vec<Value>>> {
        self.state
            .read()
            .await
            .tables
            .get(&TableRef::new(schema, name))
            .map(|table| table.rows.clone())
    }

    /// Column `(name, data_type)` pairs of a table.
    pub async fn columns(&self, schema: &str, name: &str) -> Option<Vec<(String, String)>> {
        self.state
            .read()
            .await
            .tables
            .get(&TableRef::new(schema, name))
            .map(|table| {
                table
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.data_type.clone()))
                    .collect()
            })
    }

    pub async fn row_count(&self, schema: &str, name: &str) -> Option<usize> {
        self.rows(schema, name).await.map(|rows| rows.len())
    }

    /// Every statement run so far, including ones that failed.
    pub async fn statements(&self) -> Vec<String> {
        self.state.read().await.statements.clone()
    }

    /// Make every later statement matching `pattern` fail.
    pub async fn fail_statements_matching(&self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| TransferError::Warehouse(format!("invalid failure pattern: {}", e)))?;
        self.state.write().await.failures.push(regex);
        Ok(())
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Drop all tables, open transactions, failures and the statement log.
    pub async fn reset(&self) {
        *self.state.write().await = WarehouseState::default();
    }

    /// Run one statement against the shared state, inside transaction `tx` if given.
    async fn run(&self, sql: &str, params: &[Value], tx: Option<u64>) -> Result<(u64, Vec<Row>)> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.statements.push(sql.to_string());
        tracing::debug!(%sql, "memory warehouse");

        if state.failures.iter().any(|re| re.is_match(sql)) {
            return Err(TransferError::Warehouse(format!(
                "injected failure for statement: {}",
                sql
            )));
        }

        let statement = Statement::parse(sql)?;
        if let (Some(id), Some(table)) = (tx, statement.target()) {
            if let Some(touched) = state.undo.get_mut(&id) {
                touched
                    .entry(table.clone())
                    .or_insert_with(|| state.tables.get(table).cloned());
            }
        }

        match statement {
            Statement::Select(select) => {
                let (_, rows) = evaluate(&state.tables, &select)?;
                Ok((0, rows))
            }
            Statement::Truncate(table) => {
                let target = table_mut(&mut state.tables, &table)?;
                let removed = target.rows.len() as u64;
                target.rows.clear();
                Ok((removed, Vec::new()))
            }
            Statement::Delete { table, filter } => {
                let target = table_mut(&mut state.tables, &table)?;
                let before = target.rows.len();
                match filter {
                    None => target.rows.clear(),
                    Some(filter) => {
                        let index = filter_index(target, &filter)?;
                        target
                            .rows
                            .retain(|row| !matches_filter(&row[index], &filter));
                    }
                }
                Ok(((before - target.rows.len()) as u64, Vec::new()))
            }
            Statement::Update => Err(TransferError::UnsupportedOperation(
                "UPDATE is not supported by the in-memory warehouse".to_string(),
            )),
            Statement::InsertSelect { table, select } => {
                let (_, result) = evaluate(&state.tables, &select)?;
                let rows = result.into_iter().map(row_values).collect();
                let added = table_mut(&mut state.tables, &table)?.append(rows)?;
                Ok((added as u64, Vec::new()))
            }
            Statement::Drop { table, if_exists } => {
                if state.tables.remove(&table).is_none() && !if_exists {
                    return Err(table_not_found(&table));
                }
                Ok((0, Vec::new()))
            }
            Statement::CreateAs { table, select } => {
                if state.tables.contains_key(&table) {
                    return Err(TransferError::Warehouse(format!(
                        "relation \"{}\" already exists",
                        table.qualified()
                    )));
                }
                let (columns, result) = evaluate(&state.tables, &select)?;
                let mut created = MemoryTable::new(columns);
                let added = created.append(result.into_iter().map(row_values).collect())?;
                state.tables.insert(table, created);
                Ok((added as u64, Vec::new()))
            }
            Statement::Copy(copy) => {
                let rows = self.load_objects(&copy).await?;
                let added = table_mut(&mut state.tables, &copy.table)?.append(rows)?;
                Ok((added as u64, Vec::new()))
            }
            Statement::Unload(unload) => {
                let (_, rows) = evaluate(&state.tables, &unload.select)?;
                self.write_unload(&unload, &rows).await?;
                Ok((rows.len() as u64, Vec::new()))
            }
            Statement::Catalog { with_comments } => {
                catalog(&state.tables, params, with_comments).map(|rows| (0, rows))
            }
        }
    }

    fn linked_store(&self) -> Result<&MemoryStore> {
        self.store.as_ref().ok_or_else(|| {
            TransferError::UnsupportedOperation(
                "in-memory warehouse has no linked object store".to_string(),
            )
        })
    }

    /// Read and parse every object whose key starts with the source prefix.
    async fn load_objects(&self, copy: &Copy) -> Result<Vec<Vec<Value>>> {
        if !matches!(copy.encoding.as_str(), "UTF8" | "UTF-8") {
            return Err(TransferError::UnsupportedOperation(format!(
                "encoding {} is not supported by the in-memory warehouse",
                copy.encoding
            )));
        }

        let store = self.linked_store()?;
        let source = ObjectLocation::parse(&copy.source_url)?;
        let keys = store.keys(source.bucket()).await?;

        let mut rows = Vec::new();
        for key in keys.iter().filter(|k| k.starts_with(source.path_prefix())) {
            let Some(object) = store.get(source.bucket(), key).await else {
                continue;
            };
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(object.data.as_ref());

            for record in reader.records().skip(copy.skip_lines) {
                let record = record?;
                rows.push(record.iter().map(|field| Value::Text(field.to_string())).collect());
            }
        }

        tracing::debug!(source = %copy.source_url, rows = rows.len(), "copy");
        Ok(rows)
    }

    /// Write the result as one quoted CSV object.
    ///
    /// Fields are wrapped in quotes without escaping; the select has
    /// already doubled embedded quotes. NULL becomes an empty field.
    async fn write_unload(&self, unload: &Unload, rows: &[Row]) -> Result<()> {
        let store = self.linked_store()?;
        let target = ObjectLocation::parse(&unload.target_url)?;
        let suffix = if unload.parallel { "0000_part_00" } else { "000" };
        let key = format!("{}{}", target.path_prefix(), suffix);

        let mut body = String::new();
        for row in rows {
            let line = row
                .values()
                .map(|value| match value.as_text() {
                    Some(text) => format!("\"{}\"", text),
                    None => String::new(),
                })
                .collect::<Vec<_>>()
                .join(",");
            body.push_str(&line);
            body.push('\n');
        }

        store
            .put(target.bucket(), &key, Bytes::from(body), Some("text/csv"))
            .await
    }
}

fn table_not_found(table: &TableRef) -> TransferError {
    TransferError::TableNotFound {
        schema: table.schema.clone(),
        table: table.name.clone(),
    }
}

fn table_mut<'a>(
    tables: &'a mut BTreeMap<TableRef, MemoryTable>,
    table: &TableRef,
) -> Result<&'a mut MemoryTable> {
    tables.get_mut(table).ok_or_else(|| table_not_found(table))
}

fn filter_index(table: &MemoryTable, filter: &Filter) -> Result<usize> {
    table.column_index(&filter.column).ok_or_else(|| {
        TransferError::Warehouse(format!("column \"{}\" does not exist", filter.column))
    })
}

fn matches_filter(value: &Value, filter: &Filter) -> bool {
    match (&filter.literal, value.as_text()) {
        (Some(literal), Some(text)) => *literal == text,
        _ => false,
    }
}

fn row_values(row: Row) -> Vec<Value> {
    row.cells.into_iter().map(|cell| cell.value).collect()
}

/// Evaluate a select, returning result columns and rows.
fn evaluate(
    tables: &BTreeMap<TableRef, MemoryTable>,
    select: &Select,
) -> Result<(Vec<MemoryColumn>, Vec<Row>)> {
    let source = tables
        .get(&select.source)
        .ok_or_else(|| table_not_found(&select.source))?;

    let filtered: Vec<&Vec<Value>> = match &select.filter {
        None => source.rows.iter().collect(),
        Some(filter) => {
            let index = filter_index(source, filter)?;
            source
                .rows
                .iter()
                .filter(|row| matches_filter(&row[index], filter))
                .collect()
        }
    };

    if let [Projection::Count { alias }] = select.projection.as_slice() {
        let count = Value::Int64(filtered.len() as i64);
        return Ok((
            vec![MemoryColumn::new(alias.clone(), "bigint")],
            vec![Row::from_named(vec![(alias.clone(), count)])],
        ));
    }

    // (source index, output column, quote-escape as text)
    let mut outputs: Vec<(usize, MemoryColumn, bool)> = Vec::new();
    for item in &select.projection {
        match item {
            Projection::All => outputs.extend(
                source
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(idx, column)| (idx, column.clone(), false)),
            ),
            Projection::Column { name, alias } | Projection::QuotedText { name, alias } => {
                let idx = source.column_index(name).ok_or_else(|| {
                    TransferError::Warehouse(format!("column \"{}\" does not exist", name))
                })?;
                let quoted = matches!(item, Projection::QuotedText { .. });
                let data_type = if quoted {
                    "text".to_string()
                } else {
                    source.columns[idx].data_type.clone()
                };
                outputs.push((idx, MemoryColumn::new(alias.clone(), data_type), quoted));
            }
            Projection::Count { .. } => {
                return Err(TransferError::Warehouse(
                    "COUNT(*) cannot be mixed with other select items".to_string(),
                ));
            }
        }
    }

    let rows = filtered
        .into_iter()
        .take(select.limit.unwrap_or(usize::MAX))
        .map(|values| {
            Row::from_named(
                outputs
                    .iter()
                    .map(|(idx, column, quoted)| {
                        let value = &values[*idx];
                        let value = match (quoted, value.as_text()) {
                            (true, Some(text)) => Value::Text(text.replace('"', "\"\"")),
                            (true, None) => Value::Null,
                            (false, _) => value.clone(),
                        };
                        (column.name.clone(), value)
                    })
                    .collect(),
            )
        })
        .collect();

    Ok((outputs.into_iter().map(|(_, column, _)| column).collect(), rows))
}

/// Answer a catalog query.
///
/// Column listing takes `[table, schema]` and returns nothing for an unknown
/// table. The comment lookup takes `[schema.table, table, schema]` and fails
/// for an unknown table, as the `::regclass` cast does.
fn catalog(
    tables: &BTreeMap<TableRef, MemoryTable>,
    params: &[Value],
    with_comments: bool,
) -> Result<Vec<Row>> {
    let param = |idx: usize| {
        params
            .get(idx)
            .and_then(Value::as_text)
            .ok_or_else(|| TransferError::Warehouse(format!("missing parameter ${}", idx + 1)))
    };

    let (table, schema) = if with_comments {
        (param(1)?, param(2)?)
    } else {
        (param(0)?, param(1)?)
    };
    let table_ref = TableRef::new(&schema, &table);

    let Some(found) = tables.get(&table_ref) else {
        return if with_comments {
            Err(table_not_found(&table_ref))
        } else {
            Ok(Vec::new())
        };
    };

    let rows = found
        .columns
        .iter()
        .map(|column| {
            let mut pairs = vec![("column_name".to_string(), Value::from(column.name.clone()))];
            if with_comments {
                pairs.push(("data_type".to_string(), Value::from(column.data_type.clone())));
                pairs.push(("comments".to_string(), Value::from(column.comment.clone())));
                pairs.push((
                    "table_comments".to_string(),
                    Value::from(found.comment.clone()),
                ));
            }
            Row::from_named(pairs)
        })
        .collect();

    Ok(rows)
}

#[async_trait]
impl WarehouseConnection for MemoryWarehouse {
    fn warehouse_type(&self) -> WarehouseType {
        WarehouseType::InMemory
    }

    fn connection_config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected
    }

    fn supports(&self, capability: Capability) -> bool {
        capability != Capability::Update
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.run(sql, &[], None).await.map(|(affected, _)| affected)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run(sql, params, None).await.map(|(_, rows)| rows)
    }
}

#[async_trait]
impl Transactional for MemoryWarehouse {
    async fn begin_transaction(&self) -> Result<Transaction> {
        let mut state = self.state.write().await;
        state.next_transaction_id += 1;
        let id = state.next_transaction_id;
        state.undo.insert(id, BTreeMap::new());
        state.statements.push("BEGIN".to_string());
        Ok(Transaction::new(id))
    }

    async fn commit(&self, tx: Transaction) -> Result<()> {
        let mut state = self.state.write().await;
        state.undo.remove(&tx.id).ok_or_else(|| inactive(&tx))?;
        state.statements.push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(&self, tx: Transaction) -> Result<()> {
        let mut state = self.state.write().await;
        let touched = state.undo.remove(&tx.id).ok_or_else(|| inactive(&tx))?;
        for (table, prior) in touched {
            match prior {
                Some(prior) => state.tables.insert(table, prior),
                None => state.tables.remove(&table),
            };
        }
        state.statements.push("ROLLBACK".to_string());
        Ok(())
    }

    async fn execute_in_transaction(&self, tx: &Transaction, sql: &str) -> Result<u64> {
        self.ensure_active(tx).await?;
        self.run(sql, &[], Some(tx.id))
            .await
            .map(|(affected, _)| affected)
    }

    async fn query_in_transaction(
        &self,
        tx: &Transaction,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>> {
        self.ensure_active(tx).await?;
        self.run(sql, params, Some(tx.id)).await.map(|(_, rows)| rows)
    }
}

impl MemoryWarehouse {
    async fn ensure_active(&self, tx: &Transaction) -> Result<()> {
        if self.state.read().await.undo.contains_key(&tx.id) {
            Ok(())
        } else {
            Err(inactive(tx))
        }
    }
}

fn inactive(tx: &Transaction) -> TransferError {
    TransferError::Warehouse(format!("Transaction {} is not active", tx.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryWarehouse {
        let warehouse = MemoryWarehouse::new();
        smol::block_on(warehouse.create_table(
            "public",
            "accounts",
            &[("id", "integer"), ("name", "varchar")],
            vec![
                vec![Value::Int32(1), Value::from("alice")],
                vec![Value::Int32(2), Value::from("bob")],
            ],
        ))
        .unwrap();
        warehouse
    }

    #[test]
    fn test_count_and_delete() {
        let warehouse = seeded();
        smol::block_on(async {
            let rows = warehouse
                .query("SELECT COUNT(*) FROM public.accounts", &[])
                .await
                .unwrap();
            assert_eq!(rows[0].get_named("count"), Some(&Value::Int64(2)));

            let removed = warehouse
                .execute("DELETE FROM public.accounts WHERE name = 'bob'")
                .await
                .unwrap();
            assert_eq!(removed, 1);
            assert_eq!(warehouse.row_count("public", "accounts").await, Some(1));
        });
    }

    #[test]
    fn test_rollback_restores_changed_table() {
        let warehouse = seeded();
        smol::block_on(async {
            let tx = warehouse.begin_transaction().await.unwrap();
            warehouse
                .execute_in_transaction(&tx, "TRUNCATE public.accounts")
                .await
                .unwrap();
            assert_eq!(warehouse.row_count("public", "accounts").await, Some(0));

            warehouse.rollback(tx).await.unwrap();
            assert_eq!(warehouse.row_count("public", "accounts").await, Some(2));
        });
    }

    #[test]
    fn test_rollback_leaves_other_transactions_commits() {
        let warehouse = MemoryWarehouse::new();
        smol::block_on(async {
            for name in ["x", "y"] {
                warehouse
                    .create_table("public", name, &[("id", "integer")], vec![vec![Value::Int32(1)]])
                    .await
                    .unwrap();
            }

            let a = warehouse.begin_transaction().await.unwrap();
            let b = warehouse.begin_transaction().await.unwrap();
            warehouse
                .execute_in_transaction(&b, "TRUNCATE public.y")
                .await
                .unwrap();
            warehouse.commit(b).await.unwrap();

            warehouse
                .execute_in_transaction(&a, "TRUNCATE public.x")
                .await
                .unwrap();
            warehouse.rollback(a).await.unwrap();

            assert_eq!(warehouse.row_count("public", "x").await, Some(1));
            assert_eq!(warehouse.row_count("public", "y").await, Some(0));
        });
    }

    #[test]
    fn test_rollback_of_rebuild_restores_dropped_table() {
        let warehouse = seeded();
        smol::block_on(async {
            let tx = warehouse.begin_transaction().await.unwrap();
            warehouse
                .execute_in_transaction(&tx, "DROP TABLE public.accounts CASCADE")
                .await
                .unwrap();
            warehouse
                .execute_in_transaction(&tx, "CREATE TABLE public.scratch AS SELECT * FROM public.names")
                .await
                .unwrap_err();
            warehouse.rollback(tx).await.unwrap();

            assert_eq!(warehouse.row_count("public", "accounts").await, Some(2));
            assert!(!warehouse.table_exists("public", "scratch").await);
        });
    }

    #[test]
    fn test_finished_transaction_rejected() {
        let warehouse = seeded();
        smol::block_on(async {
            let tx = warehouse.begin_transaction().await.unwrap();
            let stale = Transaction::new(tx.id);
            warehouse.commit(tx).await.unwrap();

            let result = warehouse
                .execute_in_transaction(&stale, "TRUNCATE public.accounts")
                .await;
            assert!(matches!(result, Err(TransferError::Warehouse(_))));
            assert_eq!(warehouse.row_count("public", "accounts").await, Some(2));
        });
    }

    #[test]
    fn test_create_as_projects_columns() {
        let warehouse = seeded();
        smol::block_on(async {
            warehouse
                .execute("CREATE TABLE public.names AS SELECT name AS who FROM public.accounts")
                .await
                .unwrap();

            assert_eq!(
                warehouse.columns("public", "names").await,
                Some(vec![("who".to_string(), "varchar".to_string())])
            );
            assert_eq!(warehouse.row_count("public", "names").await, Some(2));
        });
    }

    #[test]
    fn test_missing_table() {
        let warehouse = MemoryWarehouse::new();
        smol::block_on(async {
            let result = warehouse.execute("TRUNCATE fake_schema.fake_table").await;
            assert!(matches!(result, Err(TransferError::TableNotFound { .. })));
        });
    }

    #[test]
    fn test_injected_failure_is_logged() {
        let warehouse = seeded();
        smol::block_on(async {
            warehouse.fail_statements_matching("^TRUNCATE").await.unwrap();
            assert!(warehouse.execute("TRUNCATE public.accounts").await.is_err());
            assert_eq!(warehouse.statements().await, vec!["TRUNCATE public.accounts"]);

            warehouse.clear_failures().await;
            assert!(warehouse.execute("TRUNCATE public.accounts").await.is_ok());
        });
    }

    #[test]
    fn test_update_unsupported() {
        let warehouse = seeded();
        assert!(!warehouse.supports(Capability::Update));
        assert!(warehouse.supports(Capability::BulkCopy));
        smol::block_on(async {
            let result = warehouse
                .execute("UPDATE public.accounts SET name = 'x' WHERE id = 1")
                .await;
            assert!(matches!(result, Err(TransferError::UnsupportedOperation(_))));
        });
    }

    #[test]
    fn test_copy_and_unload_through_store() {
        let store = MemoryStore::new();
        let warehouse = seeded().with_store(store.clone());
        smol::block_on(async {
            store.create_bucket("example-bucket").await;
            store
                .put(
                    "example-bucket",
                    "incoming/part1.csv",
                    Bytes::from("id,name\n3,\"carol \"\"c\"\"\"\n4,\n"),
                    None,
                )
                .await
                .unwrap();

            let added = warehouse
                .execute("COPY public.accounts FROM 's3://example-bucket/incoming/' iam_role 'role' region 'us-east-1' FORMAT CSV ENCODING UTF8 IGNOREHEADER 1")
                .await
                .unwrap();
            assert_eq!(added, 2);

            let rows = warehouse.rows("public", "accounts").await.unwrap();
            assert_eq!(rows[2], vec![Value::Int32(3), Value::from("carol \"c\"")]);
            assert_eq!(rows[3], vec![Value::Int32(4), Value::Null]);

            warehouse
                .execute(r#"UNLOAD ('SELECT REPLACE(CAST(name AS text), \'"\', \'""\') AS name FROM public.accounts WHERE id = 3') TO 's3://example-bucket/out/accounts' IAM_ROLE 'role' DELIMITER AS ',' NULL AS '' ALLOWOVERWRITE ADDQUOTES PARALLEL OFF;"#)
                .await
                .unwrap();

            let object = store.get("example-bucket", "out/accounts000").await.unwrap();
            assert_eq!(object.data, Bytes::from("\"carol \"\"c\"\"\"\n"));
        });
    }

    #[test]
    fn test_copy_without_store() {
        let warehouse = seeded();
        smol::block_on(async {
            let result = warehouse
                .execute("COPY public.accounts FROM 's3://b/x' iam_role 'r' region 'us-east-1' FORMAT CSV ENCODING UTF8")
                .await;
            assert!(matches!(result, Err(TransferError::UnsupportedOperation(_))));
        });
    }

    #[test]
    fn test_catalog_queries() {
        let warehouse = seeded();
        smol::block_on(async {
            warehouse
                .set_column_comment("public", "accounts", "id", "primary key")
                .await
                .unwrap();

            let columns = warehouse
                .query(
                    "SELECT column_name FROM information_schema.columns WHERE table_name = $1 AND table_schema = $2 ORDER BY ordinal_position",
                    &[Value::from("accounts"), Value::from("public")],
                )
                .await
                .unwrap();
            assert_eq!(columns.len(), 2);

            let missing = warehouse
                .query(
                    "SELECT cols.column_name, pg_catalog.col_description(c.oid, cols.ordinal_position::int) FROM information_schema.columns cols",
                    &[Value::from("x.y"), Value::from("y"), Value::from("x")],
                )
                .await;
            assert!(matches!(missing, Err(TransferError::TableNotFound { .. })));
        });
    }
}
