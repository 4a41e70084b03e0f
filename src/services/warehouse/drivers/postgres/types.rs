//! PostgreSQL type conversion utilities.
//!
//! This module handles conversion between PostgreSQL-specific types (from SQLx)
//! and the generic `Value` type, in both directions, and translates the
//! SQLSTATE codes the loader cares about.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgColumn, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::error::TransferError;
use crate::services::warehouse::traits::{Cell, ColumnInfo, Row as TraitRow, SslMode, Value};

/// SQLSTATE for a relation that does not exist.
const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE for a schema that does not exist.
const INVALID_SCHEMA_NAME: &str = "3F000";

/// Converter for PostgreSQL values to the unified `Value` type.
pub struct PgValueConverter;

impl PgValueConverter {
    /// Convert a PostgreSQL row to a trait Row.
    pub fn convert_row(pg_row: &PgRow, columns: &[ColumnInfo]) -> TraitRow {
        let cells = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let value = Self::extract_value(pg_row, col, idx);
                Cell::new(value, idx)
            })
            .collect();

        TraitRow::new(columns.to_vec(), cells)
    }

    /// Build column info from a PostgreSQL row.
    pub fn build_column_info(pg_row: &PgRow) -> Vec<ColumnInfo> {
        pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                ColumnInfo::new(
                    col.name().to_string(),
                    col.type_info().name().to_string(),
                    idx,
                )
            })
            .collect()
    }

    /// Convert a whole result set, sharing one column list.
    pub fn convert_rows(pg_rows: &[PgRow]) -> Vec<TraitRow> {
        let Some(first) = pg_rows.first() else {
            return Vec::new();
        };
        let columns = Self::build_column_info(first);
        pg_rows
            .iter()
            .map(|row| Self::convert_row(row, &columns))
            .collect()
    }

    /// Extract a value from a PostgreSQL row at the given column index.
    fn extract_value(row: &PgRow, column: &PgColumn, index: usize) -> Value {
        // Check for NULL first
        match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => return Value::Null,
            Err(_) => return Value::Null,
            _ => {}
        }

        let type_name = column.type_info().name();
        Self::decode_by_type(row, index, type_name)
    }

    /// Decode a value based on its PostgreSQL type name.
    fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Value {
        match type_name {
            "BOOL" => row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null),

            "INT2" | "SMALLINT" => row
                .try_get::<i16, _>(index)
                .map(Value::Int16)
                .unwrap_or(Value::Null),

            "INT4" | "INT" | "INTEGER" => row
                .try_get::<i32, _>(index)
                .map(Value::Int32)
                .unwrap_or(Value::Null),

            "INT8" | "BIGINT" => row
                .try_get::<i64, _>(index)
                .map(Value::Int64)
                .unwrap_or(Value::Null),

            "FLOAT4" | "REAL" => row
                .try_get::<f32, _>(index)
                .map(Value::Float32)
                .unwrap_or(Value::Null),

            "FLOAT8" | "DOUBLE PRECISION" => row
                .try_get::<f64, _>(index)
                .map(Value::Float64)
                .unwrap_or(Value::Null),

            "NUMERIC" | "DECIMAL" => row
                .try_get::<Decimal, _>(index)
                .map(Value::Decimal)
                .unwrap_or(Value::Null),

            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),

            "BYTEA" => row
                .try_get::<Vec<u8>, _>(index)
                .map(Value::Bytes)
                .unwrap_or(Value::Null),

            "DATE" => row
                .try_get::<NaiveDate, _>(index)
                .map(Value::Date)
                .unwrap_or(Value::Null),

            "TIME" => row
                .try_get::<NaiveTime, _>(index)
                .map(Value::Time)
                .unwrap_or(Value::Null),

            "TIMESTAMP" => row
                .try_get::<NaiveDateTime, _>(index)
                .map(Value::DateTime)
                .unwrap_or(Value::Null),

            "TIMESTAMPTZ" => row
                .try_get::<DateTime<Utc>, _>(index)
                .map(Value::DateTimeTz)
                .unwrap_or(Value::Null),

            "UUID" => row
                .try_get::<Uuid, _>(index)
                .map(Value::Uuid)
                .unwrap_or(Value::Null),

            "JSON" | "JSONB" => row
                .try_get::<serde_json::Value, _>(index)
                .map(Value::Json)
                .unwrap_or(Value::Null),

            _ => Self::decode_as_string_fallback(row, index, type_name),
        }
    }

    /// Fallback: try to decode as string representation for unknown types.
    fn decode_as_string_fallback(row: &PgRow, index: usize, type_name: &str) -> Value {
        let display = row
            .try_get::<String, _>(index)
            .or_else(|_| row.try_get::<i64, _>(index).map(|v| v.to_string()))
            .unwrap_or_else(|_| "<unknown>".to_string());

        Value::Other {
            type_name: type_name.to_string(),
            display,
        }
    }

    /// Bind a `Value` as the next positional parameter.
    pub fn bind<'q>(
        query: Query<'q, Postgres, PgArguments>,
        value: &Value,
    ) -> Query<'q, Postgres, PgArguments> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int16(v) => query.bind(*v),
            Value::Int32(v) => query.bind(*v),
            Value::Int64(v) => query.bind(*v),
            Value::Float32(v) => query.bind(*v),
            Value::Float64(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Bytes(v) => query.bind(v.clone()),
            Value::Date(v) => query.bind(*v),
            Value::Time(v) => query.bind(*v),
            Value::DateTime(v) => query.bind(*v),
            Value::DateTimeTz(v) => query.bind(*v),
            Value::Decimal(v) => query.bind(*v),
            Value::Uuid(v) => query.bind(*v),
            Value::Json(v) => query.bind(v.clone()),
            Value::Other { display, .. } => query.bind(display.clone()),
        }
    }

    /// Map the trait SSL mode to the SQLx one.
    pub fn map_ssl_mode(mode: &SslMode) -> PgSslMode {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }

    /// Translate catalog errors; everything else passes through untouched.
    pub fn map_error(err: sqlx::Error) -> TransferError {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some(UNDEFINED_TABLE) => {
                let relation = missing_relation(&err.to_string()).unwrap_or_default();
                let (schema, table) = match relation.split_once('.') {
                    Some((schema, table)) => (schema.to_string(), table.to_string()),
                    None => (String::new(), relation),
                };
                TransferError::TableNotFound { schema, table }
            }
            Some(INVALID_SCHEMA_NAME) => TransferError::Schema(err.to_string()),
            _ => TransferError::Sqlx(err),
        }
    }
}

/// Relation name out of `relation "x.y" does not exist`.
fn missing_relation(message: &str) -> Option<String> {
    let start = message.find("relation \"")? + "relation \"".len();
    let rest = &message[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(
            PgValueConverter::map_ssl_mode(&SslMode::Disable),
            PgSslMode::Disable
        ));
        assert!(matches!(
            PgValueConverter::map_ssl_mode(&SslMode::Prefer),
            PgSslMode::Prefer
        ));
        assert!(matches!(
            PgValueConverter::map_ssl_mode(&SslMode::VerifyFull),
            PgSslMode::VerifyFull
        ));
    }

    #[test]
    fn test_missing_relation() {
        assert_eq!(
            missing_relation("error returned from database: relation \"fake_schema.fake_table\" does not exist"),
            Some("fake_schema.fake_table".to_string())
        );
        assert_eq!(missing_relation("syntax error at or near \"FROM\""), None);
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = PgValueConverter::map_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, TransferError::Sqlx(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_convert_rows_empty() {
        assert!(PgValueConverter::convert_rows(&[]).is_empty());
    }
}
