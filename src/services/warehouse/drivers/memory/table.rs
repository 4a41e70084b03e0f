//! Table storage and value coercion for the in-memory warehouse.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::{Result, TransferError};
use crate::services::warehouse::traits::Value;

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryColumn {
    pub name: String,
    pub data_type: String,
    pub comment: Option<String>,
}

impl MemoryColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            data_type: data_type.into().to_lowercase(),
            comment: None,
        }
    }
}

/// A table: ordered columns, rows in insertion order and an optional comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub columns: Vec<MemoryColumn>,
    pub rows: Vec<Vec<Value>>,
    pub comment: Option<String>,
}

impl MemoryTable {
    pub fn new(columns: Vec<MemoryColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            comment: None,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.columns.iter().position(|c| c.name == name)
    }

    /// Coerce `values` to this table's column types and append them.
    pub fn append(&mut self, rows: Vec<Vec<Value>>) -> Result<usize> {
        let coerced = rows
            .into_iter()
            .map(|row| self.coerce_row(row))
            .collect::<Result<Vec<_>>>()?;
        let count = coerced.len();
        self.rows.extend(coerced);
        Ok(count)
    }

    /// Coerce one row; the arity must match the column count.
    pub fn coerce_row(&self, row: Vec<Value>) -> Result<Vec<Value>> {
        if row.len() != self.columns.len() {
            return Err(TransferError::Warehouse(format!(
                "row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }

        row.into_iter()
            .zip(&self.columns)
            .map(|(value, column)| match value.as_text() {
                None => Ok(Value::Null),
                Some(text) => coerce(&text, &column.data_type),
            })
            .collect()
    }
}

/// Convert loaded text to a value of `data_type`.
///
/// An empty field loads as NULL, matching the unloader's `NULL AS ''`.
pub fn coerce(text: &str, data_type: &str) -> Result<Value> {
    if text.is_empty() {
        return Ok(Value::Null);
    }

    let invalid = |kind: &str| {
        TransferError::Warehouse(format!("Invalid {} value: '{}'", kind, text))
    };
    let data_type = data_type.to_lowercase();
    let trimmed = text.trim();

    let value = if data_type == "smallint" || data_type == "int2" {
        Value::Int16(trimmed.parse().map_err(|_| invalid("smallint"))?)
    } else if data_type == "integer" || data_type == "int" || data_type == "int4" {
        Value::Int32(trimmed.parse().map_err(|_| invalid("integer"))?)
    } else if data_type == "bigint" || data_type == "int8" {
        Value::Int64(trimmed.parse().map_err(|_| invalid("bigint"))?)
    } else if data_type.starts_with("numeric") || data_type.starts_with("decimal") {
        Value::Decimal(trimmed.parse::<Decimal>().map_err(|_| invalid("numeric"))?)
    } else if data_type == "real" || data_type == "float4" {
        Value::Float32(trimmed.parse().map_err(|_| invalid("real"))?)
    } else if data_type.starts_with("double") || data_type == "float8" || data_type == "float" {
        Value::Float64(trimmed.parse().map_err(|_| invalid("double precision"))?)
    } else if data_type.starts_with("bool") {
        match trimmed.to_lowercase().as_str() {
            "t" | "true" | "1" | "y" | "yes" => Value::Bool(true),
            "f" | "false" | "0" | "n" | "no" => Value::Bool(false),
            _ => return Err(invalid("boolean")),
        }
    } else if data_type == "date" {
        Value::Date(
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid("date"))?,
        )
    } else if data_type.starts_with("timestamp") {
        Value::DateTime(
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|_| invalid("timestamp"))?,
        )
    } else {
        Value::Text(text.to_string())
    };

    Ok(value)
}
