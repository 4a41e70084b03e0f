//! Warehouse-agnostic row and value types.
//!
//! This module contains:
//! - `Value` - A unified value type that can represent any warehouse value
//! - `Cell` - A cell in a query result row
//! - `Row` - A row of cells from a query result
//! - `ColumnInfo` - Metadata about a column in a result set

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unified value type for warehouse results and statement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// NULL value
    #[default]
    Null,

    /// Boolean value (true/false)
    Bool(bool),

    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),

    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),

    /// Text/string value
    Text(String),
    /// Binary data
    Bytes(Vec<u8>),

    /// Date without time
    Date(NaiveDate),
    /// Time without date
    Time(NaiveTime),
    /// Date and time without timezone
    DateTime(NaiveDateTime),
    /// Date and time with timezone (stored as UTC)
    DateTimeTz(DateTime<Utc>),

    /// Decimal/numeric with arbitrary precision
    Decimal(Decimal),
    /// UUID
    Uuid(Uuid),
    /// JSON value
    Json(serde_json::Value),

    /// Warehouse-specific type that doesn't map to a standard type.
    Other {
        /// The warehouse-specific type name
        type_name: String,
        /// String representation for display
        display: String,
    },
}

impl Value {
    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name for display purposes
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetimetz",
            Value::Decimal(_) => "decimal",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::Other { .. } => "other",
        }
    }

    /// Text form of the value as the warehouse would CAST it to text.
    ///
    /// Returns `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Value::Null => return None,
            Value::Bool(b) => b.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Float32(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("\\x{}", hex::encode(b)),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Value::DateTimeTz(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Uuid(u) => u.to_string(),
            Value::Json(j) => j.to_string(),
            Value::Other { display, .. } => display.clone(),
        };
        Some(text)
    }

    /// Convert this value to a display string
    pub fn to_display_string(&self) -> String {
        self.as_text().unwrap_or_else(|| "NULL".to_string())
    }

    /// Render the value as a SQL literal, quoting and escaping text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(_)
            | Value::Int16(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Decimal(_) => self.to_display_string(),
            other => quote_literal(&other.to_display_string()),
        }
    }

    /// Try to extract as an i64 (will convert smaller integers and decimals)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Decimal(d) => d.to_string().parse().ok(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to extract as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Quote a string as a SQL literal, doubling embedded single quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Metadata about a column in a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Warehouse-specific type name
    pub type_name: String,
    /// Column position (0-indexed)
    pub ordinal: usize,
}

impl ColumnInfo {
    /// Create a new column info
    pub fn new(name: String, type_name: String, ordinal: usize) -> Self {
        Self {
            name,
            type_name,
            ordinal,
        }
    }
}

/// A cell in a query result row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    /// The value of this cell
    pub value: Value,
    /// The column index (0-indexed)
    pub column_index: usize,
}

impl Cell {
    /// Create a new cell
    pub fn new(value: Value, column_index: usize) -> Self {
        Self {
            value,
            column_index,
        }
    }

    /// Check if this cell is NULL
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// A row of cells from a query result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Column metadata, shared by every row of one result
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    /// The cells in this row
    pub cells: Vec<Cell>,
}

impl Row {
    /// Create a new row from column metadata and cells
    pub fn new(columns: Vec<ColumnInfo>, cells: Vec<Cell>) -> Self {
        Self { columns, cells }
    }

    /// Create a row from values (auto-assigns column indices, no names)
    pub fn from_values(values: Vec<Value>) -> Self {
        let cells = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| Cell::new(value, idx))
            .collect();
        Self {
            columns: Vec::new(),
            cells,
        }
    }

    /// Create a row from `(column name, value)` pairs
    pub fn from_named(pairs: Vec<(String, Value)>) -> Self {
        let (columns, cells) = pairs
            .into_iter()
            .enumerate()
            .map(|(idx, (name, value))| {
                let column = ColumnInfo::new(name, value.type_name().to_string(), idx);
                (column, Cell::new(value, idx))
            })
            .unzip();
        Self { columns, cells }
    }

    /// Get the number of cells in this row
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if this row is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get a value by index
    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.cells.get(index).map(|c| &c.value)
    }

    /// Get a value by column name
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| self.get_value(c.ordinal))
    }

    /// Iterate over values
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().map(|c| &c.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_null_check() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());
        assert!(!Value::Text("hello".to_string()).is_null());
    }

    #[test]
    fn test_value_display_string() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(false).to_display_string(), "false");
        assert_eq!(Value::Int64(-123).to_display_string(), "-123");
        assert_eq!(Value::Float64(3.5).to_display_string(), "3.5");
        assert_eq!(Value::Bytes(vec![0xDE, 0xAD]).to_display_string(), "\\xdead");
    }

    #[test]
    fn test_value_as_text_null_is_none() {
        assert_eq!(Value::Null.as_text(), None);
        assert_eq!(Value::Int32(7).as_text().as_deref(), Some("7"));
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(Value::from("O'Brien").to_sql_literal(), "'O''Brien'");
        assert_eq!(Value::Int64(5).to_sql_literal(), "5");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(Value::Int16(3).as_i64(), Some(3));
        assert_eq!(Value::Text(" 42 ".to_string()).as_i64(), Some(42));
        assert_eq!(Value::Bool(true).as_i64(), None);
    }

    #[test]
    fn test_value_from_option() {
        let some_val: Value = Some(42i32).into();
        assert_eq!(some_val, Value::Int32(42));

        let none_val: Value = Option::<i32>::None.into();
        assert_eq!(none_val, Value::Null);
    }

    #[test]
    fn test_row_named_lookup() {
        let row = Row::from_named(vec![
            ("column_name".to_string(), Value::from("id")),
            ("data_type".to_string(), Value::from("integer")),
        ]);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get_named("data_type"), Some(&Value::from("integer")));
        assert_eq!(row.get_named("missing"), None);
        assert_eq!(row.get_value(0), Some(&Value::from("id")));
    }
}
