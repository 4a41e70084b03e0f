//! Column metadata records.

use serde::{Deserialize, Serialize};

use crate::services::warehouse::traits::Row;

/// One column of a table with its comments, in physical column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub column_name: String,
    pub data_type: String,
    pub column_comment: Option<String>,
    pub table_comment: Option<String>,
}

impl ColumnMetadata {
    /// Build from a catalog row with `column_name`, `data_type`, `comments`
    /// and `table_comments` columns.
    pub fn from_row(row: &Row) -> Self {
        let text = |name: &str| row.get_named(name).and_then(|v| v.as_text());
        Self {
            column_name: text("column_name").unwrap_or_default(),
            data_type: text("data_type").unwrap_or_default(),
            column_comment: text("comments"),
            table_comment: text("table_comments"),
        }
    }
}
