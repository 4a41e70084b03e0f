//! SQL text generated for a table.
//!
//! Every builder takes the already qualified `schema.table` name.

use crate::services::warehouse::traits::{quote_literal, Value};

/// Column names of a table in physical order. `$1` table, `$2` schema.
pub const COLUMNS_QUERY: &str = "SELECT column_name FROM information_schema.columns \
     WHERE table_name = $1 AND table_schema = $2 \
     ORDER BY ordinal_position";

/// Columns with their column and table comments. `$1` schema.table, `$2`
/// table, `$3` schema.
pub const METADATA_QUERY: &str = "SELECT cols.column_name, cols.data_type, \
     pg_catalog.col_description(c.oid, cols.ordinal_position::int) AS comments, \
     pg_catalog.obj_description($1::regclass, 'pg_class') AS table_comments \
     FROM information_schema.columns cols \
     JOIN pg_catalog.pg_class c ON cols.table_name = c.relname \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace AND n.nspname = cols.table_schema \
     WHERE cols.table_name = $2 AND cols.table_schema = $3 \
     ORDER BY cols.ordinal_position::int";

pub fn count(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

pub fn truncate(table: &str) -> String {
    format!("TRUNCATE {}", table)
}

pub fn delete_all(table: &str) -> String {
    format!("DELETE FROM {}", table)
}

pub fn delete_where(table: &str, column: &str, value: &Value) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        table,
        column,
        value.to_sql_literal()
    )
}

pub fn update_where(
    table: &str,
    column: &str,
    value: &Value,
    filter_column: &str,
    filter_value: &Value,
) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} = {}",
        table,
        column,
        value.to_sql_literal(),
        filter_column,
        filter_value.to_sql_literal()
    )
}

pub fn insert_select(table: &str, select: &str) -> String {
    format!("INSERT INTO {} {}", table, trim_statement(select))
}

pub fn drop_cascade(table: &str) -> String {
    format!("DROP TABLE {} CASCADE", table)
}

pub fn create_as(table: &str, select: &str) -> String {
    format!("CREATE TABLE {} AS {}", table, trim_statement(select))
}

pub fn fetch_rows(table: &str, limit: usize) -> String {
    format!("SELECT * FROM {} LIMIT {}", table, limit)
}

/// `COPY` every object under `source_url` into the table as CSV.
pub fn copy_from(
    table: &str,
    source_url: &str,
    role: &str,
    region: &str,
    encoding: &str,
    skip_header: bool,
) -> String {
    let mut sql = format!(
        "COPY {} FROM {} iam_role {} region {} FORMAT CSV ENCODING {}",
        table,
        quote_literal(source_url),
        quote_literal(role),
        quote_literal(region),
        encoding
    );
    if skip_header {
        sql.push_str(" IGNOREHEADER 1");
    }
    sql
}

/// A select casting every column to text with embedded `"` doubled.
///
/// Quotes are backslash-escaped because the result is embedded in the
/// quoted argument of `UNLOAD`.
pub fn escaped_select(table: &str, columns: &[String]) -> String {
    let items = columns
        .iter()
        .map(|column| {
            format!(
                r#"REPLACE(CAST({col} AS text), \'"\', \'""\') AS {col}"#,
                col = column
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", items, table)
}

/// Single-file, fully quoted CSV unload of `escaped_select` to `target_url`.
pub fn unload_to(escaped_select: &str, target_url: &str, role: &str) -> String {
    format!(
        "UNLOAD ('{}') TO {} IAM_ROLE {} DELIMITER AS ',' NULL AS '' ALLOWOVERWRITE ADDQUOTES PARALLEL OFF;",
        escaped_select,
        quote_literal(target_url),
        quote_literal(role)
    )
}

fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_with_header() {
        assert_eq!(
            copy_from(
                "public.accounts",
                "s3://example-bucket/public/accounts",
                "arn:aws:iam::123:role/loader",
                "us-east-1",
                "UTF8",
                true,
            ),
            "COPY public.accounts FROM 's3://example-bucket/public/accounts' \
             iam_role 'arn:aws:iam::123:role/loader' region 'us-east-1' \
             FORMAT CSV ENCODING UTF8 IGNOREHEADER 1"
        );
    }

    #[test]
    fn test_copy_from_without_header() {
        let sql = copy_from("s.t", "s3://b", "role", "eu-west-1", "UTF16", false);
        assert!(sql.ends_with("ENCODING UTF16"));
    }

    #[test]
    fn test_escaped_select() {
        assert_eq!(
            escaped_select("s.t", &["id".to_string(), "name".to_string()]),
            r#"SELECT REPLACE(CAST(id AS text), \'"\', \'""\') AS id, REPLACE(CAST(name AS text), \'"\', \'""\') AS name FROM s.t"#
        );
    }

    #[test]
    fn test_unload_to() {
        let sql = unload_to("SELECT 1 FROM s.t", "s3://b/s/t/2024-01-02_t", "role");
        assert_eq!(
            sql,
            "UNLOAD ('SELECT 1 FROM s.t') TO 's3://b/s/t/2024-01-02_t' IAM_ROLE 'role' \
             DELIMITER AS ',' NULL AS '' ALLOWOVERWRITE ADDQUOTES PARALLEL OFF;"
        );
    }

    #[test]
    fn test_literals_are_escaped() {
        assert_eq!(
            delete_where("s.t", "name", &Value::from("O'Brien")),
            "DELETE FROM s.t WHERE name = 'O''Brien'"
        );
        assert_eq!(
            update_where("s.t", "flag", &Value::Bool(true), "id", &Value::Int64(3)),
            "UPDATE s.t SET flag = true WHERE id = 3"
        );
    }

    #[test]
    fn test_select_is_trimmed() {
        assert_eq!(
            insert_select("s.t", " SELECT * FROM s.src; "),
            "INSERT INTO s.t SELECT * FROM s.src"
        );
        assert_eq!(
            create_as("s.t", "SELECT id FROM s.src"),
            "CREATE TABLE s.t AS SELECT id FROM s.src"
        );
    }
}
