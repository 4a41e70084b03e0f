//! Recognizer for the statement shapes the in-memory warehouse runs.
//!
//! This is not a SQL parser. It accepts exactly the statements the table
//! engine generates plus the simple `SELECT` forms tests feed to
//! `INSERT ... SELECT` and `CREATE TABLE ... AS`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TransferError};

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("statement pattern is valid")
}

static SELECT: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?is)^SELECT\s+(.+?)\s+FROM\s+([\w.]+)(?:\s+WHERE\s+(\w+)\s*=\s*(.+?))?(?:\s+LIMIT\s+(\d+))?\s*;?\s*$",
    )
});
static TRUNCATE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^TRUNCATE\s+(?:TABLE\s+)?([\w.]+)\s*;?\s*$"));
static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^DELETE\s+FROM\s+([\w.]+)(?:\s+WHERE\s+(\w+)\s*=\s*(.+?))?\s*;?\s*$")
});
static UPDATE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^UPDATE\s+"));
static INSERT_SELECT: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)^INSERT\s+INTO\s+([\w.]+)\s+(SELECT\s+.+)$"));
static DROP: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^DROP\s+TABLE\s+(IF\s+EXISTS\s+)?([\w.]+)(?:\s+CASCADE)?\s*;?\s*$")
});
static CREATE_AS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)^CREATE\s+TABLE\s+([\w.]+)\s+AS\s+(SELECT\s+.+)$"));
static COPY: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"(?is)^COPY\s+([\w.]+)\s+FROM\s+'([^']*)'\s+iam_role\s+'([^']*)'\s+region\s+'([^']*)'\s+FORMAT\s+(?:AS\s+)?CSV\s+ENCODING\s+(\w+)(?:\s+IGNOREHEADER\s+(\d+))?\s*;?\s*$",
    )
});
static UNLOAD: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?is)^UNLOAD\s*\(\s*'(.*)'\s*\)\s*TO\s+'([^']*)'\s+IAM_ROLE\s+'([^']*)'(.*)$")
});
static CATALOG: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?is)\bFROM\s+information_schema\.columns\b"));
static TEXT_CAST: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r#"(?is)^REPLACE\s*\(\s*CAST\s*\(\s*(\w+)\s+AS\s+(?:text|varchar(?:\s*\(\s*\d+\s*\))?)\s*\)\s*,\s*'"'\s*,\s*'""'\s*\)(?:\s+AS\s+(\w+))?$"#,
    )
});
static COLUMN: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^(\w+)(?:\s+AS\s+(\w+))?$"));
static COUNT: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?is)^COUNT\s*\(\s*\*\s*\)(?:\s+AS\s+(\w+))?$"));

/// A `schema.table` reference, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.to_lowercase(),
            name: name.to_lowercase(),
        }
    }

    fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new("public", qualified),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// One item of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Count { alias: String },
    Column { name: String, alias: String },
    /// `REPLACE(CAST(col AS text), '"', '""')`
    QuotedText { name: String, alias: String },
}

/// `column = literal`; a `None` literal is SQL NULL and matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub literal: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Vec<Projection>,
    pub source: TableRef,
    pub filter: Option<Filter>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Copy {
    pub table: TableRef,
    pub source_url: String,
    pub role: String,
    pub region: String,
    pub encoding: String,
    pub skip_lines: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unload {
    pub select: Select,
    pub target_url: String,
    pub role: String,
    pub parallel: bool,
}

/// A recognized statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Truncate(TableRef),
    Delete { table: TableRef, filter: Option<Filter> },
    Update,
    InsertSelect { table: TableRef, select: Select },
    Drop { table: TableRef, if_exists: bool },
    CreateAs { table: TableRef, select: Select },
    Copy(Copy),
    Unload(Unload),
    /// Column listing or column/table comment lookup.
    Catalog { with_comments: bool },
}

impl Statement {
    /// The table a statement changes, if any.
    pub fn target(&self) -> Option<&TableRef> {
        match self {
            Self::Truncate(table)
            | Self::Delete { table, .. }
            | Self::InsertSelect { table, .. }
            | Self::Drop { table, .. }
            | Self::CreateAs { table, .. } => Some(table),
            Self::Copy(copy) => Some(&copy.table),
            Self::Select(_) | Self::Update | Self::Unload(_) | Self::Catalog { .. } => None,
        }
    }

    pub fn parse(sql: &str) -> Result<Self> {
        let sql = sql.trim();

        if CATALOG.is_match(sql) {
            return Ok(Self::Catalog {
                with_comments: sql.contains("col_description"),
            });
        }
        if let Some(caps) = COPY.captures(sql) {
            return Ok(Self::Copy(Copy {
                table: TableRef::parse(&caps[1]),
                source_url: caps[2].to_string(),
                role: caps[3].to_string(),
                region: caps[4].to_string(),
                encoding: caps[5].to_uppercase(),
                skip_lines: caps
                    .get(6)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0),
            }));
        }
        if let Some(caps) = UNLOAD.captures(sql) {
            let inner = caps[1].replace("\\'", "'");
            let options = caps[4].to_uppercase();
            return Ok(Self::Unload(Unload {
                select: parse_select(&inner)?,
                target_url: caps[2].to_string(),
                role: caps[3].to_string(),
                parallel: !options.contains("PARALLEL OFF") && !options.contains("PARALLEL FALSE"),
            }));
        }
        if let Some(caps) = INSERT_SELECT.captures(sql) {
            return Ok(Self::InsertSelect {
                table: TableRef::parse(&caps[1]),
                select: parse_select(&caps[2])?,
            });
        }
        if let Some(caps) = CREATE_AS.captures(sql) {
            return Ok(Self::CreateAs {
                table: TableRef::parse(&caps[1]),
                select: parse_select(&caps[2])?,
            });
        }
        if let Some(caps) = DROP.captures(sql) {
            return Ok(Self::Drop {
                table: TableRef::parse(&caps[2]),
                if_exists: caps.get(1).is_some(),
            });
        }
        if let Some(caps) = TRUNCATE.captures(sql) {
            return Ok(Self::Truncate(TableRef::parse(&caps[1])));
        }
        if let Some(caps) = DELETE.captures(sql) {
            let filter = match (caps.get(2), caps.get(3)) {
                (Some(column), Some(literal)) => Some(Filter {
                    column: column.as_str().to_lowercase(),
                    literal: parse_literal(literal.as_str())?,
                }),
                _ => None,
            };
            return Ok(Self::Delete {
                table: TableRef::parse(&caps[1]),
                filter,
            });
        }
        if UPDATE.is_match(sql) {
            return Ok(Self::Update);
        }
        if SELECT.is_match(sql) {
            return Ok(Self::Select(parse_select(sql)?));
        }

        Err(unrecognized(sql))
    }
}

fn unrecognized(sql: &str) -> TransferError {
    TransferError::Warehouse(format!("syntax error: unrecognized statement: {}", sql))
}

pub fn parse_select(sql: &str) -> Result<Select> {
    let caps = SELECT.captures(sql.trim()).ok_or_else(|| unrecognized(sql))?;

    let projection = split_top_level(&caps[1])
        .iter()
        .map(|item| parse_projection(item))
        .collect::<Result<Vec<_>>>()?;

    let filter = match (caps.get(3), caps.get(4)) {
        (Some(column), Some(literal)) => Some(Filter {
            column: column.as_str().to_lowercase(),
            literal: parse_literal(literal.as_str())?,
        }),
        _ => None,
    };

    Ok(Select {
        projection,
        source: TableRef::parse(&caps[2]),
        filter,
        limit: caps.get(5).and_then(|m| m.as_str().parse().ok()),
    })
}

fn parse_projection(item: &str) -> Result<Projection> {
    let item = item.trim();
    if item == "*" {
        return Ok(Projection::All);
    }
    if let Some(caps) = COUNT.captures(item) {
        return Ok(Projection::Count {
            alias: caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_else(|| "count".to_string()),
        });
    }
    if let Some(caps) = TEXT_CAST.captures(item) {
        let name = caps[1].to_lowercase();
        let alias = caps
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| "replace".to_string());
        return Ok(Projection::QuotedText { name, alias });
    }
    if let Some(caps) = COLUMN.captures(item) {
        let name = caps[1].to_lowercase();
        let alias = caps
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| name.clone());
        return Ok(Projection::Column { name, alias });
    }

    Err(TransferError::Warehouse(format!(
        "unsupported select item: {}",
        item
    )))
}

/// Parse a literal to its text form.
fn parse_literal(literal: &str) -> Result<Option<String>> {
    let literal = literal.trim();
    if literal.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if let Some(inner) = literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Ok(Some(inner.replace("''", "'")));
    }
    if literal.eq_ignore_ascii_case("true") || literal.eq_ignore_ascii_case("false") {
        return Ok(Some(literal.to_lowercase()));
    }
    if literal.parse::<f64>().is_ok() {
        return Ok(Some(literal.to_string()));
    }

    Err(TransferError::Warehouse(format!(
        "unsupported literal: {}",
        literal
    )))
}

/// Split on commas outside parentheses and single-quoted strings.
fn split_top_level(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for ch in list.chars() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_of_changing_statements() {
        let accounts = TableRef::new("public", "accounts");
        for sql in [
            "TRUNCATE public.accounts",
            "DELETE FROM public.accounts",
            "DROP TABLE public.accounts CASCADE",
            "INSERT INTO public.accounts SELECT * FROM staging.accounts",
        ] {
            assert_eq!(Statement::parse(sql).unwrap().target(), Some(&accounts), "{}", sql);
        }
        assert_eq!(
            Statement::parse("SELECT COUNT(*) FROM public.accounts")
                .unwrap()
                .target(),
            None
        );
    }

    #[test]
    fn test_parse_count() {
        let statement = Statement::parse("SELECT COUNT(*) FROM public.accounts").unwrap();
        let Statement::Select(select) = statement else {
            panic!("expected select");
        };
        assert_eq!(select.source, TableRef::new("public", "accounts"));
        assert_eq!(
            select.projection,
            vec![Projection::Count {
                alias: "count".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_select_with_filter_and_limit() {
        let select = parse_select("SELECT id, name AS who FROM s.t WHERE name = 'O''Brien' LIMIT 5").unwrap();
        assert_eq!(select.projection.len(), 2);
        assert_eq!(
            select.projection[1],
            Projection::Column {
                name: "name".to_string(),
                alias: "who".to_string()
            }
        );
        assert_eq!(
            select.filter,
            Some(Filter {
                column: "name".to_string(),
                literal: Some("O'Brien".to_string())
            })
        );
        assert_eq!(select.limit, Some(5));
    }

    #[test]
    fn test_parse_copy() {
        let sql = "COPY public.accounts FROM 's3://example-bucket/public/accounts' iam_role 'arn:aws:iam::1:role/r' region 'us-east-1' FORMAT CSV ENCODING UTF8 IGNOREHEADER 1";
        let Statement::Copy(copy) = Statement::parse(sql).unwrap() else {
            panic!("expected copy");
        };
        assert_eq!(copy.table.qualified(), "public.accounts");
        assert_eq!(copy.source_url, "s3://example-bucket/public/accounts");
        assert_eq!(copy.region, "us-east-1");
        assert_eq!(copy.encoding, "UTF8");
        assert_eq!(copy.skip_lines, 1);
    }

    #[test]
    fn test_parse_unload() {
        let sql = r#"UNLOAD ('SELECT REPLACE(CAST(id AS text), \'"\', \'""\') AS id, REPLACE(CAST(name AS text), \'"\', \'""\') AS name FROM public.accounts') TO 's3://b/public/accounts/2024-01-02_accounts' IAM_ROLE 'role' DELIMITER AS ',' NULL AS '' ALLOWOVERWRITE ADDQUOTES PARALLEL OFF;"#;
        let Statement::Unload(unload) = Statement::parse(sql).unwrap() else {
            panic!("expected unload");
        };
        assert!(!unload.parallel);
        assert_eq!(unload.target_url, "s3://b/public/accounts/2024-01-02_accounts");
        assert_eq!(
            unload.select.projection,
            vec![
                Projection::QuotedText {
                    name: "id".to_string(),
                    alias: "id".to_string()
                },
                Projection::QuotedText {
                    name: "name".to_string(),
                    alias: "name".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_ddl_and_dml() {
        assert_eq!(
            Statement::parse("TRUNCATE public.t").unwrap(),
            Statement::Truncate(TableRef::new("public", "t"))
        );
        assert_eq!(
            Statement::parse("DROP TABLE public.t CASCADE").unwrap(),
            Statement::Drop {
                table: TableRef::new("public", "t"),
                if_exists: false
            }
        );
        assert!(matches!(
            Statement::parse("DELETE FROM public.t WHERE id = 3").unwrap(),
            Statement::Delete { filter: Some(_), .. }
        ));
        assert!(matches!(
            Statement::parse("INSERT INTO public.t SELECT * FROM public.src").unwrap(),
            Statement::InsertSelect { .. }
        ));
        assert!(matches!(
            Statement::parse("CREATE TABLE public.t AS SELECT id FROM public.src").unwrap(),
            Statement::CreateAs { .. }
        ));
        assert_eq!(
            Statement::parse("UPDATE public.t SET a = 1").unwrap(),
            Statement::Update
        );
    }

    #[test]
    fn test_parse_catalog() {
        let sql = "SELECT column_name FROM information_schema.columns WHERE table_name = $1 AND table_schema = $2 ORDER BY ordinal_position";
        assert_eq!(
            Statement::parse(sql).unwrap(),
            Statement::Catalog { with_comments: false }
        );
    }

    #[test]
    fn test_unrecognized_statement() {
        assert!(matches!(
            Statement::parse("VACUUM public.t"),
            Err(TransferError::Warehouse(_))
        ));
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level(r#"REPLACE(CAST(a AS text), '"', '""') AS a, b"#),
            vec![r#"REPLACE(CAST(a AS text), '"', '""') AS a"#.to_string(), "b".to_string()]
        );
    }
}
