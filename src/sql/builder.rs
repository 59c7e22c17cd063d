//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from an entity descriptor.

use crate::model::{EntityDef, ListQuery, MatchMode, Row, ID_COLUMN};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from descriptors).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// SELECT list: each column as-is, except numeric as col::text so the JSON value keeps full precision.
fn select_column_list(entity: &EntityDef) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(c.name);
            if c.pg_type == "numeric" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholder(n: u32, pg_type: &str) -> String {
    format!("${}::{}", n, pg_type)
}

/// SELECT by primary key.
pub fn select_by_id(entity: &EntityDef, schema: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        qualified_table(schema, entity.table),
        quoted(ID_COLUMN),
        placeholder(n, "bigint")
    );
    q
}

/// SELECT list with the request's filters (case-insensitive), ordered by the entity's sort column then id.
pub fn select_list(entity: &EntityDef, schema: &str, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for cond in &query.conditions {
        let cols: Vec<&str> = cond.columns.iter().copied().filter(|c| entity.has_column(c)).collect();
        if cols.is_empty() {
            continue;
        }
        let n = q.push_param(Value::String(cond.value.clone()));
        let ph = placeholder(n, "text");
        let parts: Vec<String> = cols
            .iter()
            .map(|c| match cond.mode {
                MatchMode::Exact => format!("lower({}) = lower({})", quoted(c), ph),
                MatchMode::Contains => format!("strpos(lower({}), lower({})) > 0", quoted(c), ph),
            })
            .collect();
        where_parts.push(format!("({})", parts.join(" OR ")));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY lower({}), {}",
        select_column_list(entity),
        qualified_table(schema, entity.table),
        where_clause,
        quoted(entity.order_by),
        quoted(ID_COLUMN)
    );
    q
}

/// SELECT the first row whose `column` equals `value` ignoring case, optionally skipping one id.
pub fn select_by_column_ci(
    entity: &EntityDef,
    schema: &str,
    column: &str,
    value: &str,
    exclude_id: Option<i64>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::String(value.to_string()));
    let mut sql = format!(
        "SELECT {} FROM {} WHERE lower({}) = lower({})",
        select_column_list(entity),
        qualified_table(schema, entity.table),
        quoted(column),
        placeholder(n, "text")
    );
    if let Some(id) = exclude_id {
        let n = q.push_param(Value::from(id));
        sql.push_str(&format!(" AND {} <> {}", quoted(ID_COLUMN), placeholder(n, "bigint")));
    }
    sql.push_str(&format!(" ORDER BY {} LIMIT 1", quoted(ID_COLUMN)));
    q.sql = sql;
    q
}

/// INSERT every writable column (missing values bind as NULL). Read-only columns are left to DB defaults.
pub fn insert(entity: &EntityDef, schema: &str, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in entity.columns.iter().filter(|c| !c.read_only) {
        let n = q.push_param(row.get(c.name).cloned().unwrap_or(Value::Null));
        cols.push(quoted(c.name));
        placeholders.push(placeholder(n, c.pg_type));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        qualified_table(schema, entity.table),
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE by id: SET the writable columns present in `row`. With nothing to set, re-reads the row.
pub fn update(entity: &EntityDef, schema: &str, id: i64, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in entity.columns.iter().filter(|c| !c.read_only) {
        let Some(v) = row.get(c.name) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(c.name), placeholder(n, c.pg_type)));
    }
    if sets.is_empty() {
        return select_by_id(entity, schema, id);
    }
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(schema, entity.table),
        sets.join(", "),
        quoted(ID_COLUMN),
        placeholder(n, "bigint"),
        select_column_list(entity)
    );
    q
}

/// DELETE by id, returning the id when a row went away.
pub fn delete(entity: &EntityDef, schema: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(schema, entity.table),
        quoted(ID_COLUMN),
        placeholder(n, "bigint"),
        quoted(ID_COLUMN)
    );
    q
}
