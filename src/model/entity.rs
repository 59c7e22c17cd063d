//! Entity descriptors: table, columns, uniqueness and list filters for the reference resources.
//! The SQL builder, both stores and the generic handlers are driven by these.

use crate::case::{object_keys_to_camel_case, object_keys_to_snake_case};
use crate::error::AppError;
use crate::service::validation::{Format, ValidationRule, MONEY_INTEGER_DIGITS};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// A stored row: snake_case column name -> JSON value.
pub type Row = Map<String, Value>;

/// Primary key column shared by every reference entity.
pub const ID_COLUMN: &str = "id";

/// Default filled in when an insert omits the column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnDefault {
    Now,
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    /// PostgreSQL type name for SQL casts (e.g. "numeric", "timestamptz").
    pub pg_type: &'static str,
    /// Server-managed: never taken from a request body.
    pub read_only: bool,
    pub default: Option<ColumnDefault>,
    pub rule: ValidationRule,
}

impl ColumnDef {
    pub const fn id() -> Self {
        ColumnDef { name: ID_COLUMN, pg_type: "bigint", read_only: true, default: None, rule: ValidationRule::NONE }
    }

    pub const fn text(name: &'static str) -> Self {
        ColumnDef { name, pg_type: "text", read_only: false, default: None, rule: ValidationRule::NONE }
    }

    /// NUMERIC(18,2).
    pub const fn numeric(name: &'static str) -> Self {
        ColumnDef {
            name,
            pg_type: "numeric",
            read_only: false,
            default: None,
            rule: ValidationRule { integer_digits: Some(MONEY_INTEGER_DIGITS), ..ValidationRule::NONE },
        }
    }

    pub const fn created_at(name: &'static str) -> Self {
        ColumnDef {
            name,
            pg_type: "timestamptz",
            read_only: true,
            default: Some(ColumnDefault::Now),
            rule: ValidationRule::NONE,
        }
    }

    pub const fn required(mut self) -> Self {
        self.rule.required = true;
        self
    }

    pub const fn max(mut self, len: usize) -> Self {
        self.rule.max_length = Some(len);
        self
    }

    pub const fn pattern(mut self, regex: &'static str, message: &'static str) -> Self {
        self.rule.pattern = Some((regex, message));
        self
    }

    pub const fn email(mut self) -> Self {
        self.rule.format = Some(Format::Email);
        self
    }
}

/// Case-insensitive uniqueness on one column, checked before insert/update.
#[derive(Clone, Copy, Debug)]
pub struct UniqueDef {
    pub column: &'static str,
    /// API field name reported in the duplicate error.
    pub field: &'static str,
    /// Human label used in messages, e.g. "code".
    pub label: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-insensitive equality.
    Exact,
    /// Case-insensitive substring on any of the columns.
    Contains,
}

/// Query-string filter accepted by a list endpoint.
#[derive(Clone, Copy, Debug)]
pub struct FilterDef {
    pub param: &'static str,
    pub columns: &'static [&'static str],
    pub mode: MatchMode,
}

#[derive(Debug)]
pub struct EntityDef {
    /// Singular label for messages ("Customer").
    pub label: &'static str,
    pub table: &'static str,
    /// Route path, e.g. "/api/Customer".
    pub path: &'static str,
    pub columns: &'static [ColumnDef],
    pub unique: Option<UniqueDef>,
    pub filters: &'static [FilterDef],
    pub order_by: &'static str,
    /// Sales orders link to rows of this entity by `party_id`.
    pub referenced_by_sales_orders: bool,
}

impl EntityDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// One filter instance of a list request.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub columns: &'static [&'static str],
    pub mode: MatchMode,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub conditions: Vec<Condition>,
}

impl ListQuery {
    /// Pick the entity's filters out of raw query params. Param names match case-insensitively; blank values are ignored.
    pub fn from_params<'a, I>(entity: &EntityDef, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut conditions = Vec::new();
        for (k, v) in params {
            let value = v.trim();
            if value.is_empty() {
                continue;
            }
            if let Some(f) = entity.filters.iter().find(|f| f.param.eq_ignore_ascii_case(k)) {
                conditions.push(Condition {
                    columns: f.columns,
                    mode: f.mode,
                    value: value.to_string(),
                });
            }
        }
        ListQuery { conditions }
    }
}

/// Serialize a typed resource into a writable row: snake_case keys, only writable columns, no id.
pub fn to_row<R: Serialize>(entity: &EntityDef, value: &R) -> Result<Row, AppError> {
    let Value::Object(mut obj) = serde_json::to_value(value)? else {
        return Err(AppError::Internal(format!("{} did not serialize to an object", entity.label)));
    };
    object_keys_to_snake_case(&mut obj);
    obj.retain(|k, _| {
        entity
            .column(k)
            .map(|c| !c.read_only)
            .unwrap_or(false)
    });
    Ok(obj)
}

/// Deserialize a stored row back into the typed resource.
pub fn from_row<R: DeserializeOwned>(mut row: Row) -> Result<R, AppError> {
    object_keys_to_camel_case(&mut row);
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Read a row's id.
pub fn row_id(row: &Row) -> Option<i64> {
    row.get(ID_COLUMN).and_then(Value::as_i64)
}
