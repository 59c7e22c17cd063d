//! In-process store behind one mutex. Mirrors the PostgreSQL constraints that the service relies on:
//! case-insensitive uniqueness, the customer reference from sales orders, and number trackers.

use super::{OrderStore, ReferenceStore};
use crate::error::AppError;
use crate::model::{
    row_id, Attachment, ColumnDefault, EntityDef, ListQuery, MatchMode, Order, OrderChanges, OrderDraft, OrderFilter,
    OrderKind, Row, ID_COLUMN,
};
use crate::numbering::{next_number, DocumentType};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    rows: HashMap<&'static str, BTreeMap<i64, Row>>,
    last_ids: HashMap<&'static str, i64>,
    /// Insertion order is creation order.
    orders: HashMap<OrderKind, Vec<Order>>,
    trackers: HashMap<DocumentType, i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) => Some(s.to_lowercase()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn matches_query(row: &Row, query: &ListQuery) -> bool {
    query.conditions.iter().all(|cond| {
        let needle = cond.value.to_lowercase();
        cond.columns.iter().any(|c| match (text(row.get(*c)), cond.mode) {
            (Some(v), MatchMode::Exact) => v == needle,
            (Some(v), MatchMode::Contains) => v.contains(&needle),
            (None, _) => false,
        })
    })
}

fn find_ci<'a>(
    rows: &'a BTreeMap<i64, Row>,
    column: &str,
    value: &str,
    exclude_id: Option<i64>,
) -> Option<&'a Row> {
    let needle = value.to_lowercase();
    rows.iter()
        .filter(|(id, _)| Some(**id) != exclude_id)
        .map(|(_, row)| row)
        .find(|row| text(row.get(column)).as_deref() == Some(needle.as_str()))
}

fn check_unique(entity: &EntityDef, rows: &BTreeMap<i64, Row>, row: &Row, exclude_id: Option<i64>) -> Result<(), AppError> {
    let Some(unique) = entity.unique else {
        return Ok(());
    };
    let Some(Value::String(value)) = row.get(unique.column) else {
        return Ok(());
    };
    if find_ci(rows, unique.column, value, exclude_id).is_some() {
        return Err(AppError::Duplicate {
            field: unique.field.to_string(),
            message: format!("{} with {} '{}' already exists.", entity.label, unique.label, value),
        });
    }
    Ok(())
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Row>, AppError> {
        let t = self.lock()?;
        let mut rows: Vec<Row> = t
            .rows
            .get(entity.table)
            .map(|rows| rows.values().filter(|r| matches_query(r, query)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_cached_key(|r| (text(r.get(entity.order_by)).unwrap_or_default(), row_id(r)));
        Ok(rows)
    }

    async fn get(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Row>, AppError> {
        let t = self.lock()?;
        Ok(t.rows.get(entity.table).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn find_by_ci(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<Row>, AppError> {
        let t = self.lock()?;
        Ok(t.rows
            .get(entity.table)
            .and_then(|rows| find_ci(rows, column, value, exclude_id))
            .cloned())
    }

    async fn insert(&self, entity: &'static EntityDef, row: Row) -> Result<Row, AppError> {
        let mut t = self.lock()?;
        let Tables { rows, last_ids, .. } = &mut *t;
        let table = rows.entry(entity.table).or_default();
        check_unique(entity, table, &row, None)?;
        let id = last_ids.entry(entity.table).or_insert(0);
        *id += 1;
        let mut stored = Row::new();
        for c in entity.columns {
            let value = if c.name == ID_COLUMN {
                Value::from(*id)
            } else if c.read_only {
                match c.default {
                    Some(ColumnDefault::Now) => Value::String(Utc::now().to_rfc3339()),
                    None => Value::Null,
                }
            } else {
                row.get(c.name).cloned().unwrap_or(Value::Null)
            };
            stored.insert(c.name.to_string(), value);
        }
        table.insert(*id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &'static EntityDef, id: i64, row: Row) -> Result<Option<Row>, AppError> {
        let mut t = self.lock()?;
        let Some(table) = t.rows.get_mut(entity.table) else {
            return Ok(None);
        };
        if !table.contains_key(&id) {
            return Ok(None);
        }
        check_unique(entity, table, &row, Some(id))?;
        let Some(existing) = table.get_mut(&id) else {
            return Ok(None);
        };
        for c in entity.columns.iter().filter(|c| !c.read_only) {
            if let Some(v) = row.get(c.name) {
                existing.insert(c.name.to_string(), v.clone());
            }
        }
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        if entity.referenced_by_sales_orders {
            let referenced = t
                .orders
                .get(&OrderKind::Sales)
                .map(|orders| orders.iter().any(|o| o.header.party_id == Some(id)))
                .unwrap_or(false);
            if referenced {
                return Err(AppError::Conflict(format!(
                    "{} {} is referenced by sales orders and cannot be deleted",
                    entity.label, id
                )));
            }
        }
        Ok(t.rows
            .get_mut(entity.table)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_orders(&self, kind: OrderKind, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
        let t = self.lock()?;
        let mut orders: Vec<Order> = t
            .orders
            .get(&kind)
            .map(|orders| orders.iter().rev().filter(|o| filter.matches(o)).cloned().collect())
            .unwrap_or_default();
        // Reverse insertion order breaks ties between equal timestamps.
        match kind {
            OrderKind::Sales => orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            OrderKind::Purchase => orders.sort_by(|a, b| {
                let date = match (a.header.document_date, b.header.document_date) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                date.then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
        Ok(orders)
    }

    async fn get_order(&self, kind: OrderKind, id: Uuid) -> Result<Option<Order>, AppError> {
        let t = self.lock()?;
        Ok(t.orders
            .get(&kind)
            .and_then(|orders| orders.iter().find(|o| o.id == id))
            .cloned())
    }

    async fn create_order(&self, kind: OrderKind, draft: OrderDraft) -> Result<Order, AppError> {
        let mut t = self.lock()?;
        let doc = kind.document();
        let n = next_number(doc, t.trackers.get(&doc).copied());
        t.trackers.insert(doc, n);
        let order = Order::from_draft(draft, doc.format(n));
        t.orders.entry(kind).or_default().push(order.clone());
        Ok(order)
    }

    async fn save_order(&self, kind: OrderKind, id: Uuid, changes: OrderChanges) -> Result<Order, AppError> {
        let mut t = self.lock()?;
        let Some(order) = t
            .orders
            .get_mut(&kind)
            .and_then(|orders| orders.iter_mut().find(|o| o.id == id))
        else {
            return Err(AppError::NotFound(format!("{} {}", kind.label(), id)));
        };
        if let Some(expected) = changes.expected_version {
            if expected != order.row_version {
                return Err(AppError::Conflict(format!(
                    "{} {} was modified by another user (version {} expected, {} found)",
                    kind.label(),
                    id,
                    expected,
                    order.row_version
                )));
            }
        }
        order.header = changes.header;
        if let Some(items) = changes.items {
            order.items = items;
        }
        order.attachments.retain(|a| !changes.removed_attachments.contains(&a.id));
        order.attachments.extend(changes.added_attachments);
        order.row_version += 1;
        order.modified_at = Some(changes.modified_at);
        Ok(order.clone())
    }

    async fn delete_order(&self, kind: OrderKind, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        let Some(orders) = t.orders.get_mut(&kind) else {
            return Ok(false);
        };
        let before = orders.len();
        orders.retain(|o| o.id != id);
        Ok(orders.len() < before)
    }

    async fn find_attachment(&self, kind: OrderKind, id: Uuid) -> Result<Option<Attachment>, AppError> {
        let t = self.lock()?;
        Ok(t.orders
            .get(&kind)
            .and_then(|orders| orders.iter().flat_map(|o| o.attachments.iter()).find(|a| a.id == id))
            .cloned())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }
}
