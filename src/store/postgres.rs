//! PostgreSQL store. Reference entities run through the generic SQL builder; orders use typed rows and transactions.

use super::{OrderStore, ReferenceStore};
use crate::error::{AppError, ConfigError};
use crate::model::{
    Attachment, EntityDef, LineItem, ListQuery, Order, OrderChanges, OrderDraft, OrderFilter, OrderHeader, OrderKind,
    Row,
};
use crate::sql::{self, qualified_table, PgBindValue, QueryBuf};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{ConnectOptions, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const HEADER_COLUMNS: &str = "id, order_no, party_id, party_code, party_name, document_date, delivery_date, \
     reference_number, ship_to_address, remarks, sales_employee, document_details, row_version, created_at, modified_at";
const ITEM_COLUMNS: &str = "id, order_id, line_no, product_code, product_name, quantity, uom, price, \
     warehouse_location, tax_code, tax_price, total";
const ATTACHMENT_COLUMNS: &str = "id, order_id, file_name, stored_file_name, content_type, file_size, uploaded_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table(&self, name: &str) -> String {
        qualified_table(&self.schema, name)
    }

    async fn fetch_rows(&self, entity: &EntityDef, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_json(entity, r)).collect()
    }

    async fn fetch_row(&self, entity: &EntityDef, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_json(entity, &r)).transpose()
    }

    /// Attach items and attachments to header rows, keeping the header order.
    async fn assemble(&self, kind: OrderKind, headers: Vec<OrderRow>) -> Result<Vec<Order>, AppError> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        let tables = kind.tables();
        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();

        let items_sql = format!(
            "SELECT {} FROM {} WHERE order_id = ANY($1) ORDER BY order_id, line_no",
            ITEM_COLUMNS,
            self.table(tables.items)
        );
        tracing::debug!(sql = %items_sql, orders = ids.len(), "query");
        let items: Vec<ItemRow> = sqlx::query_as(&items_sql).bind(&ids).fetch_all(&self.pool).await?;

        let attachments_sql = format!(
            "SELECT {} FROM {} WHERE order_id = ANY($1) ORDER BY uploaded_at, id",
            ATTACHMENT_COLUMNS,
            self.table(tables.attachments)
        );
        tracing::debug!(sql = %attachments_sql, orders = ids.len(), "query");
        let attachments: Vec<AttachmentRow> =
            sqlx::query_as(&attachments_sql).bind(&ids).fetch_all(&self.pool).await?;

        let mut items_by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        for i in items {
            items_by_order.entry(i.order_id).or_default().push(i.into());
        }
        let mut attachments_by_order: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
        for a in attachments {
            attachments_by_order.entry(a.order_id).or_default().push(a.into());
        }
        Ok(headers
            .into_iter()
            .map(|h| {
                let items = items_by_order.remove(&h.id).unwrap_or_default();
                let attachments = attachments_by_order.remove(&h.id).unwrap_or_default();
                h.into_order(items, attachments)
            })
            .collect())
    }

    async fn next_number(&self, conn: &mut PgConnection, kind: OrderKind) -> Result<String, AppError> {
        let doc = kind.document();
        let sql = format!(
            "INSERT INTO {} AS t (document_type, last_used_number) VALUES ($1, $2) \
             ON CONFLICT (document_type) DO UPDATE SET last_used_number = t.last_used_number + 1 \
             RETURNING last_used_number",
            self.table("order_number_trackers")
        );
        let (n,): (i64,) = sqlx::query_as(&sql)
            .bind(doc.key())
            .bind(doc.first_number())
            .fetch_one(&mut *conn)
            .await?;
        Ok(doc.format(n))
    }

    async fn insert_items(
        &self,
        conn: &mut PgConnection,
        kind: OrderKind,
        order_id: Uuid,
        items: &[LineItem],
    ) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            self.table(kind.tables().items),
            ITEM_COLUMNS
        );
        for (line_no, i) in items.iter().enumerate() {
            sqlx::query(&sql)
                .bind(i.id)
                .bind(order_id)
                .bind(line_no as i32)
                .bind(&i.product_code)
                .bind(&i.product_name)
                .bind(i.quantity)
                .bind(&i.uom)
                .bind(i.price)
                .bind(&i.warehouse_location)
                .bind(&i.tax_code)
                .bind(i.tax_price)
                .bind(i.total)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn insert_attachments(
        &self,
        conn: &mut PgConnection,
        kind: OrderKind,
        order_id: Uuid,
        attachments: &[Attachment],
    ) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table(kind.tables().attachments),
            ATTACHMENT_COLUMNS
        );
        for a in attachments {
            sqlx::query(&sql)
                .bind(a.id)
                .bind(order_id)
                .bind(&a.file_name)
                .bind(&a.stored_file_name)
                .bind(&a.content_type)
                .bind(a.file_size)
                .bind(a.uploaded_at)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Row>, AppError> {
        let q = sql::select_list(entity, &self.schema, query);
        self.fetch_rows(entity, &q).await
    }

    async fn get(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Row>, AppError> {
        let q = sql::select_by_id(entity, &self.schema, id);
        self.fetch_row(entity, &q).await
    }

    async fn find_by_ci(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<Row>, AppError> {
        let q = sql::select_by_column_ci(entity, &self.schema, column, value, exclude_id);
        self.fetch_row(entity, &q).await
    }

    async fn insert(&self, entity: &'static EntityDef, row: Row) -> Result<Row, AppError> {
        let q = sql::insert(entity, &self.schema, &row);
        self.fetch_row(entity, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, entity: &'static EntityDef, id: i64, row: Row) -> Result<Option<Row>, AppError> {
        let q = sql::update(entity, &self.schema, id, &row);
        self.fetch_row(entity, &q).await
    }

    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(entity, &self.schema, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = sqlx::query(&q.sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn list_orders(&self, kind: OrderKind, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
        let order_by = match kind {
            OrderKind::Sales => "created_at DESC, id",
            OrderKind::Purchase => "document_date DESC NULLS LAST, created_at DESC, id",
        };
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE ($1::text IS NULL OR strpos(lower(order_no), lower($1::text)) > 0) \
             AND ($2::text IS NULL OR strpos(lower(party_name), lower($2::text)) > 0) \
             ORDER BY {}",
            HEADER_COLUMNS,
            self.table(kind.tables().header),
            order_by
        );
        tracing::debug!(sql = %sql, filter = ?filter, "query");
        let headers: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(filter.order_no.as_deref())
            .bind(filter.party_name.as_deref())
            .fetch_all(&self.pool)
            .await?;
        self.assemble(kind, headers).await
    }

    async fn get_order(&self, kind: OrderKind, id: Uuid) -> Result<Option<Order>, AppError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", HEADER_COLUMNS, self.table(kind.tables().header));
        tracing::debug!(sql = %sql, %id, "query");
        let header: Option<OrderRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        let Some(header) = header else {
            return Ok(None);
        };
        Ok(self.assemble(kind, vec![header]).await?.pop())
    }

    async fn create_order(&self, kind: OrderKind, draft: OrderDraft) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;
        let order_no = self.next_number(&mut *tx, kind).await?;
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, $13, $13)",
            self.table(kind.tables().header),
            HEADER_COLUMNS
        );
        tracing::debug!(sql = %sql, order_no = %order_no, "query (tx)");
        let h = &draft.header;
        sqlx::query(&sql)
            .bind(draft.id)
            .bind(&order_no)
            .bind(h.party_id)
            .bind(&h.party_code)
            .bind(&h.party_name)
            .bind(h.document_date)
            .bind(h.delivery_date)
            .bind(&h.reference_number)
            .bind(&h.ship_to_address)
            .bind(&h.remarks)
            .bind(&h.sales_employee)
            .bind(&h.document_details)
            .bind(draft.created_at)
            .execute(&mut *tx)
            .await?;
        self.insert_items(&mut *tx, kind, draft.id, &draft.items).await?;
        self.insert_attachments(&mut *tx, kind, draft.id, &draft.attachments).await?;
        tx.commit().await?;
        Ok(Order::from_draft(draft, order_no))
    }

    async fn save_order(&self, kind: OrderKind, id: Uuid, changes: OrderChanges) -> Result<Order, AppError> {
        let tables = kind.tables();
        let mut tx = self.pool.begin().await?;
        let lock_sql = format!("SELECT row_version FROM {} WHERE id = $1 FOR UPDATE", self.table(tables.header));
        let current: Option<(i64,)> = sqlx::query_as(&lock_sql).bind(id).fetch_optional(&mut *tx).await?;
        let Some((version,)) = current else {
            return Err(AppError::NotFound(format!("{} {}", kind.label(), id)));
        };
        if let Some(expected) = changes.expected_version {
            if expected != version {
                return Err(AppError::Conflict(format!(
                    "{} {} was modified by another user (version {} expected, {} found)",
                    kind.label(),
                    id,
                    expected,
                    version
                )));
            }
        }

        let update_sql = format!(
            "UPDATE {} SET party_id = $2, party_code = $3, party_name = $4, document_date = $5, \
             delivery_date = $6, reference_number = $7, ship_to_address = $8, remarks = $9, \
             sales_employee = $10, document_details = $11, modified_at = $12, row_version = row_version + 1 \
             WHERE id = $1",
            self.table(tables.header)
        );
        tracing::debug!(sql = %update_sql, %id, "query (tx)");
        let h = &changes.header;
        sqlx::query(&update_sql)
            .bind(id)
            .bind(h.party_id)
            .bind(&h.party_code)
            .bind(&h.party_name)
            .bind(h.document_date)
            .bind(h.delivery_date)
            .bind(&h.reference_number)
            .bind(&h.ship_to_address)
            .bind(&h.remarks)
            .bind(&h.sales_employee)
            .bind(&h.document_details)
            .bind(changes.modified_at)
            .execute(&mut *tx)
            .await?;

        if let Some(items) = &changes.items {
            sqlx::query(&format!("DELETE FROM {} WHERE order_id = $1", self.table(tables.items)))
                .bind(id)
                .execute(&mut *tx)
                .await?;
            self.insert_items(&mut *tx, kind, id, items).await?;
        }
        if !changes.removed_attachments.is_empty() {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE order_id = $1 AND id = ANY($2)",
                self.table(tables.attachments)
            ))
            .bind(id)
            .bind(&changes.removed_attachments)
            .execute(&mut *tx)
            .await?;
        }
        self.insert_attachments(&mut *tx, kind, id, &changes.added_attachments).await?;
        tx.commit().await?;

        self.get_order(kind, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind.label(), id)))
    }

    async fn delete_order(&self, kind: OrderKind, id: Uuid) -> Result<bool, AppError> {
        let tables = kind.tables();
        let mut tx = self.pool.begin().await?;
        for child in [tables.items, tables.attachments] {
            sqlx::query(&format!("DELETE FROM {} WHERE order_id = $1", self.table(child)))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let deleted = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table(tables.header)))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn find_attachment(&self, kind: OrderKind, id: Uuid) -> Result<Option<Attachment>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
            ATTACHMENT_COLUMNS,
            self.table(kind.tables().attachments)
        );
        let row: Option<AttachmentRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Attachment::from))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_no: String,
    party_id: Option<i64>,
    party_code: Option<String>,
    party_name: Option<String>,
    document_date: Option<DateTime<Utc>>,
    delivery_date: Option<DateTime<Utc>>,
    reference_number: Option<String>,
    ship_to_address: Option<String>,
    remarks: Option<String>,
    sales_employee: Option<String>,
    document_details: Option<String>,
    row_version: i64,
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>, attachments: Vec<Attachment>) -> Order {
        Order {
            id: self.id,
            order_no: self.order_no,
            header: OrderHeader {
                party_id: self.party_id,
                party_code: self.party_code,
                party_name: self.party_name,
                document_date: self.document_date,
                delivery_date: self.delivery_date,
                reference_number: self.reference_number,
                ship_to_address: self.ship_to_address,
                remarks: self.remarks,
                sales_employee: self.sales_employee,
                document_details: self.document_details,
            },
            items,
            attachments,
            row_version: self.row_version,
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    order_id: Uuid,
    #[allow(dead_code)]
    line_no: i32,
    product_code: Option<String>,
    product_name: Option<String>,
    quantity: Decimal,
    uom: Option<String>,
    price: Decimal,
    warehouse_location: Option<String>,
    tax_code: Option<String>,
    tax_price: Decimal,
    total: Decimal,
}

impl From<ItemRow> for LineItem {
    fn from(r: ItemRow) -> Self {
        LineItem {
            id: r.id,
            product_code: r.product_code,
            product_name: r.product_name,
            quantity: r.quantity,
            uom: r.uom,
            price: r.price,
            warehouse_location: r.warehouse_location,
            tax_code: r.tax_code,
            tax_price: r.tax_price,
            total: r.total,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AttachmentRow {
    id: Uuid,
    order_id: Uuid,
    file_name: String,
    stored_file_name: String,
    content_type: String,
    file_size: i64,
    uploaded_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(r: AttachmentRow) -> Self {
        Attachment {
            id: r.id,
            file_name: r.file_name,
            stored_file_name: r.stored_file_name,
            content_type: r.content_type,
            file_size: r.file_size,
            uploaded_at: r.uploaded_at,
        }
    }
}

/// Decode a reference-entity row using the descriptor's column types.
fn row_to_json(entity: &EntityDef, row: &PgRow) -> Result<Row, AppError> {
    let mut map = Row::new();
    for col in entity.columns {
        map.insert(col.name.to_string(), cell_to_value(row, col.name, col.pg_type)?);
    }
    Ok(map)
}

fn cell_to_value(row: &PgRow, name: &str, pg_type: &str) -> Result<Value, AppError> {
    use sqlx::Row as _;
    Ok(match pg_type {
        "bigint" => row.try_get::<Option<i64>, _>(name)?.map(Value::from).unwrap_or(Value::Null),
        "timestamptz" => row
            .try_get::<Option<DateTime<Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or(Value::Null),
        _ => row.try_get::<Option<String>, _>(name)?.map(Value::String).unwrap_or(Value::Null),
    })
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| invalid_database_url(e.to_string()))?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// The URL itself is not echoed; it may carry a password.
fn invalid_database_url(reason: String) -> AppError {
    ConfigError::Invalid { var: "DATABASE_URL", value: "<redacted>".into(), reason }.into()
}

/// Split a connection URL into the admin URL (same server, `postgres` database) and the target database name.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| invalid_database_url("no database path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((name, q)) => (name.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}
