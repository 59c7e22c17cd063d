//! Persistence seams. `PgStore` is the production backend; `MemoryStore` serves development and tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::error::AppError;
use crate::model::{Attachment, EntityDef, ListQuery, Order, OrderChanges, OrderDraft, OrderFilter, OrderKind, Row};
use async_trait::async_trait;
use uuid::Uuid;

/// Rows of the flat reference entities, addressed by descriptor.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Rows matching every condition, ordered by the entity's sort column then id.
    async fn list(&self, entity: &'static EntityDef, query: &ListQuery) -> Result<Vec<Row>, AppError>;

    async fn get(&self, entity: &'static EntityDef, id: i64) -> Result<Option<Row>, AppError>;

    /// First row whose `column` equals `value` ignoring case, skipping `exclude_id`.
    async fn find_by_ci(
        &self,
        entity: &'static EntityDef,
        column: &str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<Option<Row>, AppError>;

    async fn insert(&self, entity: &'static EntityDef, row: Row) -> Result<Row, AppError>;

    /// `None` when no row has this id.
    async fn update(&self, entity: &'static EntityDef, id: i64, row: Row) -> Result<Option<Row>, AppError>;

    /// `false` when no row has this id.
    async fn delete(&self, entity: &'static EntityDef, id: i64) -> Result<bool, AppError>;
}

/// Sales and purchase order aggregates with their items, attachments and number trackers.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_orders(&self, kind: OrderKind, filter: &OrderFilter) -> Result<Vec<Order>, AppError>;

    async fn get_order(&self, kind: OrderKind, id: Uuid) -> Result<Option<Order>, AppError>;

    /// Allocate the next document number and insert the aggregate atomically.
    async fn create_order(&self, kind: OrderKind, draft: OrderDraft) -> Result<Order, AppError>;

    /// Apply `changes` atomically. `NotFound` for a missing order, `Conflict` for a stale version.
    async fn save_order(&self, kind: OrderKind, id: Uuid, changes: OrderChanges) -> Result<Order, AppError>;

    /// Remove items, attachments and the header. `false` when the order does not exist.
    async fn delete_order(&self, kind: OrderKind, id: Uuid) -> Result<bool, AppError>;

    async fn find_attachment(&self, kind: OrderKind, id: Uuid) -> Result<Option<Attachment>, AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}

pub trait Store: ReferenceStore + OrderStore {}

impl<T: ReferenceStore + OrderStore> Store for T {}
