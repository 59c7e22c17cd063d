//! Distributor back-office REST API: customers, products and their groups, UOM groups, sales employees,
//! and sales/purchase orders with attachments and sequential document numbers.

pub mod attachments;
pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod numbering;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use attachments::AttachmentStore;
pub use config::{Settings, StoreBackend};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::router;
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Store};
