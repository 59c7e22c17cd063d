//! Idempotent DDL: schema, reference tables with case-insensitive unique indexes, order tables, number trackers.
//! Order follows PostgreSQL dependencies: referenced tables first.

use crate::error::AppError;
use crate::model::{ColumnDefault, EntityDef, OrderKind, ID_COLUMN, REFERENCE_ENTITIES};
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

/// Column DDL for one reference-entity column.
fn column_ddl(entity: &EntityDef, name: &str) -> Option<String> {
    let c = entity.column(name)?;
    let mut def = if c.name == ID_COLUMN {
        format!("{} BIGSERIAL PRIMARY KEY", quoted(c.name))
    } else {
        let typ = match c.pg_type {
            "numeric" => "NUMERIC(18,2)".to_string(),
            "timestamptz" => "TIMESTAMPTZ".to_string(),
            _ => match c.rule.max_length {
                Some(n) => format!("VARCHAR({})", n),
                None => "TEXT".to_string(),
            },
        };
        format!("{} {}", quoted(c.name), typ)
    };
    if c.rule.required {
        def.push_str(" NOT NULL");
    }
    if c.default == Some(ColumnDefault::Now) {
        def.push_str(" NOT NULL DEFAULT NOW()");
    }
    Some(def)
}

/// CREATE TABLE and unique index statements for one reference entity.
pub fn reference_ddl(schema: &str, entity: &EntityDef) -> Vec<String> {
    let table = qualified_table(schema, entity.table);
    let cols: Vec<String> = entity
        .columns
        .iter()
        .filter_map(|c| column_ddl(entity, c.name))
        .collect();
    let mut out = vec![format!("CREATE TABLE IF NOT EXISTS {} ({})", table, cols.join(", "))];
    if let Some(u) = entity.unique {
        out.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (lower({}))",
            quoted(&format!("ux_{}_{}", entity.table, u.column)),
            table,
            quoted(u.column)
        ));
    }
    out
}

/// CREATE TABLE statements for one order kind: header, items, attachments.
pub fn order_ddl(schema: &str, kind: OrderKind) -> Vec<String> {
    let t = kind.tables();
    let header = qualified_table(schema, t.header);
    let party_fk = match kind {
        OrderKind::Sales => format!(" REFERENCES {} (id)", qualified_table(schema, "customers")),
        OrderKind::Purchase => String::new(),
    };
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {header} (
                id UUID PRIMARY KEY,
                order_no VARCHAR(50) NOT NULL,
                party_id BIGINT{party_fk},
                party_code VARCHAR(100),
                party_name VARCHAR(255),
                document_date TIMESTAMPTZ,
                delivery_date TIMESTAMPTZ,
                reference_number VARCHAR(100),
                ship_to_address VARCHAR(500),
                remarks VARCHAR(1000),
                sales_employee VARCHAR(100),
                document_details VARCHAR(500),
                row_version BIGINT NOT NULL DEFAULT 1,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                modified_at TIMESTAMPTZ
            )"
        ),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (order_no)",
            quoted(&format!("ux_{}_order_no", t.header)),
            header
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                order_id UUID NOT NULL REFERENCES {header} (id) ON DELETE CASCADE,
                line_no INTEGER NOT NULL,
                product_code VARCHAR(50),
                product_name VARCHAR(255),
                quantity NUMERIC(18,4) NOT NULL DEFAULT 0,
                uom VARCHAR(20),
                price NUMERIC(18,2) NOT NULL DEFAULT 0,
                warehouse_location VARCHAR(100),
                tax_code VARCHAR(50),
                tax_price NUMERIC(18,2) NOT NULL DEFAULT 0,
                total NUMERIC(18,2) NOT NULL DEFAULT 0
            )",
            qualified_table(schema, t.items)
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                order_id UUID NOT NULL REFERENCES {header} (id) ON DELETE CASCADE,
                file_name VARCHAR(255) NOT NULL,
                stored_file_name VARCHAR(255) NOT NULL,
                content_type VARCHAR(255) NOT NULL,
                file_size BIGINT NOT NULL,
                uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            qualified_table(schema, t.attachments)
        ),
    ]
}

fn tracker_ddl(schema: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            document_type VARCHAR(50) PRIMARY KEY,
            last_used_number BIGINT NOT NULL
        )",
        qualified_table(schema, "order_number_trackers")
    )
}

/// Every statement, in execution order.
pub fn statements(schema: &str) -> Vec<String> {
    let mut out = vec![format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))];
    for entity in REFERENCE_ENTITIES {
        out.extend(reference_ddl(schema, entity));
    }
    for kind in [OrderKind::Sales, OrderKind::Purchase] {
        out.extend(order_ddl(schema, kind));
    }
    out.push(tracker_ddl(schema));
    out
}

/// Create the schema and every table and index if missing.
pub async fn apply_migrations(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    let statements = statements(schema);
    let mut tx = pool.begin().await?;
    for sql in &statements {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(schema = %schema, statements = statements.len(), "migrations applied");
    Ok(())
}
