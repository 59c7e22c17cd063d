//! Binary: load settings, pick the store, apply migrations, serve.

use distributor_api::{
    apply_migrations, ensure_database_exists, router, AppState, AttachmentStore, MemoryStore, PgStore, Settings,
    Store, StoreBackend,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("distributor_api=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let store: Arc<dyn Store> = match settings.store {
        StoreBackend::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(&settings.database_url)
                .await?;
            apply_migrations(&pool, &settings.schema).await?;
            Arc::new(PgStore::new(pool, settings.schema.clone()))
        }
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let attachments = AttachmentStore::new(&settings.uploads_dir);
    attachments.ensure_folders().await?;
    let app = router(AppState::new(store, attachments), settings.max_upload_bytes);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        store = ?settings.store,
        uploads = %settings.uploads_dir.display(),
        "listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
