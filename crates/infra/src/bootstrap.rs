//! Backend wiring from [`AtelierConfig`].

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use atelier_auth::Hs256TokenVerifier;

use crate::company_service::CompanyService;
use crate::config::AtelierConfig;
use crate::store::{DirectoryStore, InMemoryDirectoryStore, PostgresDirectoryStore};

/// Build the directory store selected by `config`.
///
/// Without a database URL this is the in-memory store (dev/test). Otherwise a
/// Postgres pool is opened and the schema applied before the store is returned.
pub async fn connect(config: &AtelierConfig) -> anyhow::Result<Arc<dyn DirectoryStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::info!("no database configured; using in-memory directory store");
        return Ok(Arc::new(InMemoryDirectoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    let store = PostgresDirectoryStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("failed to apply directory schema")?;

    tracing::info!(
        max_connections = config.max_connections,
        "connected to Postgres directory store"
    );
    Ok(Arc::new(store))
}

/// Store, handlers and token verifier for one process.
#[derive(Clone)]
pub struct Directory {
    pub service: CompanyService<dyn DirectoryStore>,
    pub verifier: Arc<Hs256TokenVerifier>,
}

pub async fn build_directory(config: &AtelierConfig) -> anyhow::Result<Directory> {
    let store = connect(config).await?;
    Ok(Directory {
        service: CompanyService::new(store),
        verifier: Arc::new(Hs256TokenVerifier::new(&config.jwt_secret)),
    })
}
