//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::db;
use crate::services::{CatalogQuery, CategoryTree, ProductService};
use crate::store::{CatalogStore, MemoryCatalogStore, PgCatalogStore};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Catalog storage. All reads and writes go through this interface.
    store: Arc<dyn CatalogStore>,

    categories: Arc<CategoryTree>,

    catalog: Arc<CatalogQuery>,

    products: Arc<ProductService>,
}

impl AppState {
    /// Create application state, connecting to the configured backend.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn CatalogStore> = match config.store {
            StoreBackend::Postgres => {
                let pool = db::create_pool(config).await?;
                info!("connected to PostgreSQL");
                db::run_migrations(&pool).await?;
                info!("database migrations applied");
                Arc::new(PgCatalogStore::new(pool))
            }
            StoreBackend::Memory => {
                info!("using in-memory catalog store, data will not persist");
                Arc::new(MemoryCatalogStore::new())
            }
        };

        Ok(Self::with_store(store, config))
    }

    /// Create application state over an existing store.
    pub fn with_store(store: Arc<dyn CatalogStore>, config: &Config) -> Self {
        let categories = CategoryTree::new(store.clone(), config.category_delete_guard);
        let catalog = CatalogQuery::new(store.clone());
        let products = ProductService::new(store.clone(), catalog.clone(), config.max_photo_bytes);

        Self {
            inner: Arc::new(AppStateInner {
                store,
                categories,
                catalog,
                products,
            }),
        }
    }

    /// Get the catalog store.
    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.inner.store
    }

    /// Get the category tree service.
    pub fn categories(&self) -> &Arc<CategoryTree> {
        &self.inner.categories
    }

    /// Get the catalog query service.
    pub fn catalog(&self) -> &Arc<CatalogQuery> {
        &self.inner.catalog
    }

    /// Get the product service.
    pub fn products(&self) -> &Arc<ProductService> {
        &self.inner.products
    }
}
