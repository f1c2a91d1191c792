//! Catalog storage abstraction layer.
//!
//! All category and product persistence goes through [`CatalogStore`]. The
//! services never issue queries of their own, so swapping PostgreSQL for the
//! in-memory backend changes no call sites.
//!
//! # Backends
//!
//! - [`PgCatalogStore`] - PostgreSQL via sqlx, dynamic product queries built
//!   with SeaQuery.
//! - [`MemoryCatalogStore`] - process-local tables behind a single lock.

mod memory;
mod postgres;
pub mod query;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryCatalogStore;
pub use postgres::PgCatalogStore;
pub use query::{CategoryField, Constraint, ProductQuery, SortField, SortOrder};

use crate::models::{
    Category, CategoryScope, GuardedDelete, NewProduct, Photo, Product, PurchaseLine,
    PurchaseReport,
};

/// Datastore failures.
///
/// The cause split is for diagnostics; callers refuse the request the same
/// way whatever the cause.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated. Holds what was duplicated.
    #[error("duplicate {0}")]
    Duplicate(String),

    /// A value could not be converted to or from its stored form.
    #[error("malformed value: {0}")]
    Cast(String),

    /// The pool or the server timed out.
    #[error("datastore timed out")]
    Timeout,

    /// The connection failed or was closed.
    #[error("datastore unreachable: {0}")]
    Network(String),

    #[error("datastore failure: {0}")]
    Other(String),
}

impl StoreError {
    /// Short cause label for structured logs.
    pub fn cause(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate",
            Self::Cast(_) => "cast",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Other(_) => "other",
        }
    }

    /// Message safe to show to API clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "duplicate value",
            Self::Cast(_) => "malformed identifier or value",
            Self::Timeout => "datastore timed out, try again later",
            Self::Network(_) => "datastore unavailable, try again later",
            Self::Other(_) => "internal server error",
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::PoolClosed => Self::Network("connection pool closed".to_string()),
            sqlx::Error::Io(e) => Self::Network(e.to_string()),
            sqlx::Error::Tls(e) => Self::Network(e.to_string()),
            sqlx::Error::Decode(e) => Self::Cast(e.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Cast(format!("column {index}: {source}"))
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(db.constraint().unwrap_or("value").to_string())
            }
            // invalid_text_representation
            sqlx::Error::Database(db) if db.code().as_deref() == Some("22P02") => {
                Self::Cast(db.message().to_string())
            }
            // query_canceled, raised by statement_timeout
            sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => Self::Timeout,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The core trait for catalog storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ---- Categories ----

    /// Insert a category. `is_subcategory` is derived from `parent`.
    ///
    /// Fails with [`StoreError::Duplicate`] if the name is taken.
    async fn insert_category(&self, name: &str, parent: Option<Uuid>) -> StoreResult<Category>;

    /// Find a category by id.
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;

    /// Find every category whose id is in `ids`. Unknown ids are skipped.
    async fn find_categories(&self, ids: &[Uuid]) -> StoreResult<Vec<Category>>;

    /// Replace a category's name and parent, recomputing `is_subcategory`.
    ///
    /// Returns `None` if the category doesn't exist.
    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent: Option<Uuid>,
    ) -> StoreResult<Option<Category>>;

    /// List categories in the given scope, in the scope's order.
    async fn list_categories(&self, scope: CategoryScope) -> StoreResult<Vec<Category>>;

    /// Delete every category whose parent is `parent`. Returns how many.
    async fn delete_children(&self, parent: Uuid) -> StoreResult<u64>;

    /// Count products referencing `id` as category, subcategory or
    /// sub-subcategory.
    async fn count_category_references(&self, id: Uuid) -> StoreResult<u64>;

    /// Delete a single category. Returns `false` if it didn't exist.
    async fn delete_category(&self, id: Uuid) -> StoreResult<bool>;

    /// Check usage, then remove direct children and the category, atomically.
    async fn delete_category_guarded(&self, id: Uuid) -> StoreResult<GuardedDelete>;

    // ---- Products ----

    /// Insert a product with its photo.
    async fn insert_product(&self, product: &NewProduct, photo: &Photo) -> StoreResult<Product>;

    /// Find a product by id.
    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Overwrite a product's fields (matched by `product.id`), and its photo
    /// when one is given. Returns `None` if the product doesn't exist.
    async fn update_product(
        &self,
        product: &Product,
        photo: Option<&Photo>,
    ) -> StoreResult<Option<Product>>;

    /// Delete a product. Returns `false` if it didn't exist.
    async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;

    /// Run a filtered, sorted, paginated product query.
    async fn find_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>>;

    /// Count products matching all constraints.
    async fn count_products(&self, constraints: &[Constraint]) -> StoreResult<u64>;

    /// Distinct main-category ids referenced by products, sorted.
    async fn distinct_product_categories(&self) -> StoreResult<Vec<Uuid>>;

    /// Load a product's photo. `None` if the product or its photo is missing.
    async fn product_photo(&self, id: Uuid) -> StoreResult<Option<Photo>>;

    /// Decrement `quantity` and increment `sold` by each line's count.
    ///
    /// Best effort: one line failing does not stop the others.
    async fn apply_stock_adjustments(&self, lines: &[PurchaseLine])
    -> StoreResult<PurchaseReport>;

    // ---- Health ----

    /// Whether the backend is reachable.
    async fn healthy(&self) -> bool;

    /// Backend name for diagnostics (e.g., "postgres", "memory").
    fn backend(&self) -> &'static str;
}
