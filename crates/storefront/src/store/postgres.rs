//! PostgreSQL implementation of CatalogStore.
//!
//! Category statements are static. Product listings and counts are rendered
//! by [`ProductQuery`] and run with a statement timeout.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use super::query::{PRODUCT_COLUMNS, count_sql};
use super::{CatalogStore, Constraint, ProductQuery, StoreError, StoreResult};
use crate::db;
use crate::models::{
    Category, CategoryScope, GuardedDelete, NewProduct, Photo, Product, PurchaseLine,
    PurchaseReport,
};

const CATEGORY_COLUMNS: &str = "id, name, parent, is_subcategory, created, changed";

/// Catalog store backed by PostgreSQL.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    /// Create a new store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn product_columns() -> String {
        PRODUCT_COLUMNS.join(", ")
    }

    /// Adjust stock one statement per line, sorting each into the report.
    async fn adjust_each(&self, lines: &[PurchaseLine], now: i64) -> StoreResult<PurchaseReport> {
        let mut report = PurchaseReport::default();

        for line in lines {
            let result = sqlx::query(
                r#"
                UPDATE product
                SET quantity = quantity - $2, sold = sold + $2, changed = $3
                WHERE id = $1
                "#,
            )
            .bind(line.product)
            .bind(line.count)
            .bind(now)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) if done.rows_affected() > 0 => report.applied.push(line.product),
                Ok(_) => report.missing.push(line.product),
                Err(e) => {
                    let err = StoreError::from(e);
                    warn!(product = %line.product, cause = err.cause(), error = %err, "stock adjustment failed");
                    report.failed.push(line.product);
                }
            }
        }

        Ok(report)
    }
}

/// Unique violations on category writes can only be the name.
fn category_write_error(err: sqlx::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::Duplicate(_) => StoreError::Duplicate("category name".to_string()),
        other => other,
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert_category(&self, name: &str, parent: Option<Uuid>) -> StoreResult<Category> {
        let now = Utc::now().timestamp();

        sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO category (id, name, parent, is_subcategory, created, changed)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(name)
        .bind(parent)
        .bind(parent.is_some())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(category_write_error)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn find_categories(&self, ids: &[Uuid]) -> StoreResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = ANY($1) ORDER BY name"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent: Option<Uuid>,
    ) -> StoreResult<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE category
            SET name = $2, parent = $3, is_subcategory = $4, changed = $5
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(parent)
        .bind(parent.is_some())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(category_write_error)
    }

    async fn list_categories(&self, scope: CategoryScope) -> StoreResult<Vec<Category>> {
        let categories = match scope {
            CategoryScope::All => {
                sqlx::query_as::<_, Category>(&format!(
                    "SELECT {CATEGORY_COLUMNS} FROM category ORDER BY is_subcategory, name"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            CategoryScope::Main => {
                sqlx::query_as::<_, Category>(&format!(
                    "SELECT {CATEGORY_COLUMNS} FROM category WHERE parent IS NULL ORDER BY name"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            CategoryScope::ChildrenOf(parent) => {
                sqlx::query_as::<_, Category>(&format!(
                    "SELECT {CATEGORY_COLUMNS} FROM category WHERE parent = $1 ORDER BY name"
                ))
                .bind(parent)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(categories)
    }

    async fn delete_children(&self, parent: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM category WHERE parent = $1")
            .bind(parent)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_category_references(&self, id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM product
            WHERE category = $1 OR subcategory = $1 OR sub_subcategory = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_category_guarded(&self, id: Uuid) -> StoreResult<GuardedDelete> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so no product can be attached while we decide.
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM category WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            tx.rollback().await?;
            return Ok(GuardedDelete::NotFound);
        }

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM product
            WHERE category = $1 OR subcategory = $1 OR sub_subcategory = $1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if count > 0 {
            tx.rollback().await?;
            return Ok(GuardedDelete::InUse {
                count: u64::try_from(count).unwrap_or(0),
            });
        }

        let children = sqlx::query("DELETE FROM category WHERE parent = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(GuardedDelete::Removed { children })
    }

    async fn insert_product(&self, product: &NewProduct, photo: &Photo) -> StoreResult<Product> {
        let now = Utc::now().timestamp();

        let record = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO product (
                id, name, description, price, quantity, sold, shipping,
                category, subcategory, sub_subcategory,
                photo_data, photo_content_type, created, changed
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {}
            "#,
            Self::product_columns()
        ))
        .bind(Uuid::now_v7())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.shipping)
        .bind(product.category)
        .bind(product.subcategory)
        .bind(product.sub_subcategory)
        .bind(&photo.data)
        .bind(&photo.content_type)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM product WHERE id = $1",
            Self::product_columns()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn update_product(
        &self,
        product: &Product,
        photo: Option<&Photo>,
    ) -> StoreResult<Option<Product>> {
        let updated = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE product
            SET name = $2, description = $3, price = $4, quantity = $5, sold = $6,
                shipping = $7, category = $8, subcategory = $9, sub_subcategory = $10,
                photo_data = COALESCE($11, photo_data),
                photo_content_type = COALESCE($12, photo_content_type),
                changed = $13
            WHERE id = $1
            RETURNING {}
            "#,
            Self::product_columns()
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.sold)
        .bind(product.shipping)
        .bind(product.category)
        .bind(product.subcategory)
        .bind(product.sub_subcategory)
        .bind(photo.map(|p| p.data.as_slice()))
        .bind(photo.map(|p| p.content_type.as_str()))
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>> {
        let sql = query.to_sql();

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL statement_timeout = '10s'")
            .execute(&mut *tx)
            .await?;
        let products = sqlx::query_as::<_, Product>(&sql)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(products)
    }

    async fn count_products(&self, constraints: &[Constraint]) -> StoreResult<u64> {
        let sql = count_sql(constraints);

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL statement_timeout = '10s'")
            .execute(&mut *tx)
            .await?;
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn distinct_product_categories(&self) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM product WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn product_photo(&self, id: Uuid) -> StoreResult<Option<Photo>> {
        let row: Option<(Option<Vec<u8>>, Option<String>)> = sqlx::query_as(
            "SELECT photo_data, photo_content_type FROM product WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|(data, content_type)| match (data, content_type) {
            (Some(data), Some(content_type)) => Some(Photo { data, content_type }),
            _ => None,
        }))
    }

    async fn apply_stock_adjustments(
        &self,
        lines: &[PurchaseLine],
    ) -> StoreResult<PurchaseReport> {
        let now = Utc::now().timestamp();
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product).collect();
        let counts: Vec<i32> = lines.iter().map(|l| l.count).collect();

        // Repeated products are summed so each row is updated once.
        let batch: Result<Vec<Uuid>, sqlx::Error> = sqlx::query_scalar(
            r#"
            UPDATE product p
            SET quantity = p.quantity - totals.total, sold = p.sold + totals.total, changed = $3
            FROM (
                SELECT id, SUM(qty) AS total
                FROM unnest($1::uuid[], $2::int4[]) AS l(id, qty)
                GROUP BY id
            ) totals
            WHERE p.id = totals.id
            RETURNING p.id
            "#,
        )
        .bind(&ids)
        .bind(&counts)
        .bind(now)
        .fetch_all(&self.pool)
        .await;

        match batch {
            Ok(updated) => {
                let updated: HashSet<Uuid> = updated.into_iter().collect();
                let mut report = PurchaseReport::default();
                for line in lines {
                    if updated.contains(&line.product) {
                        report.applied.push(line.product);
                    } else {
                        report.missing.push(line.product);
                    }
                }
                Ok(report)
            }
            Err(e) => {
                // Nothing was applied; retry line by line to isolate the failure.
                let err = StoreError::from(e);
                warn!(cause = err.cause(), error = %err, "batched stock adjustment failed");
                self.adjust_each(lines, now).await
            }
        }
    }

    async fn healthy(&self) -> bool {
        db::check_health(&self.pool).await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
