//! In-memory implementation of CatalogStore.
//!
//! Every operation takes the single table lock once, so each call is atomic
//! with respect to the others. Nothing is persisted.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{CatalogStore, Constraint, ProductQuery, StoreError, StoreResult};
use crate::models::{
    Category, CategoryScope, GuardedDelete, NewProduct, Photo, Product, PurchaseLine,
    PurchaseReport,
};

#[derive(Default)]
struct Tables {
    categories: HashMap<Uuid, Category>,
    products: HashMap<Uuid, StoredProduct>,
}

struct StoredProduct {
    product: Product,
    photo: Option<Photo>,
}

impl Tables {
    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except)
    }

    fn references(&self, id: Uuid) -> u64 {
        self.products
            .values()
            .filter(|p| p.product.category_refs().any(|r| r == id))
            .count() as u64
    }

    fn remove_children(&mut self, parent: Uuid) -> u64 {
        let before = self.categories.len();
        self.categories.retain(|_, c| c.parent != Some(parent));
        (before - self.categories.len()) as u64
    }
}

/// Process-local catalog store.
#[derive(Default)]
pub struct MemoryCatalogStore {
    tables: RwLock<Tables>,
}

impl MemoryCatalogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn duplicate_name() -> StoreError {
    StoreError::Duplicate("category name".to_string())
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn insert_category(&self, name: &str, parent: Option<Uuid>) -> StoreResult<Category> {
        let mut tables = self.tables.write();
        if tables.name_taken(name, None) {
            return Err(duplicate_name());
        }

        let now = now();
        let category = Category {
            id: Uuid::now_v7(),
            name: name.to_string(),
            parent,
            is_subcategory: parent.is_some(),
            created: now,
            changed: now,
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.tables.read().categories.get(&id).cloned())
    }

    async fn find_categories(&self, ids: &[Uuid]) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read();
        let unique: BTreeSet<Uuid> = ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| tables.categories.get(&id).cloned())
            .collect())
    }

    async fn update_category(
        &self,
        id: Uuid,
        name: &str,
        parent: Option<Uuid>,
    ) -> StoreResult<Option<Category>> {
        let mut tables = self.tables.write();
        if !tables.categories.contains_key(&id) {
            return Ok(None);
        }
        if tables.name_taken(name, Some(id)) {
            return Err(duplicate_name());
        }

        let now = now();
        Ok(tables.categories.get_mut(&id).map(|category| {
            category.name = name.to_string();
            category.parent = parent;
            category.is_subcategory = parent.is_some();
            category.changed = now;
            category.clone()
        }))
    }

    async fn list_categories(&self, scope: CategoryScope) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read();
        let mut categories: Vec<Category> = tables
            .categories
            .values()
            .filter(|c| match scope {
                CategoryScope::All => true,
                CategoryScope::Main => c.parent.is_none(),
                CategoryScope::ChildrenOf(parent) => c.parent == Some(parent),
            })
            .cloned()
            .collect();

        match scope {
            CategoryScope::All => categories.sort_by(|a, b| {
                a.is_subcategory
                    .cmp(&b.is_subcategory)
                    .then_with(|| a.name.cmp(&b.name))
            }),
            _ => categories.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        Ok(categories)
    }

    async fn delete_children(&self, parent: Uuid) -> StoreResult<u64> {
        Ok(self.tables.write().remove_children(parent))
    }

    async fn count_category_references(&self, id: Uuid) -> StoreResult<u64> {
        Ok(self.tables.read().references(id))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().categories.remove(&id).is_some())
    }

    async fn delete_category_guarded(&self, id: Uuid) -> StoreResult<GuardedDelete> {
        let mut tables = self.tables.write();
        if !tables.categories.contains_key(&id) {
            return Ok(GuardedDelete::NotFound);
        }

        let count = tables.references(id);
        if count > 0 {
            return Ok(GuardedDelete::InUse { count });
        }

        let children = tables.remove_children(id);
        tables.categories.remove(&id);
        Ok(GuardedDelete::Removed { children })
    }

    async fn insert_product(&self, product: &NewProduct, photo: &Photo) -> StoreResult<Product> {
        let now = now();
        let record = Product {
            id: Uuid::now_v7(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            quantity: product.quantity,
            sold: 0,
            shipping: product.shipping,
            category: Some(product.category),
            subcategory: product.subcategory,
            sub_subcategory: product.sub_subcategory,
            created: now,
            changed: now,
        };

        self.tables.write().products.insert(
            record.id,
            StoredProduct {
                product: record.clone(),
                photo: Some(photo.clone()),
            },
        );
        Ok(record)
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self
            .tables
            .read()
            .products
            .get(&id)
            .map(|p| p.product.clone()))
    }

    async fn update_product(
        &self,
        product: &Product,
        photo: Option<&Photo>,
    ) -> StoreResult<Option<Product>> {
        let mut tables = self.tables.write();
        let Some(stored) = tables.products.get_mut(&product.id) else {
            return Ok(None);
        };

        let created = stored.product.created;
        stored.product = Product {
            created,
            changed: now(),
            ..product.clone()
        };
        if let Some(photo) = photo {
            stored.photo = Some(photo.clone());
        }
        Ok(Some(stored.product.clone()))
    }

    async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().products.remove(&id).is_some())
    }

    async fn find_products(&self, query: &ProductQuery) -> StoreResult<Vec<Product>> {
        let tables = self.tables.read();
        let mut matches: Vec<Product> = tables
            .products
            .values()
            .map(|p| &p.product)
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        matches.sort_by(|a, b| query.compare(a, b));

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(matches.into_iter().skip(skip).take(limit).collect())
    }

    async fn count_products(&self, constraints: &[Constraint]) -> StoreResult<u64> {
        let tables = self.tables.read();
        Ok(tables
            .products
            .values()
            .filter(|p| constraints.iter().all(|c| c.matches(&p.product)))
            .count() as u64)
    }

    async fn distinct_product_categories(&self) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.read();
        let ids: BTreeSet<Uuid> = tables
            .products
            .values()
            .filter_map(|p| p.product.category)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn product_photo(&self, id: Uuid) -> StoreResult<Option<Photo>> {
        Ok(self
            .tables
            .read()
            .products
            .get(&id)
            .and_then(|p| p.photo.clone()))
    }

    async fn apply_stock_adjustments(
        &self,
        lines: &[PurchaseLine],
    ) -> StoreResult<PurchaseReport> {
        let mut tables = self.tables.write();
        let now = now();
        let mut report = PurchaseReport::default();

        for line in lines {
            let Some(stored) = tables.products.get_mut(&line.product) else {
                report.missing.push(line.product);
                continue;
            };

            // Out-of-range stock fails the line and leaves the product as it was.
            let adjusted = stored
                .product
                .quantity
                .checked_sub(line.count)
                .zip(stored.product.sold.checked_add(line.count));
            match adjusted {
                Some((quantity, sold)) => {
                    stored.product.quantity = quantity;
                    stored.product.sold = sold;
                    stored.product.changed = now;
                    report.applied.push(line.product);
                }
                None => {
                    warn!(product = %line.product, count = line.count, "stock adjustment out of range");
                    report.failed.push(line.product);
                }
            }
        }
        Ok(report)
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
