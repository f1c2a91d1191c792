//! Product record lifecycle: create, read, update, delete.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::CatalogQuery;
use crate::error::{AppError, AppResult};
use crate::models::{NewProduct, Photo, Product, ProductUpdate, ProductView};
use crate::store::CatalogStore;

/// Service for product records.
pub struct ProductService {
    store: Arc<dyn CatalogStore>,
    catalog: Arc<CatalogQuery>,
    max_photo_bytes: usize,
}

impl ProductService {
    /// Create a new ProductService.
    pub fn new(
        store: Arc<dyn CatalogStore>,
        catalog: Arc<CatalogQuery>,
        max_photo_bytes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            catalog,
            max_photo_bytes,
        })
    }

    /// Create a product. A photo is mandatory.
    pub async fn create(&self, mut input: NewProduct, photo: Photo) -> AppResult<Product> {
        input.name = input.name.trim().to_string();
        validate_fields(&input.name, &input.description, input.price, input.quantity)?;
        self.validate_photo(&photo)?;
        self.require_categories(&[
            Some(input.category),
            input.subcategory,
            input.sub_subcategory,
        ])
        .await?;

        let product = self.store.insert_product(&input, &photo).await?;
        info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ProductView> {
        let product = self.find(id).await?;
        let mut views = self.catalog.populate(vec![product]).await?;
        views.pop().ok_or(AppError::NotFound("product"))
    }

    /// Apply an update. Without a photo the stored one is kept.
    pub async fn update(
        &self,
        id: Uuid,
        update: ProductUpdate,
        photo: Option<Photo>,
    ) -> AppResult<Product> {
        let existing = self.find(id).await?;
        let mut product = update.apply_to(existing);
        product.name = product.name.trim().to_string();

        validate_fields(
            &product.name,
            &product.description,
            product.price,
            product.quantity,
        )?;
        if let Some(photo) = &photo {
            self.validate_photo(photo)?;
        }
        self.require_categories(&[
            product.category,
            product.subcategory,
            product.sub_subcategory,
        ])
        .await?;

        let product = self
            .store
            .update_product(&product, photo.as_ref())
            .await?
            .ok_or(AppError::NotFound("product"))?;
        info!(product_id = %id, "product updated");
        Ok(product)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.store.delete_product(id).await? {
            return Err(AppError::NotFound("product"));
        }
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or(AppError::NotFound("product"))
    }

    fn validate_photo(&self, photo: &Photo) -> AppResult<()> {
        if photo.data.is_empty() {
            return Err(AppError::validation("photo is empty"));
        }
        if !photo.content_type.starts_with("image/") {
            return Err(AppError::validation("photo must be an image"));
        }
        if photo.data.len() > self.max_photo_bytes {
            return Err(AppError::validation(format!(
                "photo must be at most {} bytes",
                self.max_photo_bytes
            )));
        }
        Ok(())
    }

    async fn require_categories(&self, refs: &[Option<Uuid>]) -> AppResult<()> {
        let mut ids: Vec<Uuid> = refs.iter().flatten().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(());
        }

        let found = self.store.find_categories(&ids).await?;
        if found.len() != ids.len() {
            return Err(AppError::validation("referenced category does not exist"));
        }
        Ok(())
    }
}

fn validate_fields(name: &str, description: &str, price: f64, quantity: i32) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::validation("product name is required"));
    }
    if description.trim().is_empty() {
        return Err(AppError::validation("product description is required"));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    if quantity < 0 {
        return Err(AppError::validation("quantity must not be negative"));
    }
    Ok(())
}
