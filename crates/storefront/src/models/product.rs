//! Product models.
//!
//! A product references up to three categories (main, sub, sub-sub) by id.
//! Its photo is stored alongside the record but is never part of listings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::category::Category;

/// A product record, without its photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub name: String,

    pub description: String,

    /// Unit price, never negative.
    pub price: f64,

    /// Units in stock.
    pub quantity: i32,

    /// Units sold so far.
    pub sold: i32,

    /// Whether the product can be shipped.
    pub shipping: bool,

    pub category: Option<Uuid>,

    pub subcategory: Option<Uuid>,

    pub sub_subcategory: Option<Uuid>,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

impl Product {
    /// Category ids this product references, in field order.
    pub fn category_refs(&self) -> impl Iterator<Item = Uuid> + '_ {
        [self.category, self.subcategory, self.sub_subcategory]
            .into_iter()
            .flatten()
    }
}

/// A product with its category references resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub sold: i32,
    pub shipping: bool,
    pub category: Option<Category>,
    pub subcategory: Option<Category>,
    pub sub_subcategory: Option<Category>,
    pub created: i64,
    pub changed: i64,
}

impl ProductView {
    /// Resolve category references from a lookup. Dangling ids become `None`.
    pub fn populate(product: Product, categories: &HashMap<Uuid, Category>) -> Self {
        let resolve = |id: Option<Uuid>| id.and_then(|id| categories.get(&id).cloned());

        Self {
            category: resolve(product.category),
            subcategory: resolve(product.subcategory),
            sub_subcategory: resolve(product.sub_subcategory),
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            quantity: product.quantity,
            sold: product.sold,
            shipping: product.shipping,
            created: product.created,
            changed: product.changed,
        }
    }
}

/// Photo bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub shipping: bool,
    pub category: Uuid,
    pub subcategory: Option<Uuid>,
    pub sub_subcategory: Option<Uuid>,
}

/// Input for updating a product. Present fields replace prior values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub shipping: Option<bool>,
    pub category: Option<Uuid>,
    pub subcategory: Option<Uuid>,
    pub sub_subcategory: Option<Uuid>,
}

impl ProductUpdate {
    /// Apply this update on top of an existing product.
    pub fn apply_to(self, mut product: Product) -> Product {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(shipping) = self.shipping {
            product.shipping = shipping;
        }
        if let Some(category) = self.category {
            product.category = Some(category);
        }
        if let Some(subcategory) = self.subcategory {
            product.subcategory = Some(subcategory);
        }
        if let Some(sub_subcategory) = self.sub_subcategory {
            product.sub_subcategory = Some(sub_subcategory);
        }
        product
    }
}

/// One ordered line: `count` units of `product`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    #[serde(alias = "_id")]
    pub product: Uuid,
    pub count: i32,
}

/// Result of a best-effort stock adjustment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReport {
    /// Products whose stock was adjusted.
    pub applied: Vec<Uuid>,
    /// Products that do not exist.
    pub missing: Vec<Uuid>,
    /// Products whose adjustment failed in the datastore.
    pub failed: Vec<Uuid>,
}
