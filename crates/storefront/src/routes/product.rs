//! Product API routes.
//!
//! Create and update take `multipart/form-data` with the product fields as
//! text parts and the image in a `photo` part.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    NewProduct, Photo, Product, ProductUpdate, ProductView, PurchaseLine, PurchaseReport,
};
use crate::services::catalog_query::parse_id;
use crate::services::{ListParams, SearchPage, SearchRequest};
use crate::state::AppState;

/// Create the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/product/create", post(create_product))
        .route(
            "/api/product/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/product/photo/{id}", get(product_photo))
        .route("/api/products", get(list_products))
        .route("/api/products/related/{id}", get(list_related))
        .route("/api/products/categories", get(list_categories))
        .route("/api/products/by/search", post(search_by_filters))
        .route("/api/products/search", get(search_by_name))
        .route("/api/products/purchase", post(purchase))
}

// -------------------------------------------------------------------------
// Request types
// -------------------------------------------------------------------------

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

#[derive(Deserialize)]
struct NameSearchQuery {
    search: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
struct PurchaseRequest {
    products: Vec<PurchaseLine>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Query-string rejections answer like every other validation error.
fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Text fields and the optional photo from a product form.
#[derive(Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    photo: Option<Photo>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::validation(format!("malformed form: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "photo" {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("failed to read photo: {e}")))?;
                form.photo = Some(Photo {
                    data: data.to_vec(),
                    content_type,
                });
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("failed to read \"{name}\": {e}")))?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// A non-empty text field.
    fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> AppResult<&str> {
        self.text(key)
            .ok_or_else(|| AppError::validation(format!("\"{key}\" is required")))
    }

    fn number<T: std::str::FromStr>(&self, key: &str) -> AppResult<Option<T>> {
        self.text(key)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| AppError::validation(format!("\"{key}\" must be a number")))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> AppResult<Option<bool>> {
        self.text(key)
            .map(|v| match v.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(AppError::validation(format!("\"{key}\" must be true or false"))),
            })
            .transpose()
    }

    fn id(&self, key: &str) -> AppResult<Option<Uuid>> {
        self.text(key).map(|v| parse_id(v, key)).transpose()
    }

    fn into_new_product(self) -> AppResult<(NewProduct, Photo)> {
        let product = NewProduct {
            name: self.required("name")?.to_string(),
            description: self.required("description")?.to_string(),
            price: self
                .number("price")?
                .ok_or_else(|| AppError::validation("\"price\" is required"))?,
            quantity: self
                .number("quantity")?
                .ok_or_else(|| AppError::validation("\"quantity\" is required"))?,
            shipping: self
                .flag("shipping")?
                .ok_or_else(|| AppError::validation("\"shipping\" is required"))?,
            category: self
                .id("category")?
                .ok_or_else(|| AppError::validation("\"category\" is required"))?,
            subcategory: self.id("subcategory")?,
            sub_subcategory: self.id("subSubcategory")?,
        };
        let photo = self
            .photo
            .ok_or_else(|| AppError::validation("\"photo\" is required"))?;

        Ok((product, photo))
    }

    fn into_update(self) -> AppResult<(ProductUpdate, Option<Photo>)> {
        let update = ProductUpdate {
            name: self.text("name").map(str::to_string),
            description: self.text("description").map(str::to_string),
            price: self.number("price")?,
            quantity: self.number("quantity")?,
            shipping: self.flag("shipping")?,
            category: self.id("category")?,
            subcategory: self.id("subcategory")?,
            sub_subcategory: self.id("subSubcategory")?,
        };

        Ok((update, self.photo))
    }
}

// -------------------------------------------------------------------------
// Product records
// -------------------------------------------------------------------------

async fn create_product(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Product>> {
    let (input, photo) = ProductForm::read(multipart).await?.into_new_product()?;
    Ok(Json(state.products().create(input, photo).await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProductView>> {
    let id = parse_id(&id, "product")?;
    Ok(Json(state.products().get(id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<Product>> {
    let id = parse_id(&id, "product")?;
    let (update, photo) = ProductForm::read(multipart).await?.into_update()?;
    Ok(Json(state.products().update(id, update, photo).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "product")?;
    state.products().delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully".to_string(),
    }))
}

async fn product_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id, "product")?;
    let photo = state.catalog().get_photo(id).await?;
    Ok(([(header::CONTENT_TYPE, photo.content_type)], photo.data))
}

// -------------------------------------------------------------------------
// Catalog queries
// -------------------------------------------------------------------------

async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<Vec<ProductView>>> {
    let params = parse_query(params)?;
    Ok(Json(state.catalog().list_by_attribute(&params).await?))
}

async fn list_related(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ProductView>>> {
    let id = parse_id(&id, "product")?;
    let query = parse_query(query)?;
    Ok(Json(
        state
            .catalog()
            .list_related(id, query.limit.as_deref())
            .await?,
    ))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Uuid>>> {
    Ok(Json(state.catalog().list_distinct_categories().await?))
}

async fn search_by_filters(
    State(state): State<AppState>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> AppResult<Json<SearchPage>> {
    let Json(request) = body.map_err(|r| AppError::validation(r.body_text()))?;
    Ok(Json(state.catalog().search_by_filters(&request).await?))
}

async fn search_by_name(
    State(state): State<AppState>,
    query: Result<Query<NameSearchQuery>, QueryRejection>,
) -> AppResult<Json<Vec<ProductView>>> {
    let query = parse_query(query)?;
    Ok(Json(
        state
            .catalog()
            .search_by_name(query.search.as_deref(), query.category.as_deref())
            .await?,
    ))
}

async fn purchase(
    State(state): State<AppState>,
    body: Result<Json<PurchaseRequest>, JsonRejection>,
) -> AppResult<Json<PurchaseReport>> {
    let Json(request) = body.map_err(|r| AppError::validation(r.body_text()))?;
    Ok(Json(state.catalog().apply_purchase(&request.products).await?))
}
