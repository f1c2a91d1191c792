//! Category API routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{Category, CategoryInput, CategoryListing, CategoryNode};
use crate::services::catalog_query::parse_id;
use crate::state::AppState;

/// Create the category router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/category/create", post(create_category))
        .route(
            "/api/category/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/api/categories", get(list_categories))
        .route("/api/categories/main", get(list_main))
        .route("/api/categories/subcategories/{parent}", get(list_children))
        .route("/api/categories/tree", get(category_tree))
}

#[derive(Serialize)]
struct CreatedResponse {
    data: Category,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

fn parse_input(body: Result<Json<CategoryInput>, JsonRejection>) -> AppResult<CategoryInput> {
    body.map(|Json(input)| input)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

async fn create_category(
    State(state): State<AppState>,
    body: Result<Json<CategoryInput>, JsonRejection>,
) -> AppResult<Json<CreatedResponse>> {
    let input = parse_input(body)?;
    let data = state.categories().create(&input.name, input.parent).await?;
    Ok(Json(CreatedResponse { data }))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Category>> {
    let id = parse_id(&id, "category")?;
    Ok(Json(state.categories().get(id).await?))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<CategoryInput>, JsonRejection>,
) -> AppResult<Json<Category>> {
    let id = parse_id(&id, "category")?;
    let input = parse_input(body)?;
    Ok(Json(
        state
            .categories()
            .update(id, &input.name, input.parent)
            .await?,
    ))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "category")?;
    let deleted = state.categories().delete(id).await?;

    let message = if deleted.children > 0 {
        format!(
            "Category \"{}\" and {} subcategory(ies) deleted",
            deleted.name, deleted.children
        )
    } else {
        format!("Category \"{}\" deleted", deleted.name)
    };
    Ok(Json(MessageResponse { message }))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryListing>>> {
    Ok(Json(state.categories().list_all().await?))
}

async fn list_main(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.categories().list_main().await?))
}

async fn list_children(
    State(state): State<AppState>,
    Path(parent): Path<String>,
) -> AppResult<Json<Vec<Category>>> {
    let parent = parse_id(&parent, "category")?;
    Ok(Json(state.categories().list_children(parent).await?))
}

async fn category_tree(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryNode>>> {
    Ok(Json(state.categories().tree().await?))
}
