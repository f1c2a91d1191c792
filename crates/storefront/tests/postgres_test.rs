#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Catalog behavior against PostgreSQL.
//!
//! Runs when `DATABASE_URL` points at a scratch database and returns early
//! otherwise. Tests share the database, so every category name is unique and
//! product assertions stay inside a category created by the test.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use storefront::Config;
use storefront_test_utils::{MultipartBody, TINY_PNG, assert, test_product, unique_name};
use uuid::Uuid;

use common::{TestApp, body_bytes, multipart_request};

async fn stock(app: &TestApp, id: Uuid) -> (i64, i64) {
    let (_, product) = app.get(&format!("/api/product/{id}")).await;
    (
        product["quantity"].as_i64().unwrap(),
        product["sold"].as_i64().unwrap(),
    )
}

fn count_named(list: &Value, name: &str) -> usize {
    list.as_array()
        .unwrap()
        .iter()
        .filter(|c| c["name"] == name)
        .count()
}

// -------------------------------------------------------------------------
// Categories
// -------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_name_translated_to_validation() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let name = unique_name("Electronics");
    app.create_category(&name, None).await;

    let (status, body) = app
        .post_json("/api/category/create", json!({"name": name}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "already exists");

    let (_, all) = app.get("/api/categories").await;
    assert_eq!(count_named(&all, &name), 1);

    // Renames hit the same constraint
    let other = app.create_category(&unique_name("Music"), None).await;
    let (status, body) = app
        .put_json(&format!("/api/category/{other}"), json!({"name": name}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "already exists");
}

#[tokio::test]
async fn subcategory_flag_tracks_parent() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let root = app.create_category(&unique_name("Electronics"), None).await;
    let name = unique_name("Phones");

    let (_, created) = app
        .post_json("/api/category/create", json!({"name": name, "parent": root}))
        .await;
    assert_eq!(created["data"]["isSubcategory"], true);
    assert_eq!(created["data"]["parent"], json!(root));
    assert!(created["data"]["created"].as_i64().unwrap() > 0);
    let phones = created["data"]["id"].as_str().unwrap().to_string();

    let (_, updated) = app
        .put_json(&format!("/api/category/{phones}"), json!({"name": name}))
        .await;
    assert_eq!(updated["isSubcategory"], false);
    assert!(updated["parent"].is_null());

    let (_, children) = app
        .get(&format!("/api/categories/subcategories/{root}"))
        .await;
    assert!(children.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn refused_delete_still_removes_children() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let root = app.create_category(&unique_name("Electronics"), None).await;
    let phones = app.create_category(&unique_name("Phones"), Some(root)).await;
    app.create_product(&test_product("Pixel", root)).await;

    let (status, body) = app.delete(&format!("/api/category/{root}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "1 product(s)");

    let (status, _) = app.get(&format!("/api/category/{root}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/category/{phones}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guarded_delete_is_all_or_nothing() {
    let Some(app) = TestApp::postgres_with(Config {
        category_delete_guard: true,
        ..Config::default()
    })
    .await
    else {
        return;
    };
    let root = app.create_category(&unique_name("Electronics"), None).await;
    let phones = app.create_category(&unique_name("Phones"), Some(root)).await;
    let other = app.create_category(&unique_name("Gadgets"), None).await;
    let pixel = app
        .create_product(&test_product("Pixel", other).with_subcategory(root))
        .await;

    let (status, _) = app.delete(&format!("/api/category/{root}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get(&format!("/api/category/{phones}")).await;
    assert_eq!(status, StatusCode::OK);

    app.delete(&format!("/api/product/{pixel}")).await;
    let (status, body) = app.delete(&format!("/api/category/{root}")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("1 subcategory"));
    let (status, _) = app.get(&format!("/api/category/{phones}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/category/{root}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -------------------------------------------------------------------------
// Products
// -------------------------------------------------------------------------

#[tokio::test]
async fn price_range_is_inclusive() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let cat = app.create_category(&unique_name("Books"), None).await;
    for (name, price) in [("Novel", 10.0), ("Atlas", 15.0), ("Guide", 20.0), ("Album", 25.0)] {
        app.create_product(&test_product(name, cat).with_price(price))
            .await;
    }

    let (status, page) = app
        .post_json(
            "/api/products/by/search",
            json!({
                "sortBy": "price",
                "order": "asc",
                "filters": {"category": [cat], "price": [15, 20]},
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert::names(&page["data"], &["Atlas", "Guide"]);
    assert_eq!(page["size"], 2);
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"][0]["category"]["id"], json!(cat));
}

#[tokio::test]
async fn update_without_photo_keeps_stored_photo() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let cat = app.create_category(&unique_name("Electronics"), None).await;
    let id = app.create_product(&test_product("Pixel", cat)).await;

    let form = MultipartBody::new().text("price", "450");
    let (status, product) = app
        .json(multipart_request("PUT", &format!("/api/product/{id}"), form))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price"], 450.0);
    assert_eq!(product["name"], "Pixel");

    let response = app
        .request(
            Request::get(format!("/api/product/photo/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, TINY_PNG);
}

#[tokio::test]
async fn purchase_is_not_idempotent() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let cat = app.create_category(&unique_name("Electronics"), None).await;
    let cable = app.create_product(&test_product("Cable", cat)).await;
    let ghost = Uuid::now_v7();
    let order = json!({"products": [
        {"_id": cable, "count": 2},
        {"_id": ghost, "count": 1},
    ]});

    let (status, report) = app.post_json("/api/products/purchase", order.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["applied"], json!([cable]));
    assert_eq!(report["missing"], json!([ghost]));
    assert_eq!(stock(&app, cable).await, (8, 2));

    app.post_json("/api/products/purchase", order).await;
    assert_eq!(stock(&app, cable).await, (6, 4));
}

#[tokio::test]
async fn purchase_sums_repeated_lines() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let cat = app.create_category(&unique_name("Electronics"), None).await;
    let mouse = app.create_product(&test_product("Mouse", cat)).await;

    let (_, report) = app
        .post_json(
            "/api/products/purchase",
            json!({"products": [
                {"product": mouse, "count": 1},
                {"product": mouse, "count": 3},
            ]}),
        )
        .await;
    assert_eq!(report["applied"], json!([mouse, mouse]));
    assert_eq!(stock(&app, mouse).await, (6, 4));
}

#[tokio::test]
async fn purchase_overflow_fails_only_that_line() {
    let Some(app) = TestApp::postgres().await else {
        return;
    };
    let cat = app.create_category(&unique_name("Electronics"), None).await;
    let pixel = app.create_product(&test_product("Pixel", cat)).await;
    let cable = app.create_product(&test_product("Cable", cat)).await;

    let (status, _) = app
        .post_json(
            "/api/products/purchase",
            json!({"products": [{"product": pixel, "count": i32::MAX}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let before = stock(&app, pixel).await;

    let (status, report) = app
        .post_json(
            "/api/products/purchase",
            json!({"products": [
                {"product": pixel, "count": i32::MAX},
                {"product": cable, "count": 1},
            ]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["failed"], json!([pixel]));
    assert_eq!(report["applied"], json!([cable]));
    assert_eq!(stock(&app, pixel).await, before);
    assert_eq!(stock(&app, cable).await, (9, 1));
}
