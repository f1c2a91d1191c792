#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Product record integration tests: multipart create/update, photos,
//! delete, and the health endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use storefront::Config;
use storefront_test_utils::{MultipartBody, TINY_PNG, assert, test_product};
use uuid::Uuid;

use common::{TestApp, body_bytes, multipart_request};

#[tokio::test]
async fn create_and_fetch_product() {
    let app = TestApp::new();
    let electronics = app.create_category("Electronics", None).await;
    let phones = app.create_category("Phones", Some(electronics)).await;

    let id = app
        .create_product(
            &test_product("Pixel", electronics)
                .with_subcategory(phones)
                .with_price(500.0)
                .with_quantity(10),
        )
        .await;

    let (status, product) = app.get(&format!("/api/product/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["name"], "Pixel");
    assert_eq!(product["price"], 500.0);
    assert_eq!(product["quantity"], 10);
    assert_eq!(product["sold"], 0);
    assert_eq!(product["shipping"], true);
    assert_eq!(product["category"]["name"], "Electronics");
    assert_eq!(product["subcategory"]["name"], "Phones");
    assert!(product["subSubcategory"].is_null());
    assert!(product.get("photo").is_none());
}

#[tokio::test]
async fn create_requires_photo_and_fields() {
    let app = TestApp::new();
    let cat = app.create_category("Electronics", None).await;

    let (status, body) = app
        .json(multipart_request(
            "POST",
            "/api/product/create",
            test_product("Pixel", cat).without_photo().to_multipart(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "photo");

    let form = MultipartBody::new()
        .text("name", "Pixel")
        .file("photo", "p.png", "image/png", TINY_PNG);
    let (status, body) = app
        .json(multipart_request("POST", "/api/product/create", form))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "description");
}

#[tokio::test]
async fn create_rejects_bad_photos() {
    let app = TestApp::with_config(Config {
        max_photo_bytes: 16,
        ..Config::default()
    });
    let cat = app.create_category("Electronics", None).await;

    let text = test_product("Pixel", cat).with_photo(b"hello".to_vec(), "text/plain");
    let (status, _) = app
        .json(multipart_request("POST", "/api/product/create", text.to_multipart()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let big = test_product("Pixel", cat).with_photo(vec![0; 17], "image/png");
    let (status, body) = app
        .json(multipart_request("POST", "/api/product/create", big.to_multipart()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "16 bytes");
}

#[tokio::test]
async fn create_rejects_unknown_category() {
    let app = TestApp::new();
    let (status, _) = app
        .json(multipart_request(
            "POST",
            "/api/product/create",
            test_product("Pixel", Uuid::now_v7()).to_multipart(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn photo_served_with_content_type() {
    let app = TestApp::new();
    let cat = app.create_category("Electronics", None).await;
    let id = app.create_product(&test_product("Pixel", cat)).await;

    let response = app
        .request(
            Request::get(format!("/api/product/photo/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(response).await, TINY_PNG);

    let (status, _) = app
        .get(&format!("/api/product/photo/{}", Uuid::now_v7()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_replaces_present_fields() {
    let app = TestApp::new();
    let cat = app.create_category("Electronics", None).await;
    let id = app.create_product(&test_product("Pixel", cat)).await;

    let form = MultipartBody::new()
        .text("price", "450")
        .text("shipping", "false");
    let (status, product) = app
        .json(multipart_request("PUT", &format!("/api/product/{id}"), form))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price"], 450.0);
    assert_eq!(product["shipping"], false);
    assert_eq!(product["name"], "Pixel");

    // The photo is untouched without a new one
    let response = app
        .request(
            Request::get(format!("/api/product/photo/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(body_bytes(response).await, TINY_PNG);
}

#[tokio::test]
async fn update_replaces_photo() {
    let app = TestApp::new();
    let cat = app.create_category("Electronics", None).await;
    let id = app.create_product(&test_product("Pixel", cat)).await;

    let form = MultipartBody::new().file("photo", "p.gif", "image/gif", b"GIF89a");
    let (status, _) = app
        .json(multipart_request("PUT", &format!("/api/product/{id}"), form))
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .request(
            Request::get(format!("/api/product/photo/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
    assert_eq!(body_bytes(response).await, b"GIF89a");
}

#[tokio::test]
async fn delete_product() {
    let app = TestApp::new();
    let cat = app.create_category("Electronics", None).await;
    let id = app.create_product(&test_product("Pixel", cat)).await;

    let (status, body) = app.delete(&format!("/api/product/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert::has_key(&body, "message");

    let (status, body) = app.get(&format!("/api/product/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert::error_contains(&body, "product not found");

    let (status, _) = app.delete(&format!("/api/product/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_product_id() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/product/12345").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert::error_contains(&body, "invalid product id");
}

#[tokio::test]
async fn health_reports_backend() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}
