#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Each [`TestApp`] runs the real router and services. [`TestApp::new`] uses a
//! fresh in-memory catalog store, so those tests are isolated and need no
//! database. [`TestApp::postgres`] connects to `DATABASE_URL` and applies the
//! migrations; its tests share that database and must use unique names.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use storefront::store::{CatalogStore, MemoryCatalogStore};
use storefront::config::StoreBackend;
use storefront::{AppState, Config, routes};
use storefront_test_utils::{MultipartBody, TestProduct};

/// Test application wrapper using the real routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Default configuration over an empty memory store.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Category deletes check usage first and remove nothing when refused.
    pub fn guarded() -> Self {
        Self::with_config(Config {
            category_delete_guard: true,
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let store: Arc<dyn CatalogStore> = Arc::new(MemoryCatalogStore::new());
        let state = AppState::with_store(store, &config);
        let router = routes::app(state.clone(), &config);
        Self { router, state }
    }

    /// Default configuration over PostgreSQL, or `None` when `DATABASE_URL`
    /// is not set.
    pub async fn postgres() -> Option<Self> {
        Self::postgres_with(Config::default()).await
    }

    pub async fn postgres_with(config: Config) -> Option<Self> {
        dotenvy::dotenv().ok();
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };

        let config = Config {
            store: StoreBackend::Postgres,
            database_url: Some(url),
            database_max_connections: 2,
            ..config
        };
        let state = AppState::new(&config)
            .await
            .expect("Failed to initialize AppState");
        let router = routes::app(state.clone(), &config);
        Some(Self { router, state })
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request and decode the JSON response.
    pub async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.request(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(json_request("POST", uri, &body)).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(json_request("PUT", uri, &body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.json(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Create a category over HTTP and return its id.
    pub async fn create_category(&self, name: &str, parent: Option<Uuid>) -> Uuid {
        let (status, body) = self
            .post_json(
                "/api/category/create",
                serde_json::json!({"name": name, "parent": parent}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create category failed: {body}");
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    /// Create a product over HTTP and return its id.
    pub async fn create_product(&self, product: &TestProduct) -> Uuid {
        let (status, body) = self
            .json(multipart_request("POST", "/api/product/create", product.to_multipart()))
            .await;
        assert_eq!(status, StatusCode::OK, "create product failed: {body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn multipart_request(method: &str, uri: &str, body: MultipartBody) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, MultipartBody::content_type())
        .body(Body::from(body.finish()))
        .unwrap()
}

/// Collect a response body as JSON (`Null` when empty or not JSON).
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
