//! Storefront test utilities.
//!
//! Helpers for integration testing: product form fixtures, multipart body
//! encoding, and JSON assertion utilities.

use uuid::Uuid;

/// Smallest valid PNG: a 1x1 transparent pixel.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Boundary used by [`MultipartBody`].
pub const BOUNDARY: &str = "storefront-test-boundary";

/// A category name that won't collide with other tests.
///
/// Stays within the 32 character name limit.
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::now_v7().simple().to_string();
    let prefix: String = prefix.chars().take(15).collect();
    format!("{prefix}-{}", &suffix[suffix.len() - 16..])
}

/// Create a product form fixture with default values and a PNG photo.
pub fn test_product(name: &str, category: Uuid) -> TestProduct {
    TestProduct {
        name: name.to_string(),
        description: format!("{name} description"),
        price: 10.0,
        quantity: 10,
        shipping: true,
        category: Some(category),
        subcategory: None,
        sub_subcategory: None,
        photo: Some((TINY_PNG.to_vec(), "image/png".to_string())),
    }
}

/// A product form builder.
#[derive(Debug, Clone)]
pub struct TestProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub shipping: bool,
    pub category: Option<Uuid>,
    pub subcategory: Option<Uuid>,
    pub sub_subcategory: Option<Uuid>,
    pub photo: Option<(Vec<u8>, String)>,
}

impl TestProduct {
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    pub fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn without_shipping(mut self) -> Self {
        self.shipping = false;
        self
    }

    pub fn with_subcategory(mut self, id: Uuid) -> Self {
        self.subcategory = Some(id);
        self
    }

    pub fn with_sub_subcategory(mut self, id: Uuid) -> Self {
        self.sub_subcategory = Some(id);
        self
    }

    /// Replace the photo.
    pub fn with_photo(mut self, data: Vec<u8>, content_type: &str) -> Self {
        self.photo = Some((data, content_type.to_string()));
        self
    }

    /// Drop the photo.
    pub fn without_photo(mut self) -> Self {
        self.photo = None;
        self
    }

    /// Encode as a multipart form.
    pub fn to_multipart(&self) -> MultipartBody {
        let mut body = MultipartBody::new()
            .text("name", &self.name)
            .text("description", &self.description)
            .text("price", &self.price.to_string())
            .text("quantity", &self.quantity.to_string())
            .text("shipping", if self.shipping { "1" } else { "0" });

        for (key, id) in [
            ("category", self.category),
            ("subcategory", self.subcategory),
            ("subSubcategory", self.sub_subcategory),
        ] {
            if let Some(id) = id {
                body = body.text(key, &id.to_string());
            }
        }
        if let Some((data, content_type)) = &self.photo {
            body = body.file("photo", "photo", content_type, data);
        }
        body
    }
}

/// A `multipart/form-data` body encoder.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text part.
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    /// Add a file part.
    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    /// Value for the request's Content-Type header.
    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    /// Close the form and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.bytes
    }
}

/// Assertion helpers for JSON responses.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that an `{"error": ...}` body mentions a substring.
    pub fn error_contains(value: &Value, needle: &str) {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected error to contain '{}'\nActual: {}",
            needle,
            value
        );
    }

    /// Assert that a JSON array holds exactly these names, in order.
    pub fn names(value: &Value, expected: &[&str]) {
        let actual: Vec<&str> = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        assert_eq!(actual, expected, "name mismatch in: {}", value);
    }
}
