//! Catalog services.

pub mod catalog_query;
pub mod category_tree;
pub mod products;

pub use catalog_query::{CatalogQuery, ListParams, SearchPage, SearchRequest};
pub use category_tree::{CategoryTree, DeletedCategory};
pub use products::ProductService;
