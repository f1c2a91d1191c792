//! Storefront catalog library.
//!
//! Category hierarchy, product catalog queries and the REST API over them.
//! The `storefront` binary wires these together; the library is exposed for
//! integration testing.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;
