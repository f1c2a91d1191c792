//! Domain models.

pub mod category;
pub mod product;

pub use category::{
    Category, CategoryInput, CategoryListing, CategoryNode, CategoryScope, GuardedDelete,
    MAX_CATEGORY_NAME_LEN, ParentRef,
};
pub use product::{
    NewProduct, Photo, Product, ProductUpdate, ProductView, PurchaseLine, PurchaseReport,
};
