//! Product catalog queries: listings, related products, filter search, name
//! search, photos and post-purchase stock adjustment.
//!
//! Filter bodies arrive as loose JSON and are parsed here into a closed set
//! of [`Constraint`]s. Unknown keys are rejected rather than passed through.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Category, Photo, Product, ProductView, PurchaseLine, PurchaseReport};
use crate::store::query::UnknownSort;
use crate::store::{
    CatalogStore, CategoryField, Constraint, ProductQuery, SortField, SortOrder, StoreError,
};

/// Default page size for attribute listings and related products.
pub const DEFAULT_LIST_LIMIT: u64 = 6;

/// Default page size for filter search.
pub const DEFAULT_SEARCH_LIMIT: u64 = 100;

/// Query string for attribute listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub limit: Option<String>,
}

/// Body of a filter search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub sort_by: Option<String>,
    pub order: Option<String>,
    /// Number or numeric string.
    pub limit: Option<Value>,
    /// Number or numeric string.
    pub skip: Option<Value>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

/// One page of filter search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    /// Products in this page.
    pub size: usize,
    /// Products matching the filters, ignoring skip and limit.
    pub total: u64,
    pub data: Vec<ProductView>,
}

/// Service for product catalog queries.
pub struct CatalogQuery {
    store: Arc<dyn CatalogStore>,
}

impl CatalogQuery {
    /// Create a new CatalogQuery.
    pub fn new(store: Arc<dyn CatalogStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }

    /// Products sorted by one attribute (`sold`, `createdAt`, ...).
    ///
    /// Defaults: sort by id, ascending, 6 results.
    pub async fn list_by_attribute(&self, params: &ListParams) -> AppResult<Vec<ProductView>> {
        let sort = parse_sort(params.sort_by.as_deref())?;
        let order = parse_order(params.order.as_deref(), SortOrder::Asc)?;
        let limit = parse_limit(params.limit.as_deref(), DEFAULT_LIST_LIMIT);

        let query = ProductQuery::default()
            .sorted(sort, order)
            .paged(0, limit);
        let products = self.store.find_products(&query).await?;
        self.populate(products).await
    }

    /// Products sharing the main category of `product_id`, excluding it.
    pub async fn list_related(
        &self,
        product_id: Uuid,
        limit: Option<&str>,
    ) -> AppResult<Vec<ProductView>> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or(AppError::NotFound("product"))?;

        let Some(category) = product.category else {
            return Ok(Vec::new());
        };

        let query = ProductQuery::new(vec![
            Constraint::NotId(product.id),
            Constraint::CategoryIn {
                field: CategoryField::Category,
                ids: vec![category],
            },
        ])
        .paged(0, parse_limit(limit, DEFAULT_LIST_LIMIT));

        let products = self.store.find_products(&query).await?;
        self.populate(products).await
    }

    /// Main category ids referenced by at least one product.
    pub async fn list_distinct_categories(&self) -> AppResult<Vec<Uuid>> {
        Ok(self.store.distinct_product_categories().await?)
    }

    /// Filtered, sorted, paginated search.
    ///
    /// Defaults: sort by id, descending, 100 results, no skip.
    pub async fn search_by_filters(&self, request: &SearchRequest) -> AppResult<SearchPage> {
        let constraints = parse_filters(&request.filters)?;
        let sort = parse_sort(request.sort_by.as_deref())?;
        let order = parse_order(request.order.as_deref(), SortOrder::Desc)?;
        let limit = parse_limit(
            value_as_text(request.limit.as_ref()).as_deref(),
            DEFAULT_SEARCH_LIMIT,
        );
        let skip = value_as_text(request.skip.as_ref())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);

        debug!(constraints = constraints.len(), ?sort, ?order, ?limit, skip, "product search");

        let total = self.store.count_products(&constraints).await?;
        let query = ProductQuery::new(constraints)
            .sorted(sort, order)
            .paged(skip, limit);
        let products = self.store.find_products(&query).await?;
        let data = self.populate(products).await?;

        Ok(SearchPage {
            size: data.len(),
            total,
            data,
        })
    }

    /// Case-insensitive substring search on name.
    ///
    /// `category` of `None`, `""` or `"All"` searches every category. An empty
    /// pattern matches nothing.
    pub async fn search_by_name(
        &self,
        pattern: Option<&str>,
        category: Option<&str>,
    ) -> AppResult<Vec<ProductView>> {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(Vec::new());
        };

        let mut constraints = vec![Constraint::NameContains(pattern.to_string())];
        match category.map(str::trim) {
            None | Some("") | Some("All") => {}
            Some(raw) => constraints.push(Constraint::CategoryIn {
                field: CategoryField::Category,
                ids: vec![parse_id(raw, "category")?],
            }),
        }

        let products = self
            .store
            .find_products(&ProductQuery::new(constraints))
            .await?;
        self.populate(products).await
    }

    pub async fn get_photo(&self, product_id: Uuid) -> AppResult<Photo> {
        self.store
            .product_photo(product_id)
            .await?
            .ok_or(AppError::NotFound("product photo"))
    }

    /// Decrement stock and increment sales for each ordered line.
    ///
    /// Lines are applied independently; unknown products are reported, not
    /// fatal. Applying the same order twice adjusts stock twice.
    pub async fn apply_purchase(&self, lines: &[PurchaseLine]) -> AppResult<PurchaseReport> {
        if let Some(line) = lines.iter().find(|l| l.count < 1) {
            return Err(AppError::validation(format!(
                "purchase count for product {} must be at least 1",
                line.product
            )));
        }
        if lines.is_empty() {
            return Ok(PurchaseReport::default());
        }

        let report = self.store.apply_stock_adjustments(lines).await?;
        for id in &report.missing {
            warn!(product = %id, "purchase references unknown product");
        }

        if report.applied.is_empty() && !report.failed.is_empty() {
            return Err(AppError::Datastore(StoreError::Other(format!(
                "stock adjustment failed for {} product(s)",
                report.failed.len()
            ))));
        }

        debug!(
            applied = report.applied.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "stock adjusted"
        );
        Ok(report)
    }

    /// Resolve category references with one batched lookup.
    pub(crate) async fn populate(&self, products: Vec<Product>) -> AppResult<Vec<ProductView>> {
        let mut ids: Vec<Uuid> = products.iter().flat_map(Product::category_refs).collect();
        ids.sort_unstable();
        ids.dedup();

        let categories: HashMap<Uuid, Category> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_categories(&ids)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(products
            .into_iter()
            .map(|p| ProductView::populate(p, &categories))
            .collect())
    }
}

/// Page size: absent uses the default; `0` or a non-number means no cap.
pub fn parse_limit(raw: Option<&str>, default: u64) -> Option<u64> {
    match raw {
        None => Some(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(limit) => Some(limit),
        },
    }
}

fn parse_sort(raw: Option<&str>) -> AppResult<SortField> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(SortField::default()),
        Some(raw) => raw.parse().map_err(|e: UnknownSort| AppError::validation(e.to_string())),
    }
}

fn parse_order(raw: Option<&str>, default: SortOrder) -> AppResult<SortOrder> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: UnknownSort| AppError::validation(e.to_string())),
    }
}

fn value_as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parse a filter object into constraints.
fn parse_filters(filters: &Map<String, Value>) -> AppResult<Vec<Constraint>> {
    let mut constraints = Vec::new();

    for (key, value) in filters {
        let values = match value {
            Value::Array(values) => values,
            Value::Null => continue,
            _ => {
                return Err(AppError::validation(format!(
                    "filter \"{key}\" must be an array"
                )));
            }
        };
        if values.is_empty() {
            continue;
        }

        let constraint = match key.as_str() {
            "category" => category_filter(CategoryField::Category, key, values)?,
            "subcategory" => category_filter(CategoryField::Subcategory, key, values)?,
            "subSubcategory" => category_filter(CategoryField::SubSubcategory, key, values)?,
            "price" => price_filter(values)?,
            "shipping" => Constraint::ShippingIn(
                values
                    .iter()
                    .map(shipping_value)
                    .collect::<AppResult<Vec<_>>>()?,
            ),
            other => {
                return Err(AppError::validation(format!("unknown filter \"{other}\"")));
            }
        };
        constraints.push(constraint);
    }

    Ok(constraints)
}

fn category_filter(field: CategoryField, key: &str, values: &[Value]) -> AppResult<Constraint> {
    let ids = values
        .iter()
        .map(|v| match v {
            Value::String(s) => parse_id(s, key),
            _ => Err(AppError::validation(format!(
                "filter \"{key}\" must contain category ids"
            ))),
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Constraint::CategoryIn { field, ids })
}

fn price_filter(values: &[Value]) -> AppResult<Constraint> {
    let bounds: Vec<f64> = values
        .iter()
        .filter_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite())
        .collect();

    match bounds.as_slice() {
        [min, max] if values.len() == 2 && min <= max => Ok(Constraint::PriceBetween {
            min: *min,
            max: *max,
        }),
        _ => Err(AppError::validation(
            "filter \"price\" must be [min, max] with min <= max",
        )),
    }
}

fn shipping_value(value: &Value) -> AppResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AppError::validation("filter \"shipping\" must contain booleans")),
        },
        _ => Err(AppError::validation("filter \"shipping\" must contain booleans")),
    }
}

/// Parse an id supplied by a client.
pub fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::validation(format!("invalid {what} id \"{raw}\"")))
}
