//! Product query model and its SeaQuery rendering.
//!
//! Queries are built from a closed set of [`Constraint`]s and [`SortField`]s.
//! The same values are rendered to SQL for PostgreSQL and evaluated directly
//! by the memory store, so both backends agree on what a filter means.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr,
};
use uuid::Uuid;

use crate::models::Product;

/// Product table name.
pub(crate) const PRODUCT_TABLE: &str = "product";

/// Columns selected for a [`Product`] (everything except the photo).
pub(crate) const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "price",
    "quantity",
    "sold",
    "shipping",
    "category",
    "subcategory",
    "sub_subcategory",
    "created",
    "changed",
];

/// A product field holding a category reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryField {
    Category,
    Subcategory,
    SubSubcategory,
}

impl CategoryField {
    fn column(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::SubSubcategory => "sub_subcategory",
        }
    }

    fn value(self, product: &Product) -> Option<Uuid> {
        match self {
            Self::Category => product.category,
            Self::Subcategory => product.subcategory,
            Self::SubSubcategory => product.sub_subcategory,
        }
    }
}

/// One conjunct of a product filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The category field is one of `ids`.
    CategoryIn { field: CategoryField, ids: Vec<Uuid> },
    /// `min <= price <= max`.
    PriceBetween { min: f64, max: f64 },
    /// `shipping` is one of the given values.
    ShippingIn(Vec<bool>),
    /// Case-insensitive substring match on name. The needle is literal.
    NameContains(String),
    /// Exclude one product.
    NotId(Uuid),
}

impl Constraint {
    /// Evaluate against a product (memory backend).
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::CategoryIn { field, ids } => {
                field.value(product).is_some_and(|id| ids.contains(&id))
            }
            Self::PriceBetween { min, max } => product.price >= *min && product.price <= *max,
            Self::ShippingIn(values) => values.contains(&product.shipping),
            Self::NameContains(needle) => product
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Self::NotId(id) => product.id != *id,
        }
    }

    /// Render as a SQL condition (PostgreSQL backend).
    pub fn condition(&self) -> SimpleExpr {
        match self {
            Self::CategoryIn { field, ids } => col(field.column()).is_in(ids.iter().copied()),
            Self::PriceBetween { min, max } => Cond::all()
                .add(col("price").gte(*min))
                .add(col("price").lte(*max))
                .into(),
            Self::ShippingIn(values) => col("shipping").is_in(values.iter().copied()),
            Self::NameContains(needle) => Expr::cust_with_values(
                format!("{PRODUCT_TABLE}.name ILIKE $1"),
                [format!("%{}%", escape_like_wildcards(needle))],
            ),
            Self::NotId(id) => col("id").ne(*id),
        }
    }
}

/// Sortable product fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    Name,
    Price,
    Quantity,
    Sold,
    Created,
    Changed,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Price => "price",
            Self::Quantity => "quantity",
            Self::Sold => "sold",
            Self::Created => "created",
            Self::Changed => "changed",
        }
    }

    fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Name => a.name.cmp(&b.name),
            Self::Price => a.price.total_cmp(&b.price),
            Self::Quantity => a.quantity.cmp(&b.quantity),
            Self::Sold => a.sold.cmp(&b.sold),
            Self::Created => a.created.cmp(&b.created),
            Self::Changed => a.changed.cmp(&b.changed),
        }
    }
}

/// Error for unrecognized sort fields or orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSort(pub String);

impl fmt::Display for UnknownSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort option \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownSort {}

impl FromStr for SortField {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" | "_id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "quantity" => Ok(Self::Quantity),
            "sold" => Ok(Self::Sold),
            "created" | "createdAt" => Ok(Self::Created),
            "changed" | "updatedAt" => Ok(Self::Changed),
            other => Err(UnknownSort(other.to_string())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Asc),
            "desc" | "descending" | "-1" => Ok(Self::Desc),
            _ => Err(UnknownSort(s.to_string())),
        }
    }
}

/// A product query: constraints are ANDed; ties are broken by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub constraints: Vec<Constraint>,
    pub sort: SortField,
    pub order: SortOrder,
    pub skip: u64,
    /// `None` returns every match.
    pub limit: Option<u64>,
}

impl ProductQuery {
    /// Start a query with the given constraints.
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self {
            constraints,
            ..Default::default()
        }
    }

    /// Set sort field and direction.
    pub fn sorted(mut self, sort: SortField, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    /// Set skip and limit.
    pub fn paged(mut self, skip: u64, limit: Option<u64>) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }

    /// Whether a product satisfies every constraint.
    pub fn matches(&self, product: &Product) -> bool {
        self.constraints.iter().all(|c| c.matches(product))
    }

    /// Ordering between two products under this query's sort.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let ord = self.sort.compare(a, b);
        let ord = match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }

    /// Build the SELECT statement.
    pub fn to_sql(&self) -> String {
        let mut query = Query::select();

        query.columns(
            PRODUCT_COLUMNS
                .iter()
                .map(|c| (Alias::new(PRODUCT_TABLE), Alias::new(*c))),
        );
        query.from(Alias::new(PRODUCT_TABLE));
        add_constraints(&mut query, &self.constraints);

        let order = match self.order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        query.order_by(
            (Alias::new(PRODUCT_TABLE), Alias::new(self.sort.column())),
            order,
        );
        if self.sort != SortField::Id {
            query.order_by((Alias::new(PRODUCT_TABLE), Alias::new("id")), Order::Asc);
        }

        if let Some(limit) = self.limit {
            query.limit(limit);
        }
        if self.skip > 0 {
            query.offset(self.skip);
        }

        query.to_string(PostgresQueryBuilder)
    }
}

/// Build a COUNT query over the given constraints.
pub fn count_sql(constraints: &[Constraint]) -> String {
    let mut query = Query::select();
    query.expr(Expr::col(Asterisk).count());
    query.from(Alias::new(PRODUCT_TABLE));
    add_constraints(&mut query, constraints);
    query.to_string(PostgresQueryBuilder)
}

fn add_constraints(query: &mut SelectStatement, constraints: &[Constraint]) {
    for constraint in constraints {
        query.and_where(constraint.condition());
    }
}

fn col(name: &str) -> Expr {
    Expr::col((Alias::new(PRODUCT_TABLE), Alias::new(name)))
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
