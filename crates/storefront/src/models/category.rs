//! Category models: a self-referential hierarchy of main categories,
//! subcategories and sub-subcategories.
//!
//! The hierarchy is stored as a parent pointer on each category. Children are
//! never embedded; tree views are assembled from an adjacency index.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Longest accepted category name, in characters.
pub const MAX_CATEGORY_NAME_LEN: usize = 32;

/// A category. `parent == None` makes it a main category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Display name, unique across all categories.
    pub name: String,

    /// Parent category, if any.
    pub parent: Option<Uuid>,

    /// Always `parent.is_some()`; written by the store, never by callers.
    pub is_subcategory: bool,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

/// Parent reference populated into listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: Uuid,
    pub name: String,
}

/// A category with its parent's name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryListing {
    pub id: Uuid,
    pub name: String,
    pub parent: Option<ParentRef>,
    pub is_subcategory: bool,
    pub created: i64,
    pub changed: i64,
}

/// Tree node for hierarchical display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Input for creating or updating a category.
///
/// Updates replace both fields; omitting `parent` makes the category a main
/// category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "optional_id")]
    pub parent: Option<Uuid>,
}

/// Which categories a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryScope {
    /// Every category, ordered by `is_subcategory` then name.
    All,
    /// Categories without a parent, ordered by name.
    Main,
    /// Direct children of the given category, ordered by name.
    ChildrenOf(Uuid),
}

/// Outcome of an atomic guarded delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedDelete {
    /// The category and its direct children were removed.
    Removed { children: u64 },
    /// Nothing was removed; this many products still reference the category.
    InUse { count: u64 },
    /// No such category.
    NotFound,
}

impl CategoryListing {
    /// Populate parent names from a lookup of category id to name.
    pub fn from_category(category: Category, names: &HashMap<Uuid, String>) -> Self {
        let parent = category.parent.map(|id| ParentRef {
            id,
            name: names.get(&id).cloned().unwrap_or_default(),
        });

        Self {
            id: category.id,
            name: category.name,
            parent,
            is_subcategory: category.is_subcategory,
            created: category.created,
            changed: category.changed,
        }
    }
}

impl CategoryNode {
    /// Assemble a forest from a flat list.
    ///
    /// Roots and siblings keep the relative order of `categories`. A category
    /// whose parent is missing from the list becomes a root. Each id is placed
    /// at most once, so a corrupted cycle cannot recurse forever.
    pub fn build_forest(categories: Vec<Category>) -> Vec<CategoryNode> {
        let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();

        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        let mut roots = Vec::new();
        for category in &categories {
            match category.parent {
                Some(parent) if known.contains(&parent) && parent != category.id => {
                    children.entry(parent).or_default().push(category.id);
                }
                _ => roots.push(category.id),
            }
        }

        let mut by_id: HashMap<Uuid, Category> =
            categories.into_iter().map(|c| (c.id, c)).collect();
        let mut placed = HashSet::new();

        roots
            .into_iter()
            .filter_map(|id| Self::take_node(id, &mut by_id, &children, &mut placed))
            .collect()
    }

    fn take_node(
        id: Uuid,
        by_id: &mut HashMap<Uuid, Category>,
        children: &HashMap<Uuid, Vec<Uuid>>,
        placed: &mut HashSet<Uuid>,
    ) -> Option<CategoryNode> {
        if !placed.insert(id) {
            return None;
        }
        let category = by_id.remove(&id)?;
        let kids = children
            .get(&id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|child| Self::take_node(*child, by_id, children, placed))
                    .collect()
            })
            .unwrap_or_default();

        Some(CategoryNode {
            category,
            children: kids,
        })
    }
}

/// Accept a UUID, `null`, or an empty string (sent by forms for "no parent").
pub(crate) fn optional_id<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("null") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
