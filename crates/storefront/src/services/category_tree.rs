//! Category hierarchy service.
//!
//! Enforces name rules, parent validity, acyclicity and deletion safety on top
//! of the store. The store stays the arbiter for uniqueness: racing creates
//! are decided by its unique index or write lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    Category, CategoryListing, CategoryNode, CategoryScope, GuardedDelete, MAX_CATEGORY_NAME_LEN,
};
use crate::store::CatalogStore;

/// Outcome of a successful category delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedCategory {
    pub name: String,
    /// Direct children removed along with it.
    pub children: u64,
}

/// Service for the category hierarchy.
pub struct CategoryTree {
    store: Arc<dyn CatalogStore>,
    guarded_delete: bool,
}

impl CategoryTree {
    /// Create a new CategoryTree.
    ///
    /// With `guarded_delete`, the usage check runs before anything is removed
    /// and the whole delete is atomic.
    pub fn new(store: Arc<dyn CatalogStore>, guarded_delete: bool) -> Arc<Self> {
        Arc::new(Self {
            store,
            guarded_delete,
        })
    }

    pub async fn create(&self, name: &str, parent: Option<Uuid>) -> AppResult<Category> {
        let name = validate_name(name)?;
        if let Some(parent) = parent {
            self.require_parent(parent).await?;
        }

        let category = self.store.insert_category(name, parent).await?;
        info!(category_id = %category.id, name = %category.name, parent = ?parent, "category created");
        Ok(category)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Category> {
        self.store
            .find_category(id)
            .await?
            .ok_or(AppError::NotFound("category"))
    }

    /// Replace a category's name and parent.
    ///
    /// `parent == None` turns it into a main category. Moving a category under
    /// itself or one of its descendants is rejected.
    pub async fn update(&self, id: Uuid, name: &str, parent: Option<Uuid>) -> AppResult<Category> {
        let name = validate_name(name)?;
        self.get(id).await?;

        if let Some(parent) = parent {
            if parent == id {
                return Err(AppError::validation("a category cannot be its own parent"));
            }
            self.require_parent(parent).await?;
            if self.is_descendant(parent, id).await? {
                return Err(AppError::validation(
                    "a category cannot be moved under one of its descendants",
                ));
            }
        }

        let category = self
            .store
            .update_category(id, name, parent)
            .await?
            .ok_or(AppError::NotFound("category"))?;
        info!(category_id = %id, name = %category.name, parent = ?parent, "category updated");
        Ok(category)
    }

    /// Delete a category and its direct children.
    ///
    /// Grandchildren are left in place with a dangling parent. In the default
    /// mode the children are removed before the usage check, so they are gone
    /// even when the category itself is refused.
    pub async fn delete(&self, id: Uuid) -> AppResult<DeletedCategory> {
        let category = self.get(id).await?;

        if self.guarded_delete {
            return match self.store.delete_category_guarded(id).await? {
                GuardedDelete::Removed { children } => {
                    info!(category_id = %id, children, "category deleted");
                    Ok(DeletedCategory {
                        name: category.name,
                        children,
                    })
                }
                GuardedDelete::InUse { count } => {
                    warn!(category_id = %id, count, "category delete refused, in use");
                    Err(AppError::InUse {
                        name: category.name,
                        count,
                    })
                }
                GuardedDelete::NotFound => Err(AppError::NotFound("category")),
            };
        }

        let children = self.store.delete_children(id).await?;
        if children > 0 {
            debug!(category_id = %id, children, "removed child categories");
        }

        let count = self.store.count_category_references(id).await?;
        if count > 0 {
            warn!(category_id = %id, count, children, "category delete refused, in use");
            return Err(AppError::InUse {
                name: category.name,
                count,
            });
        }

        if !self.store.delete_category(id).await? {
            return Err(AppError::NotFound("category"));
        }
        info!(category_id = %id, children, "category deleted");

        Ok(DeletedCategory {
            name: category.name,
            children,
        })
    }

    /// Every category, main categories first, each with its parent's name.
    pub async fn list_all(&self) -> AppResult<Vec<CategoryListing>> {
        let categories = self.store.list_categories(CategoryScope::All).await?;
        let names: HashMap<Uuid, String> = categories
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect();

        Ok(categories
            .into_iter()
            .map(|c| CategoryListing::from_category(c, &names))
            .collect())
    }

    pub async fn list_main(&self) -> AppResult<Vec<Category>> {
        Ok(self.store.list_categories(CategoryScope::Main).await?)
    }

    pub async fn list_children(&self, parent: Uuid) -> AppResult<Vec<Category>> {
        Ok(self
            .store
            .list_categories(CategoryScope::ChildrenOf(parent))
            .await?)
    }

    /// The whole hierarchy as nested nodes, siblings sorted by name.
    pub async fn tree(&self) -> AppResult<Vec<CategoryNode>> {
        let mut categories = self.store.list_categories(CategoryScope::All).await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(CategoryNode::build_forest(categories))
    }

    async fn require_parent(&self, parent: Uuid) -> AppResult<()> {
        match self.store.find_category(parent).await? {
            Some(_) => Ok(()),
            None => Err(AppError::validation("parent category does not exist")),
        }
    }

    /// Whether `candidate` sits somewhere below `ancestor`.
    async fn is_descendant(&self, candidate: Uuid, ancestor: Uuid) -> AppResult<bool> {
        let mut seen = HashSet::new();
        let mut current = Some(candidate);

        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            if !seen.insert(id) {
                break;
            }
            current = self.store.find_category(id).await?.and_then(|c| c.parent);
        }
        Ok(false)
    }
}

/// Trim and check a category name.
fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("category name is required"));
    }
    if name.chars().count() > MAX_CATEGORY_NAME_LEN {
        return Err(AppError::validation(format!(
            "category name must be at most {MAX_CATEGORY_NAME_LEN} characters"
        )));
    }
    Ok(name)
}
