use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_core::{CategoryId, DomainError, Entity, UserId};

/// Product category. Categories form a forest through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;
    const MODEL_NAME: &'static str = "Category";

    fn id(&self) -> CategoryId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn into_category(self, created_by: UserId, now: DateTime<Utc>) -> Result<Category, DomainError> {
        Ok(Category {
            id: CategoryId::new(),
            name: clean_name(&self.name)?,
            parent_id: self.parent_id,
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    /// `Some(None)` makes the category a root.
    pub parent_id: Option<Option<CategoryId>>,
}

impl Category {
    /// Apply an update. Cycle detection needs the whole tree and is done by
    /// the caller with [`would_create_cycle`] first.
    pub fn apply(&mut self, update: CategoryUpdate, now: DateTime<Utc>) -> Result<(), DomainError> {
        let name = update.name.as_deref().map(clean_name).transpose()?;
        if let Some(Some(parent)) = update.parent_id {
            if parent == self.id {
                return Err(DomainError::validation("category cannot be its own parent"));
            }
        }

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(parent_id) = update.parent_id {
            self.parent_id = parent_id;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Would re-parenting `category` under `new_parent` create a cycle?
///
/// Walks up from `new_parent` using `parent_of`. The walk is bounded by
/// `max_depth` so a corrupted tree cannot loop forever.
pub fn would_create_cycle(
    category: CategoryId,
    new_parent: CategoryId,
    max_depth: usize,
    parent_of: impl Fn(CategoryId) -> Option<CategoryId>,
) -> bool {
    let mut cursor = Some(new_parent);
    let mut steps = 0;
    while let Some(current) = cursor {
        if current == category || steps > max_depth {
            return true;
        }
        cursor = parent_of(current);
        steps += 1;
    }
    false
}

fn clean_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    if name.chars().count() > 100 {
        return Err(DomainError::validation("category name exceeds 100 characters"));
    }
    Ok(name.to_string())
}
