//! Category repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Category, Post, category, post};
use civic_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Repository for forum categories.
#[derive(Clone)]
pub struct CategoryRepository {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, FromQueryResult)]
struct CategoryPostCount {
    category_id: Option<String>,
    posts_count: i64,
}

impl CategoryRepository {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All categories in display order.
    pub async fn find_all(&self) -> AppResult<Vec<category::Model>> {
        Category::find()
            .order_by_asc(category::Column::Position)
            .order_by_asc(category::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a category by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<category::Model>> {
        Category::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a category by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<category::Model>> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of posts per category ID.
    pub async fn count_posts(&self) -> AppResult<HashMap<String, u64>> {
        let rows = Post::find()
            .select_only()
            .column(post::Column::CategoryId)
            .column_as(post::Column::Id.count(), "posts_count")
            .filter(post::Column::CategoryId.is_not_null())
            .group_by(post::Column::CategoryId)
            .into_model::<CategoryPostCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.category_id
                    .map(|id| (id, u64::try_from(row.posts_count).unwrap_or(0)))
            })
            .collect())
    }

    /// Create a new category.
    pub async fn create(&self, model: category::ActiveModel) -> AppResult<category::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| super::conflict_or_database(e, "Category slug already exists"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_category(id: &str, slug: &str, position: i32) -> category::Model {
        category::Model {
            id: id.to_string(),
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            description: None,
            color: "#10B981".to_string(),
            position,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_find_by_slug() {
        let category = create_test_category("c1", "policy", 0);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[category.clone()]])
                .into_connection(),
        );

        let repo = CategoryRepository::new(db);
        let found = repo.find_by_slug("policy").await.unwrap().unwrap();

        assert_eq!(found.id, "c1");
        assert_eq!(found.slug, "policy");
    }

    #[tokio::test]
    async fn test_find_all_returns_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_category("c1", "policy", 0),
                    create_test_category("c2", "environment", 1),
                ]])
                .into_connection(),
        );

        let repo = CategoryRepository::new(db);
        let all = repo.find_all().await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[1].slug, "environment");
    }
}
