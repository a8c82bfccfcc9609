//! Category service.

use chrono::Utc;
use civic_common::{AppError, AppResult, IdGenerator};
use civic_db::{entities::category, repositories::CategoryRepository};
use sea_orm::Set;

/// Category service for business logic.
#[derive(Clone)]
pub struct CategoryService {
    category_repo: CategoryRepository,
    id_gen: IdGenerator,
}

/// A category with the number of posts filed under it.
#[derive(Debug, Clone)]
pub struct CategoryWithCount {
    pub category: category::Model,
    pub posts_count: u64,
}

/// Input for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: String,
    pub position: i32,
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl CategoryService {
    /// Create a new category service.
    #[must_use]
    pub const fn new(category_repo: CategoryRepository) -> Self {
        Self {
            category_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// All categories in display order with their post counts.
    pub async fn list(&self) -> AppResult<Vec<CategoryWithCount>> {
        let categories = self.category_repo.find_all().await?;
        let counts = self.category_repo.count_posts().await?;

        Ok(categories
            .into_iter()
            .map(|category| {
                let posts_count = counts.get(&category.id).copied().unwrap_or(0);
                CategoryWithCount {
                    category,
                    posts_count,
                }
            })
            .collect())
    }

    /// Find a category by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AppResult<Option<category::Model>> {
        self.category_repo.find_by_slug(slug).await
    }

    /// Create a category.
    pub async fn create(&self, input: CreateCategoryInput) -> AppResult<category::Model> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation(
                "Category name cannot be empty".to_string(),
            ));
        }
        if !is_valid_slug(&input.slug) {
            return Err(AppError::Validation(format!(
                "Invalid category slug: {}",
                input.slug
            )));
        }
        if !is_valid_color(&input.color) {
            return Err(AppError::Validation(format!(
                "Invalid category color: {}",
                input.color
            )));
        }

        let model = category::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name.trim().to_string()),
            slug: Set(input.slug),
            description: Set(input.description),
            color: Set(input.color),
            position: Set(input.position),
            created_at: Set(Utc::now()),
        };

        let category = self.category_repo.create(model).await?;
        tracing::info!(category_id = %category.id, slug = %category.slug, "Created category");
        Ok(category)
    }
}
