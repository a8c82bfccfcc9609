//! Initial data from configuration.

use civic_common::{AppError, AppResult, config::SeedConfig};
use civic_db::entities::UserRole;

use crate::services::category::{CategoryService, CreateCategoryInput};
use crate::services::user::{CreateUserInput, UserService};

/// Creates configured categories and users that do not exist yet.
#[derive(Clone)]
pub struct SeedService {
    category_service: CategoryService,
    user_service: UserService,
}

/// What a seeding run created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub users_created: usize,
}

impl SeedService {
    #[must_use]
    pub const fn new(category_service: CategoryService, user_service: UserService) -> Self {
        Self {
            category_service,
            user_service,
        }
    }

    /// Apply the seed configuration. Existing rows are left untouched, so
    /// running twice is harmless.
    pub async fn run(&self, seed: &SeedConfig) -> AppResult<SeedReport> {
        let mut report = SeedReport::default();
        if !seed.enabled {
            tracing::debug!("Seeding disabled");
            return Ok(report);
        }

        for (position, category) in seed.categories.iter().enumerate() {
            if self
                .category_service
                .find_by_slug(&category.slug)
                .await?
                .is_some()
            {
                continue;
            }
            self.category_service
                .create(CreateCategoryInput {
                    name: category.name.clone(),
                    slug: category.slug.clone(),
                    description: category.description.clone(),
                    color: category.color.clone(),
                    position: position as i32,
                })
                .await?;
            report.categories_created += 1;
        }

        for user in &seed.users {
            if self
                .user_service
                .find_by_username(&user.username)
                .await?
                .is_some()
            {
                continue;
            }
            let role = UserRole::parse(&user.role).ok_or_else(|| {
                AppError::Config(format!(
                    "Unknown role {:?} for seed user {}",
                    user.role, user.username
                ))
            })?;
            self.user_service
                .create(CreateUserInput {
                    username: user.username.clone(),
                    display_name: user.display_name.clone(),
                    role,
                    token: Some(user.token.clone()),
                })
                .await?;
            report.users_created += 1;
        }

        tracing::info!(
            categories = report.categories_created,
            users = report.users_created,
            "Seeded forum data"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_common::config::{SeedCategory, SeedUser};
    use civic_db::repositories::{CategoryRepository, UserRepository};
    use civic_db::test_utils::TestDatabase;

    fn seed_config(role: &str) -> SeedConfig {
        SeedConfig {
            enabled: true,
            categories: vec![SeedCategory {
                name: "Policy".to_string(),
                slug: "policy".to_string(),
                description: Some("Local policy".to_string()),
                color: "#3B82F6".to_string(),
            }],
            users: vec![SeedUser {
                username: "mayor".to_string(),
                display_name: "Mayor Johnson".to_string(),
                role: role.to_string(),
                token: "mayor-token".to_string(),
            }],
        }
    }

    async fn service(db: &TestDatabase) -> SeedService {
        SeedService::new(
            CategoryService::new(CategoryRepository::new(db.connection())),
            UserService::new(UserRepository::new(db.connection())),
        )
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = TestDatabase::in_memory().await.unwrap();
        let seeder = service(&db).await;

        let first = seeder.run(&seed_config("official")).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                categories_created: 1,
                users_created: 1
            }
        );

        let second = seeder.run(&seed_config("official")).await.unwrap();
        assert_eq!(second, SeedReport::default());

        let users = UserService::new(UserRepository::new(db.connection()));
        let mayor = users.authenticate_by_token("mayor-token").await.unwrap();
        assert_eq!(mayor.role, UserRole::Official);
    }

    #[tokio::test]
    async fn test_unknown_role_is_config_error() {
        let db = TestDatabase::in_memory().await.unwrap();
        let seeder = service(&db).await;

        let result = seeder.run(&seed_config("emperor")).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_disabled_seed_does_nothing() {
        let db = TestDatabase::in_memory().await.unwrap();
        let seeder = service(&db).await;

        let mut config = seed_config("official");
        config.enabled = false;
        assert_eq!(seeder.run(&config).await.unwrap(), SeedReport::default());
    }
}
