//! Test utilities for database operations.
//!
//! Most tests run against a fresh in-memory `SQLite` store created by
//! [`TestDatabase::in_memory`]. [`TestDatabase::postgres`] connects to a real
//! `PostgreSQL` instance for the ignored integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Set,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{PostType, UserRole, post, user};
use crate::migrations::Migrator;

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "civic_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "civic_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "civic_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create an empty, migrated in-memory `SQLite` database.
    ///
    /// Every call yields an independent store.
    pub async fn in_memory() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        // One connection: a second one would open a different database
        opt.max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Connect to a `PostgreSQL` test database and run migrations.
    pub async fn postgres(config: &TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.conn)
    }

    /// Insert a user whose token is `{username}-token`.
    pub async fn insert_user(
        &self,
        id: &str,
        username: &str,
        role: UserRole,
    ) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(username.to_string()),
            display_name: Set(username.to_string()),
            role: Set(role),
            token: Set(Some(format!("{username}-token"))),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Insert a bare post without a poll or petition row.
    pub async fn insert_post(
        &self,
        id: &str,
        author_id: &str,
        post_type: PostType,
    ) -> Result<post::Model, DbErr> {
        let now = Utc::now();
        post::ActiveModel {
            id: Set(id.to_string()),
            title: Set(format!("Post {id}")),
            content: Set("Body".to_string()),
            post_type: Set(post_type),
            author_id: Set(author_id.to_string()),
            category_id: Set(None),
            tags: Set(serde_json::json!([])),
            views: Set(0),
            upvotes: Set(0),
            downvotes: Set(0),
            score: Set(0),
            comments_count: Set(0),
            is_pinned: Set(false),
            is_locked: Set(false),
            is_featured: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn.as_ref())
        .await
    }

    /// Delete every forum row, keeping the schema.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let backend = self.conn.get_database_backend();
        // Children first so foreign keys never block a delete
        for table in [
            "comment_vote",
            "comment",
            "petition_signature",
            "petition",
            "poll_vote",
            "poll_option",
            "poll",
            "post_vote",
            "post",
            "category",
            "user",
        ] {
            self.conn
                .execute(Statement::from_string(
                    backend,
                    format!("DELETE FROM \"{table}\""),
                ))
                .await?;
        }

        info!("Cleaned up test database");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_db_config_url() {
        let config = TestDbConfig {
            host: "db".to_string(),
            port: 5432,
            username: "u".to_string(),
            password: "p".to_string(),
            database: "civic".to_string(),
        };
        assert_eq!(config.database_url(), "postgres://u:p@db:5432/civic");
    }

    #[tokio::test]
    async fn test_in_memory_is_migrated_and_cleanable() {
        let db = TestDatabase::in_memory().await.unwrap();
        db.cleanup().await.unwrap();
    }
}
