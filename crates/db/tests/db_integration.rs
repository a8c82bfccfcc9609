//! Database integration tests.
//!
//! The `PostgreSQL` tests require a running instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `civic_test`)
//!   `TEST_DB_PASSWORD` (default: `civic_test`)
//!   `TEST_DB_NAME` (default: `civic_test`)

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use civic_db::entities::{UserRole, user};
use civic_db::repositories::UserRepository;
use civic_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn new_user(id: &str, username: &str) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(username.to_string()),
        display_name: Set(username.to_string()),
        role: Set(UserRole::Citizen),
        token: Set(Some(format!("{username}-token"))),
        created_at: Set(Utc::now()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_postgres_migrations_apply() {
    let db = TestDatabase::postgres(&TestDbConfig::default()).await;
    assert!(db.is_ok(), "Failed to connect: {:?}", db.err());
    db.unwrap().cleanup().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_user_roundtrip_by_token() {
    let db = TestDatabase::in_memory().await.unwrap();
    let repo = UserRepository::new(db.connection());

    repo.create(new_user("u1", "alice")).await.unwrap();

    let found = repo.find_by_token("alice-token").await.unwrap().unwrap();
    assert_eq!(found.username, "alice");
    assert!(repo.find_by_token("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_duplicate_username_is_conflict() {
    let db = TestDatabase::in_memory().await.unwrap();
    let repo = UserRepository::new(db.connection());

    repo.create(new_user("u1", "alice")).await.unwrap();
    let mut dup = new_user("u2", "alice");
    dup.token = Set(Some("other".to_string()));

    let err = repo.create(dup).await.unwrap_err();
    assert!(matches!(err, civic_common::AppError::Conflict(_)));
}
