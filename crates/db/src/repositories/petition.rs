//! Petition repository.

use std::sync::Arc;

use crate::entities::{Petition, PetitionSignature, petition, petition_signature};
use chrono::Utc;
use civic_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

/// Petition repository for database operations.
#[derive(Clone)]
pub struct PetitionRepository {
    db: Arc<DatabaseConnection>,
}

impl PetitionRepository {
    /// Create a new petition repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the petition owned by a post.
    pub async fn find_by_post_id(&self, post_id: &str) -> AppResult<Option<petition::Model>> {
        Petition::find_by_id(post_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the petition owned by a post, returning error if not found.
    pub async fn get_by_post_id(&self, post_id: &str) -> AppResult<petition::Model> {
        self.find_by_post_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Petition not found for post: {post_id}")))
    }

    /// Store a signature and count it.
    ///
    /// Reaching the goal marks the petition successful; the flag is never
    /// cleared. A second signature by the same viewer is a conflict.
    pub async fn record_signature(
        &self,
        post_id: &str,
        user_id: &str,
        comment: Option<String>,
        is_anonymous: bool,
    ) -> AppResult<petition::Model> {
        let signature = petition_signature::ActiveModel {
            post_id: Set(post_id.to_string()),
            user_id: Set(user_id.to_string()),
            comment: Set(comment),
            is_anonymous: Set(is_anonymous),
            created_at: Set(Utc::now()),
        };
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PetitionSignature::insert(signature)
            .exec_without_returning(&txn)
            .await
            .map_err(|e| super::conflict_or_database(e, "Petition already signed"))?;

        Petition::update_many()
            .col_expr(
                petition::Column::Signatures,
                Expr::col(petition::Column::Signatures).add(1),
            )
            .filter(petition::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Petition::update_many()
            .col_expr(petition::Column::IsSuccessful, Expr::value(true))
            .filter(petition::Column::PostId.eq(post_id))
            .filter(petition::Column::IsSuccessful.eq(false))
            .filter(Expr::col(petition::Column::Signatures).gte(Expr::col(petition::Column::Goal)))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Petition::find_by_id(post_id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Petition not found for post: {post_id}")))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(updated)
    }
}

/// Access to individual petition signatures.
#[derive(Clone)]
pub struct PetitionSignatureRepository {
    db: Arc<DatabaseConnection>,
}

impl PetitionSignatureRepository {
    /// Create a new petition signature repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Whether the viewer has signed the petition.
    pub async fn exists(&self, post_id: &str, user_id: &str) -> AppResult<bool> {
        let count = PetitionSignature::find()
            .filter(petition_signature::Column::PostId.eq(post_id))
            .filter(petition_signature::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Signatures of a petition, newest first.
    pub async fn find_by_post(
        &self,
        post_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<petition_signature::Model>> {
        PetitionSignature::find()
            .filter(petition_signature::Column::PostId.eq(post_id))
            .order_by_desc(petition_signature::Column::CreatedAt)
            .order_by_asc(petition_signature::Column::UserId)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{PostType, UserRole, post};
    use crate::repositories::{NewPostPayload, PostRepository};
    use crate::test_utils::TestDatabase;

    async fn setup_petition(db: &TestDatabase, goal: i32) {
        db.insert_user("u1", "alice", UserRole::Citizen).await.unwrap();
        db.insert_user("u2", "bob", UserRole::Citizen).await.unwrap();

        let now = Utc::now();
        let post = post::ActiveModel {
            id: Set("p1".to_string()),
            title: Set("More benches".to_string()),
            content: Set("Please".to_string()),
            post_type: Set(PostType::Petition),
            author_id: Set("u1".to_string()),
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
        };
        let petition = petition::ActiveModel {
            post_id: Set("p1".to_string()),
            target: Set("City Council".to_string()),
            goal: Set(goal),
            signatures: Set(0),
            deadline: Set(None),
            is_successful: Set(false),
            created_at: Set(now),
        };

        PostRepository::new(db.connection())
            .create_with_payload(post, NewPostPayload::Petition(petition))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_signatures_reach_goal() {
        let db = TestDatabase::in_memory().await.unwrap();
        setup_petition(&db, 2).await;
        let repo = PetitionRepository::new(db.connection());

        let petition = repo.record_signature("p1", "u1", None, false).await.unwrap();
        assert_eq!(petition.signatures, 1);
        assert!(!petition.is_successful);

        let petition = repo
            .record_signature("p1", "u2", Some("Yes!".to_string()), true)
            .await
            .unwrap();
        assert_eq!(petition.signatures, 2);
        assert!(petition.is_successful);
    }

    #[tokio::test]
    async fn test_double_signature_is_conflict_and_count_unchanged() {
        let db = TestDatabase::in_memory().await.unwrap();
        setup_petition(&db, 10).await;
        let repo = PetitionRepository::new(db.connection());

        repo.record_signature("p1", "u1", None, false).await.unwrap();
        let result = repo.record_signature("p1", "u1", None, false).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let petition = repo.get_by_post_id("p1").await.unwrap();
        assert_eq!(petition.signatures, 1);

        let signatures = PetitionSignatureRepository::new(db.connection());
        assert!(signatures.exists("p1", "u1").await.unwrap());
        assert!(!signatures.exists("p1", "u2").await.unwrap());
        assert_eq!(signatures.find_by_post("p1", 10, 0).await.unwrap().len(), 1);
    }
}
