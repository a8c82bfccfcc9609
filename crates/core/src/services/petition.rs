//! Petition service.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use civic_common::{AppError, AppResult};
use civic_db::{
    entities::{PostType, petition, user},
    repositories::{
        NewPostPayload, PetitionRepository, PetitionSignatureRepository, PostRepository,
        UserRepository, from_column, to_column,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::engine::{self, PetitionSnapshot};

/// Largest accepted signature goal.
pub const MAX_GOAL: u32 = 10_000_000;

/// Petition service for business logic.
#[derive(Clone)]
pub struct PetitionService {
    petition_repo: PetitionRepository,
    signature_repo: PetitionSignatureRepository,
    post_repo: PostRepository,
    user_repo: UserRepository,
}

/// Petition part of a new `petition` post.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePetitionInput {
    /// Who the petition addresses
    #[validate(length(min = 1, max = 200))]
    pub target: String,

    #[validate(range(min = 1, max = 10000000))]
    pub goal: u32,

    pub deadline: Option<DateTime<Utc>>,
}

/// Input for signing a petition.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignPetitionInput {
    #[validate(length(max = 500))]
    pub comment: Option<String>,

    #[serde(default)]
    pub is_anonymous: bool,
}

/// Petition with the viewer's signature status.
#[derive(Debug, Clone)]
pub struct PetitionDetails {
    pub petition: petition::Model,
    pub user_signed: bool,
}

impl PetitionDetails {
    /// Whether the petition still accepts signatures at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        engine::is_open(self.petition.deadline, now)
    }

    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        engine::progress_percentage(
            from_column(self.petition.signatures),
            from_column(self.petition.goal),
        )
    }
}

/// A public signature entry. `signer` is hidden for anonymous signatures.
#[derive(Debug, Clone)]
pub struct SignatureDetails {
    pub signer: Option<user::Model>,
    pub comment: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl PetitionService {
    /// Create a new petition service.
    #[must_use]
    pub const fn new(
        petition_repo: PetitionRepository,
        signature_repo: PetitionSignatureRepository,
        post_repo: PostRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            petition_repo,
            signature_repo,
            post_repo,
            user_repo,
        }
    }

    /// Validate petition input and build the row stored with a new post.
    pub fn build_payload(
        post_id: &str,
        input: CreatePetitionInput,
        now: DateTime<Utc>,
    ) -> AppResult<NewPostPayload> {
        input.validate()?;

        let target = input.target.trim();
        if target.is_empty() {
            return Err(AppError::Validation(
                "Petition target cannot be empty".to_string(),
            ));
        }
        if input.deadline.is_some_and(|deadline| deadline <= now) {
            return Err(AppError::Validation(
                "Petition deadline must be in the future".to_string(),
            ));
        }

        Ok(NewPostPayload::Petition(petition::ActiveModel {
            post_id: Set(post_id.to_string()),
            target: Set(target.to_string()),
            goal: Set(to_column(input.goal.min(MAX_GOAL))),
            signatures: Set(0),
            deadline: Set(input.deadline),
            is_successful: Set(false),
            created_at: Set(now),
        }))
    }

    /// Load a petition with the viewer's signature status.
    pub async fn details(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<PetitionDetails> {
        let petition = self.petition_repo.get_by_post_id(post_id).await?;
        let user_signed = match viewer_id {
            Some(viewer_id) => self.signature_repo.exists(post_id, viewer_id).await?,
            None => false,
        };

        Ok(PetitionDetails {
            petition,
            user_signed,
        })
    }

    /// Sign the petition of a post.
    pub async fn sign(
        &self,
        viewer: &user::Model,
        post_id: &str,
        input: SignPetitionInput,
    ) -> AppResult<PetitionDetails> {
        input.validate()?;

        let post = self.post_repo.get_by_id(post_id).await?;
        if post.post_type != PostType::Petition {
            return Err(AppError::NotFound(format!("Post {post_id} has no petition")));
        }

        let current = self.details(post_id, Some(&viewer.id)).await?;
        let snapshot = PetitionSnapshot {
            goal: from_column(current.petition.goal),
            signatures: from_column(current.petition.signatures),
            deadline: current.petition.deadline,
            is_successful: current.petition.is_successful,
        };
        let outcome = engine::sign_petition(&snapshot, current.user_signed, Utc::now())?;

        let comment = input
            .comment
            .map(|comment| comment.trim().to_string())
            .filter(|comment| !comment.is_empty());
        let petition = self
            .petition_repo
            .record_signature(post_id, &viewer.id, comment, input.is_anonymous)
            .await?;

        if petition.is_successful && !current.petition.is_successful {
            tracing::info!(post_id = %post_id, goal = petition.goal, "Petition reached its goal");
        }
        if from_column(petition.signatures) != outcome.signatures {
            // Another signature landed between the read and the write
            tracing::warn!(
                post_id = %post_id,
                signatures = petition.signatures,
                computed = outcome.signatures,
                "Petition signature count moved concurrently"
            );
        }
        tracing::info!(
            post_id = %post_id,
            user_id = %viewer.id,
            signatures = petition.signatures,
            is_successful = petition.is_successful,
            "Recorded petition signature"
        );

        Ok(PetitionDetails {
            petition,
            user_signed: true,
        })
    }

    /// Signatures of a petition, newest first.
    pub async fn signatures(
        &self,
        post_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<SignatureDetails>> {
        self.petition_repo.get_by_post_id(post_id).await?;

        let signatures = self
            .signature_repo
            .find_by_post(post_id, limit, offset)
            .await?;

        let signer_ids: Vec<String> = signatures
            .iter()
            .filter(|s| !s.is_anonymous)
            .map(|s| s.user_id.clone())
            .collect();
        let signers: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&signer_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(signatures
            .into_iter()
            .map(|signature| SignatureDetails {
                signer: if signature.is_anonymous {
                    None
                } else {
                    signers.get(&signature.user_id).cloned()
                },
                comment: signature.comment,
                is_anonymous: signature.is_anonymous,
                created_at: signature.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use civic_db::entities::UserRole;
    use civic_db::test_utils::TestDatabase;

    async fn setup(
        goal: u32,
        deadline: Option<DateTime<Utc>>,
    ) -> (TestDatabase, PetitionService, user::Model, user::Model) {
        let db = TestDatabase::in_memory().await.unwrap();
        let alice = db.insert_user("u1", "alice", UserRole::Citizen).await.unwrap();
        let bob = db.insert_user("u2", "bob", UserRole::Citizen).await.unwrap();
        db.insert_post("p1", "u1", PostType::Petition).await.unwrap();

        // Insert directly so a past deadline can be stored
        sea_orm::ActiveModelTrait::insert(
            petition::ActiveModel {
                post_id: Set("p1".to_string()),
                target: Set("City Council".to_string()),
                goal: Set(to_column(goal)),
                signatures: Set(0),
                deadline: Set(deadline),
                is_successful: Set(false),
                created_at: Set(Utc::now()),
            },
            db.conn.as_ref(),
        )
        .await
        .unwrap();

        let service = PetitionService::new(
            PetitionRepository::new(db.connection()),
            PetitionSignatureRepository::new(db.connection()),
            PostRepository::new(db.connection()),
            UserRepository::new(db.connection()),
        );
        (db, service, alice, bob)
    }

    #[tokio::test]
    async fn test_goal_of_two() {
        let (_db, service, alice, bob) = setup(2, None).await;

        let first = service
            .sign(&alice, "p1", SignPetitionInput::default())
            .await
            .unwrap();
        assert_eq!(first.petition.signatures, 1);
        assert_eq!(first.progress_percentage(), 50.0);
        assert!(!first.petition.is_successful);
        assert!(first.user_signed);

        let second = service
            .sign(&bob, "p1", SignPetitionInput::default())
            .await
            .unwrap();
        assert_eq!(second.progress_percentage(), 100.0);
        assert!(second.petition.is_successful);
    }

    #[tokio::test]
    async fn test_signing_twice_is_rejected() {
        let (_db, service, alice, _bob) = setup(10, None).await;

        service
            .sign(&alice, "p1", SignPetitionInput::default())
            .await
            .unwrap();
        let result = service
            .sign(&alice, "p1", SignPetitionInput::default())
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let details = service.details("p1", Some("u1")).await.unwrap();
        assert_eq!(details.petition.signatures, 1);
        assert!(details.user_signed);
    }

    #[tokio::test]
    async fn test_past_deadline_is_closed() {
        let (_db, service, alice, _bob) = setup(10, Some(Utc::now() - Duration::days(1))).await;

        let result = service
            .sign(&alice, "p1", SignPetitionInput::default())
            .await;
        assert!(matches!(result, Err(AppError::Closed(_))));
    }

    #[tokio::test]
    async fn test_anonymous_signers_are_hidden() {
        let (_db, service, alice, bob) = setup(10, None).await;

        service
            .sign(
                &alice,
                "p1",
                SignPetitionInput {
                    comment: Some("  Long overdue  ".to_string()),
                    is_anonymous: false,
                },
            )
            .await
            .unwrap();
        service
            .sign(
                &bob,
                "p1",
                SignPetitionInput {
                    comment: None,
                    is_anonymous: true,
                },
            )
            .await
            .unwrap();

        let signatures = service.signatures("p1", 10, 0).await.unwrap();
        assert_eq!(signatures.len(), 2);

        let named = signatures.iter().find(|s| !s.is_anonymous).unwrap();
        assert_eq!(named.signer.as_ref().unwrap().username, "alice");
        assert_eq!(named.comment.as_deref(), Some("Long overdue"));

        let hidden = signatures.iter().find(|s| s.is_anonymous).unwrap();
        assert!(hidden.signer.is_none());
    }

    #[test]
    fn test_build_payload_rejects_bad_input() {
        let now = Utc::now();
        let input = |target: &str, goal: u32| CreatePetitionInput {
            target: target.to_string(),
            goal,
            deadline: None,
        };

        assert!(PetitionService::build_payload("p", input("Council", 0), now).is_err());
        assert!(PetitionService::build_payload("p", input("   ", 10), now).is_err());
        assert!(PetitionService::build_payload("p", input("Council", 10), now).is_ok());
    }
}
