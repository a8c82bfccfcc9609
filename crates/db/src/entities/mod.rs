//! Database entities.

#![allow(missing_docs)]

pub mod category;
pub mod comment;
pub mod comment_vote;
pub mod petition;
pub mod petition_signature;
pub mod poll;
pub mod poll_option;
pub mod poll_vote;
pub mod post;
pub mod post_vote;
pub mod user;

pub use category::Entity as Category;
pub use comment::Entity as Comment;
pub use comment_vote::Entity as CommentVote;
pub use petition::Entity as Petition;
pub use petition_signature::Entity as PetitionSignature;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use poll_vote::Entity as PollVote;
pub use post::{Entity as Post, PostType};
pub use post_vote::{Entity as PostVote, VoteType};
pub use user::{Entity as User, UserRole};
