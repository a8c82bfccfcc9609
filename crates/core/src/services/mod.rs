//! Business logic services.

#![allow(missing_docs)]

pub mod category;
pub mod comment;
pub mod petition;
pub mod poll;
pub mod post;
pub mod seed;
pub mod user;

pub use category::{CategoryService, CategoryWithCount, CreateCategoryInput};
pub use comment::{CommentDetails, CommentService, CreateCommentInput};
pub use petition::{
    CreatePetitionInput, PetitionDetails, PetitionService, SignPetitionInput, SignatureDetails,
};
pub use poll::{CreatePollInput, PollDetails, PollService, PollVoteInput};
pub use post::{
    CreatePostInput, ListPostsInput, ModerationAction, PostDetails, PostKindInput, PostPage,
    PostPayload, PostService, PostVoteResult,
};
pub use seed::{SeedReport, SeedService};
pub use user::{CreateUserInput, UserService};
