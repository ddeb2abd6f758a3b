//! Database persistence layer for user accounts, posts and follow edges.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::{DbError, DbErrorKind};
pub use models::{
    Comment, EditUserData, NewComment, NewFollow, NewLike, NewPost, NewUser, Post, PostCounts,
    PostWithCounts, ProfileCounts, SignUpData, User, UserChanges, UserProfile,
};
pub use repository::UserRepository;
