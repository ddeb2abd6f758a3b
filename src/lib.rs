//! User Directory - account lookup, search, profiles and edits over SQLite.
//!
//! # Architecture
//!
//! - **Repository**: [`UserRepository`] issues structured diesel queries
//! - **Follows**: [`FollowService`] manages follow edges between users
//! - **Directory**: [`UserService`] holds the lookup, profile and edit rules
//! - **Config**: [`DirectoryConfig`] from TOML and environment
//!
//! # Example
//!
//! ```no_run
//! use user_directory::{FollowService, SignUpData, UserRepository, UserService};
//!
//! # fn example() -> anyhow::Result<()> {
//! let repository = UserRepository::new("users.db".to_string())?;
//! repository.run_migrations()?;
//!
//! let service = UserService::new(repository.clone(), FollowService::new(repository));
//! let alice = service.create(SignUpData::new(
//!     "alice".to_string(),
//!     "a@x.com".to_string(),
//!     "hash".to_string(),
//!     None,
//! ))?;
//! let profile = service.find_one_by_username_with_posts(alice.username())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod db;
mod error;
mod follow_service;
mod user_service;

// Crate-level exports - Configuration
pub use config::{ConfigError, DATABASE_PATH_ENV, DirectoryConfig, LOG_FILTER_ENV};

// Crate-level exports - Persistence
pub use db::{
    Comment, DbError, DbErrorKind, EditUserData, NewComment, NewFollow, NewLike, NewPost, NewUser,
    Post, PostCounts, PostWithCounts, ProfileCounts, SignUpData, User, UserChanges, UserProfile,
    UserRepository,
};

// Crate-level exports - Services
pub use error::{DirectoryError, USER_NOT_FOUND, USERNAME_TAKEN};
pub use follow_service::FollowService;
pub use user_service::UserService;
