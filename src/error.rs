//! Errors surfaced by the directory services.

use derive_more::{Display, Error, From};

use crate::DbError;

/// Message carried by [`DirectoryError::NotFound`] for a missing user.
pub const USER_NOT_FOUND: &str = "user not found";

/// Message carried by [`DirectoryError::Conflict`] for a taken username.
pub const USERNAME_TAKEN: &str = "This username already exists";

/// Failure of a directory operation.
#[derive(Debug, Clone, Display, Error, From)]
pub enum DirectoryError {
    /// The requested user does not exist.
    #[display("{_0}")]
    #[from(skip)]
    NotFound(#[error(not(source))] String),
    /// The change collides with data owned by another user.
    #[display("{_0}")]
    #[from(skip)]
    Conflict(#[error(not(source))] String),
    /// The database rejected or failed the operation.
    #[display("{_0}")]
    Db(DbError),
}

impl DirectoryError {
    /// Missing user.
    pub fn user_not_found() -> Self {
        Self::NotFound(USER_NOT_FOUND.to_string())
    }

    /// Username already held by someone else.
    pub fn username_taken() -> Self {
        Self::Conflict(USERNAME_TAKEN.to_string())
    }

    /// Returns true for [`DirectoryError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for [`DirectoryError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
