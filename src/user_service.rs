//! User directory business logic layer.

use tracing::{debug, info, instrument, warn};

use crate::{
    DirectoryError, EditUserData, FollowService, SignUpData, User, UserProfile, UserRepository,
};

/// Service layer for looking up, creating and editing user accounts.
///
/// Wraps [`UserRepository`] with the directory rules: empty searches return
/// nothing, profiles never carry a password, and usernames stay unique on
/// edit. Both collaborators are passed in at construction.
#[derive(Debug, Clone)]
pub struct UserService {
    repository: UserRepository,
    follows: FollowService,
}

impl UserService {
    /// Creates a new user service from its collaborators.
    #[instrument(skip(repository, follows))]
    pub fn new(repository: UserRepository, follows: FollowService) -> Self {
        info!("Creating UserService");
        Self {
            repository,
            follows,
        }
    }

    /// Returns the underlying repository.
    #[instrument(skip(self))]
    pub fn repository(&self) -> &UserRepository {
        &self.repository
    }

    /// Returns the follow-relationship service.
    #[instrument(skip(self))]
    pub fn follows(&self) -> &FollowService {
        &self.follows
    }

    /// Returns the user with this id, or `None`.
    #[instrument(skip(self))]
    pub fn find_one_by_id(&self, id: i32) -> Result<Option<User>, DirectoryError> {
        Ok(self.repository.find_user_by_id(id)?)
    }

    /// Returns users whose username contains `query`, ignoring case, other
    /// than `current_user`. An empty query returns no users without touching
    /// the database.
    #[instrument(skip(self, current_user), fields(current_user_id = current_user.id()))]
    pub fn find_all_by_username(
        &self,
        query: &str,
        current_user: &User,
    ) -> Result<Vec<User>, DirectoryError> {
        if query.is_empty() {
            debug!("Empty username query, skipping search");
            return Ok(Vec::new());
        }

        Ok(self
            .repository
            .search_users_by_username(query, *current_user.id())?)
    }

    /// Returns every user.
    #[instrument(skip(self))]
    pub fn find_all(&self) -> Result<Vec<User>, DirectoryError> {
        Ok(self.repository.list_users()?)
    }

    /// Returns the first user with exactly this email, or `None`.
    #[instrument(skip(self))]
    pub fn find_one_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.repository.find_user_by_email(email)?)
    }

    /// Returns the first user with exactly this username, or `None`.
    #[instrument(skip(self))]
    pub fn find_one_by_username(&self, username: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.repository.find_user_by_username(username)?)
    }

    /// Returns the public profile for `username`: newest posts first with
    /// their counts, and post/follower/following totals.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if no user has this username.
    #[instrument(skip(self))]
    pub fn find_one_by_username_with_posts(
        &self,
        username: &str,
    ) -> Result<UserProfile, DirectoryError> {
        match self.repository.find_profile_by_username(username)? {
            Some(profile) => Ok(profile),
            None => {
                warn!(username = %username, "Profile requested for unknown user");
                Err(DirectoryError::user_not_found())
            }
        }
    }

    /// Creates an account from signup data.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Db`] if the username or email is taken.
    #[instrument(skip(self, data), fields(username = %data.username()))]
    pub fn create(&self, data: SignUpData) -> Result<User, DirectoryError> {
        let user = self.repository.create_user(data.into_new_user())?;
        info!(user_id = user.id(), "Account created");
        Ok(user)
    }

    /// Edits the user with this id. An empty image keeps the stored one.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::NotFound`] if the user does not exist, and
    /// [`DirectoryError::Conflict`] if the new username belongs to another
    /// user.
    #[instrument(skip(self, data))]
    pub fn edit(&self, id: i32, data: EditUserData) -> Result<User, DirectoryError> {
        let changes = data.into_changes(chrono::Utc::now().naive_utc());

        let current = self
            .repository
            .find_user_by_id(id)?
            .ok_or_else(DirectoryError::user_not_found)?;

        if let Some(username) = changes.username() {
            if username != current.username()
                && self
                    .repository
                    .find_other_user_by_username(username, id)?
                    .is_some()
            {
                warn!(user_id = %id, username = %username, "Username already taken");
                return Err(DirectoryError::username_taken());
            }
        }

        if changes.is_empty() {
            debug!(user_id = %id, "Nothing to change");
            return Ok(current);
        }

        let updated = self
            .repository
            .update_user(id, &changes)?
            .ok_or_else(DirectoryError::user_not_found)?;

        info!(user_id = %id, "User edited");
        Ok(updated)
    }
}
