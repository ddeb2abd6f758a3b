//! Follow relationships between users.

use tracing::{debug, info, instrument};

use crate::{DirectoryError, User, UserRepository};

/// Service for the directed "follows" edges between users.
#[derive(Debug, Clone)]
pub struct FollowService {
    repository: UserRepository,
}

impl FollowService {
    /// Creates a follow service backed by the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: UserRepository) -> Self {
        info!("Creating FollowService");
        Self { repository }
    }

    /// Makes `follower_id` follow `following_id`. Following twice is a no-op.
    ///
    /// Returns whether a new edge was created.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Db`] for a self-follow, an unknown user, or a
    /// database failure.
    #[instrument(skip(self))]
    pub fn follow(&self, follower_id: i32, following_id: i32) -> Result<bool, DirectoryError> {
        let created = self.repository.insert_follow(follower_id, following_id)?;
        if created {
            info!(follower_id, following_id, "Follow created");
        } else {
            debug!(follower_id, following_id, "Already following");
        }
        Ok(created)
    }

    /// Removes the edge from `follower_id` to `following_id`.
    ///
    /// Returns whether an edge was removed.
    #[instrument(skip(self))]
    pub fn unfollow(&self, follower_id: i32, following_id: i32) -> Result<bool, DirectoryError> {
        let removed = self.repository.delete_follow(follower_id, following_id)?;
        debug!(removed, "Unfollow processed");
        Ok(removed)
    }

    /// Checks whether `follower_id` follows `following_id`.
    #[instrument(skip(self))]
    pub fn is_following(&self, follower_id: i32, following_id: i32) -> Result<bool, DirectoryError> {
        Ok(self.repository.follow_exists(follower_id, following_id)?)
    }

    /// Users following `user_id`.
    #[instrument(skip(self))]
    pub fn followers(&self, user_id: i32) -> Result<Vec<User>, DirectoryError> {
        Ok(self.repository.list_followers(user_id)?)
    }

    /// Users that `user_id` follows.
    #[instrument(skip(self))]
    pub fn following(&self, user_id: i32) -> Result<Vec<User>, DirectoryError> {
        Ok(self.repository.list_following(user_id)?)
    }
}
