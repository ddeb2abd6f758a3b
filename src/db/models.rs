//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use derive_setters::Setters;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::schema;

/// User account database model.
///
/// The password column is loaded so an upstream auth layer can verify it,
/// but it is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Selectable, Getters, Serialize)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: i32,
    username: String,
    email: String,
    #[serde(skip_serializing)]
    password: String,
    image: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Insertable user model for creating new accounts.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    username: String,
    email: String,
    password: String,
    image: Option<String>,
}

/// Column changes for a user update. `None` columns are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, AsChangeset, Getters)]
#[diesel(table_name = schema::users)]
pub struct UserChanges {
    username: Option<String>,
    email: Option<String>,
    image: Option<String>,
    updated_at: NaiveDateTime,
}

impl UserChanges {
    /// Returns true when no user-visible column would change.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.image.is_none()
    }
}

/// Signup payload consumed by account creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Getters, new)]
pub struct SignUpData {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    image: Option<String>,
}

impl SignUpData {
    /// Converts the payload into an insertable row. An empty image is stored as NULL.
    #[instrument(skip(self), fields(username = %self.username))]
    pub fn into_new_user(self) -> NewUser {
        let image = self.image.filter(|image| !image.is_empty());
        NewUser::new(self.username, self.email, self.password, image)
    }
}

/// Edit payload: any subset of the user-editable fields.
///
/// ```
/// use user_directory::EditUserData;
///
/// let edit = EditUserData::default().username("alice").image("http://x");
/// assert_eq!(edit.username.as_deref(), Some("alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct EditUserData {
    /// New username. Must not belong to another user.
    #[serde(default)]
    pub username: Option<String>,
    /// New email address.
    #[serde(default)]
    pub email: Option<String>,
    /// New image URL. Empty means "keep the current image".
    #[serde(default)]
    pub image: Option<String>,
}

impl EditUserData {
    /// Builds the column changes, dropping an empty image so the stored one survives.
    #[instrument(skip(self))]
    pub fn into_changes(self, updated_at: NaiveDateTime) -> UserChanges {
        UserChanges {
            username: self.username,
            email: self.email,
            image: self.image.filter(|image| !image.is_empty()),
            updated_at,
        }
    }
}

/// Post database model.
#[derive(
    Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations, Selectable, Getters, Serialize,
)]
#[diesel(table_name = schema::posts)]
#[diesel(belongs_to(User, foreign_key = author_id))]
pub struct Post {
    id: i32,
    author_id: i32,
    body: String,
    created_at: NaiveDateTime,
}

/// Insertable post model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::posts)]
pub struct NewPost {
    author_id: i32,
    body: String,
    created_at: NaiveDateTime,
}

/// Comment database model.
#[derive(
    Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations, Selectable, Getters, Serialize,
)]
#[diesel(table_name = schema::comments)]
#[diesel(belongs_to(Post))]
pub struct Comment {
    id: i32,
    post_id: i32,
    author_id: i32,
    body: String,
    created_at: NaiveDateTime,
}

/// Insertable comment model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::comments)]
pub struct NewComment {
    post_id: i32,
    author_id: i32,
    body: String,
}

/// Insertable like model.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::likes)]
pub struct NewLike {
    post_id: i32,
    user_id: i32,
}

/// Insertable follow edge: `follower_id` follows `following_id`.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::follows)]
pub struct NewFollow {
    follower_id: i32,
    following_id: i32,
}

/// Counts of the sub-entities attached to a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, new)]
pub struct PostCounts {
    comments: i64,
    likes: i64,
}

/// A post together with its sub-entity counts.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, new)]
pub struct PostWithCounts {
    #[serde(flatten)]
    post: Post,
    #[serde(rename = "_count")]
    counts: PostCounts,
}

/// Aggregate counts shown on a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters, Serialize, new)]
pub struct ProfileCounts {
    posts: i64,
    followers: i64,
    following: i64,
}

/// Public profile of a user: the account without its password, newest posts
/// first, and aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
pub struct UserProfile {
    id: i32,
    username: String,
    email: String,
    image: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    posts: Vec<PostWithCounts>,
    #[serde(rename = "_count")]
    counts: ProfileCounts,
}

impl UserProfile {
    /// Assembles a profile, consuming the user so its password is dropped.
    #[instrument(skip_all, fields(user_id = user.id))]
    pub fn from_parts(user: User, posts: Vec<PostWithCounts>, counts: ProfileCounts) -> Self {
        let User {
            id,
            username,
            email,
            password: _,
            image,
            created_at,
            updated_at,
        } = user;
        Self {
            id,
            username,
            email,
            image,
            created_at,
            updated_at,
            posts,
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    #[test]
    fn empty_image_is_dropped_from_changes() {
        let changes = EditUserData::default().image("").into_changes(now());
        assert!(changes.image().is_none());
        assert!(changes.is_empty());
    }

    #[test]
    fn non_empty_image_is_kept_in_changes() {
        let changes = EditUserData::default().image("http://x").into_changes(now());
        assert_eq!(changes.image().as_deref(), Some("http://x"));
        assert!(!changes.is_empty());
    }

    #[test]
    fn username_only_edit_is_not_empty() {
        let changes = EditUserData::default().username("bob").into_changes(now());
        assert_eq!(changes.username().as_deref(), Some("bob"));
        assert!(changes.email().is_none());
        assert!(!changes.is_empty());
    }

    #[test]
    fn signup_with_empty_image_stores_null() {
        let data = SignUpData::new(
            "alice".to_string(),
            "a@x.com".to_string(),
            "h".to_string(),
            Some(String::new()),
        );
        let new_user = data.into_new_user();
        assert!(new_user.image.is_none());
        assert_eq!(new_user.username, "alice");
    }

    #[test]
    fn user_serialization_omits_password() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "secret-hash".to_string(),
            image: None,
            created_at: now(),
            updated_at: now(),
        };
        let json = serde_json::to_value(&user).expect("serialize");
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn profile_serialization_has_no_password() {
        let user = User {
            id: 7,
            username: "carol".to_string(),
            email: "c@x.com".to_string(),
            password: "secret-hash".to_string(),
            image: Some("http://img".to_string()),
            created_at: now(),
            updated_at: now(),
        };
        let profile = UserProfile::from_parts(user, Vec::new(), ProfileCounts::new(0, 2, 1));
        let json = serde_json::to_string(&profile).expect("serialize");
        assert!(!json.contains("password"));
        assert!(!json.contains("secret-hash"));
        assert_eq!(*profile.counts().followers(), 2);
    }
}
