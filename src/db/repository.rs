//! Database repository for user accounts, posts and follow edges.

use std::collections::HashMap;

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::db::{
    Comment, DbError, DbErrorKind, NewComment, NewFollow, NewLike, NewPost, NewUser, Post,
    PostCounts, PostWithCounts, ProfileCounts, User, UserChanges, UserProfile, schema,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

diesel::define_sql_function! {
    /// Unicode lowercase, registered on every connection. SQLite's builtin
    /// `lower` and `LIKE` only fold ASCII.
    fn unicode_lower(x: Text) -> Text;
}

/// Escapes LIKE wildcards so `fragment` matches literally, using `\` as the escape.
fn escape_like_pattern(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Database repository for user, post and follow operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db_path: String,
}

impl UserRepository {
    /// Creates a new repository connected to the database at the given path.
    ///
    /// Each call opens its own connection, so use a file path rather than
    /// `":memory:"`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::with_kind(
                DbErrorKind::Connection,
                "Database path must not be empty",
            ));
        }
        info!(path = %db_path, "Creating UserRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path).map_err(|e| {
            DbError::with_kind(
                DbErrorKind::Connection,
                format!("Failed to connect to '{}': {}", self.db_path, e),
            )
        })?;
        diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
        unicode_lower_utils::register_impl(&mut conn, |x: String| x.to_lowercase())?;
        Ok(conn)
    }

    /// Applies any pending schema migrations and returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<usize, DbError> {
        let mut conn = self.connection()?;
        let applied = conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            DbError::with_kind(DbErrorKind::Migration, format!("Migrations failed: {}", e))
        })?;
        info!(count = applied.len(), "Migrations applied");
        Ok(applied.len())
    }

    /// Inserts a new user account.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the username or email is taken or a database error occurs.
    #[instrument(skip(self, new_user))]
    pub fn create_user(&self, new_user: NewUser) -> Result<User, DbError> {
        debug!("Creating user");
        let mut conn = self.connection()?;

        let user = diesel::insert_into(schema::users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)?;

        info!(user_id = user.id(), username = %user.username(), "User created");
        Ok(user)
    }

    /// Gets a user by id. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_user_by_id(&self, id: i32) -> Result<Option<User>, DbError> {
        debug!(user_id = %id, "Looking up user by id");
        let mut conn = self.connection()?;
        Ok(find_user_by_id(&mut conn, id)?)
    }

    /// Gets the first user with exactly this email. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        debug!(email = %email, "Looking up user by email");
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::email.eq(email))
            .order(schema::users::id.asc())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(user)
    }

    /// Gets the first user with exactly this username. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        debug!(username = %username, "Looking up user by username");
        let mut conn = self.connection()?;
        Ok(find_user_by_username(&mut conn, username)?)
    }

    /// Gets a user holding `username` whose id is not `excluded_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_other_user_by_username(
        &self,
        username: &str,
        excluded_id: i32,
    ) -> Result<Option<User>, DbError> {
        debug!(username = %username, excluded_id = %excluded_id, "Looking for username holder");
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::username.eq(username))
            .filter(schema::users::id.ne(excluded_id))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(user)
    }

    /// Lists users whose username contains `fragment`, ignoring case,
    /// excluding the user with id `excluded_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn search_users_by_username(
        &self,
        fragment: &str,
        excluded_id: i32,
    ) -> Result<Vec<User>, DbError> {
        debug!(fragment = %fragment, excluded_id = %excluded_id, "Searching users");
        let mut conn = self.connection()?;

        let pattern = format!("%{}%", escape_like_pattern(&fragment.to_lowercase()));
        let users = schema::users::table
            .filter(
                unicode_lower(schema::users::username)
                    .like(pattern)
                    .escape('\\'),
            )
            .filter(schema::users::id.ne(excluded_id))
            .order(schema::users::username.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        info!(count = users.len(), "Search complete");
        Ok(users)
    }

    /// Lists every user, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        debug!("Listing all users");
        let mut conn = self.connection()?;

        let users = schema::users::table
            .order(schema::users::id.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        info!(count = users.len(), "Users loaded");
        Ok(users)
    }

    /// Applies `changes` to the user with id `id`. Returns `None` if no such user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a constraint rejects the change or a database error occurs.
    #[instrument(skip(self, changes))]
    pub fn update_user(&self, id: i32, changes: &UserChanges) -> Result<Option<User>, DbError> {
        debug!(user_id = %id, "Updating user");
        let mut conn = self.connection()?;

        let user = diesel::update(schema::users::table.find(id))
            .set(changes)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .optional()?;

        if let Some(ref u) = user {
            info!(user_id = u.id(), "User updated");
        }
        Ok(user)
    }

    /// Loads the profile of the user with exactly this username: posts newest
    /// first with their counts, plus post/follower/following totals. All reads
    /// share one transaction. Returns `None` if no such user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_profile_by_username(&self, username: &str) -> Result<Option<UserProfile>, DbError> {
        debug!(username = %username, "Loading profile");
        let mut conn = self.connection()?;

        let profile = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let Some(user) = find_user_by_username(conn, username)? else {
                return Ok(None);
            };
            let posts = posts_with_counts(conn, *user.id())?;
            let counts = profile_counts(conn, *user.id())?;
            Ok(Some(UserProfile::from_parts(user, posts, counts)))
        })?;

        if let Some(ref p) = profile {
            info!(
                user_id = p.id(),
                posts = p.counts().posts(),
                followers = p.counts().followers(),
                following = p.counts().following(),
                "Profile loaded"
            );
        }
        Ok(profile)
    }

    /// Gets a user's posts, newest first, each with its comment and like counts.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn user_posts_with_counts(&self, user_id: i32) -> Result<Vec<PostWithCounts>, DbError> {
        let mut conn = self.connection()?;
        Ok(posts_with_counts(&mut conn, user_id)?)
    }

    /// Gets post, follower and following totals for a user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn profile_counts(&self, user_id: i32) -> Result<ProfileCounts, DbError> {
        let mut conn = self.connection()?;
        Ok(profile_counts(&mut conn, user_id)?)
    }

    /// Records a new post.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, post))]
    pub fn create_post(&self, post: NewPost) -> Result<Post, DbError> {
        let mut conn = self.connection()?;

        let post = diesel::insert_into(schema::posts::table)
            .values(&post)
            .returning(Post::as_returning())
            .get_result(&mut conn)?;

        info!(post_id = post.id(), author_id = post.author_id(), "Post created");
        Ok(post)
    }

    /// Records a comment on a post.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, comment))]
    pub fn create_comment(&self, comment: NewComment) -> Result<Comment, DbError> {
        let mut conn = self.connection()?;

        let comment = diesel::insert_into(schema::comments::table)
            .values(&comment)
            .returning(Comment::as_returning())
            .get_result(&mut conn)?;

        debug!(comment_id = comment.id(), post_id = comment.post_id(), "Comment created");
        Ok(comment)
    }

    /// Likes a post on behalf of a user. Returns false if it was already liked.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn like_post(&self, post_id: i32, user_id: i32) -> Result<bool, DbError> {
        let mut conn = self.connection()?;

        let inserted = diesel::insert_or_ignore_into(schema::likes::table)
            .values(&NewLike::new(post_id, user_id))
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    /// Inserts a follow edge. Returns false if the edge already existed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on a self-follow, an unknown user, or a database error.
    #[instrument(skip(self))]
    pub fn insert_follow(&self, follower_id: i32, following_id: i32) -> Result<bool, DbError> {
        // OR IGNORE would also swallow the CHECK constraint.
        if follower_id == following_id {
            return Err(DbError::with_kind(
                DbErrorKind::ConstraintViolation,
                format!("User {} cannot follow themselves", follower_id),
            ));
        }
        let mut conn = self.connection()?;

        let inserted = diesel::insert_or_ignore_into(schema::follows::table)
            .values(&NewFollow::new(follower_id, following_id))
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    /// Removes a follow edge. Returns false if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn delete_follow(&self, follower_id: i32, following_id: i32) -> Result<bool, DbError> {
        let mut conn = self.connection()?;

        let deleted = diesel::delete(schema::follows::table.find((follower_id, following_id)))
            .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    /// Checks whether `follower_id` follows `following_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn follow_exists(&self, follower_id: i32, following_id: i32) -> Result<bool, DbError> {
        let mut conn = self.connection()?;

        let exists = diesel::select(diesel::dsl::exists(
            schema::follows::table.find((follower_id, following_id)),
        ))
        .get_result(&mut conn)?;

        Ok(exists)
    }

    /// Lists the users following `user_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_followers(&self, user_id: i32) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;

        let follower_ids = schema::follows::table
            .filter(schema::follows::following_id.eq(user_id))
            .select(schema::follows::follower_id);
        let users = schema::users::table
            .filter(schema::users::id.eq_any(follower_ids))
            .order(schema::users::id.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        debug!(user_id = %user_id, count = users.len(), "Followers loaded");
        Ok(users)
    }

    /// Lists the users `user_id` follows, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_following(&self, user_id: i32) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;

        let following_ids = schema::follows::table
            .filter(schema::follows::follower_id.eq(user_id))
            .select(schema::follows::following_id);
        let users = schema::users::table
            .filter(schema::users::id.eq_any(following_ids))
            .order(schema::users::id.asc())
            .select(User::as_select())
            .load(&mut conn)?;

        debug!(user_id = %user_id, count = users.len(), "Following loaded");
        Ok(users)
    }
}

fn find_user_by_id(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<User>> {
    schema::users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()
}

fn find_user_by_username(conn: &mut SqliteConnection, username: &str) -> QueryResult<Option<User>> {
    schema::users::table
        .filter(schema::users::username.eq(username))
        .order(schema::users::id.asc())
        .select(User::as_select())
        .first(conn)
        .optional()
}

fn posts_with_counts(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<PostWithCounts>> {
    let posts = schema::posts::table
        .filter(schema::posts::author_id.eq(user_id))
        .order((schema::posts::created_at.desc(), schema::posts::id.desc()))
        .select(Post::as_select())
        .load(conn)?;

    if posts.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<i32> = posts.iter().map(|p| *p.id()).collect();

    let comment_counts: HashMap<i32, i64> = schema::comments::table
        .filter(schema::comments::post_id.eq_any(post_ids.clone()))
        .group_by(schema::comments::post_id)
        .select((schema::comments::post_id, count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    let like_counts: HashMap<i32, i64> = schema::likes::table
        .filter(schema::likes::post_id.eq_any(post_ids))
        .group_by(schema::likes::post_id)
        .select((schema::likes::post_id, count_star()))
        .load::<(i32, i64)>(conn)?
        .into_iter()
        .collect();

    Ok(posts
        .into_iter()
        .map(|post| {
            let counts = PostCounts::new(
                comment_counts.get(post.id()).copied().unwrap_or(0),
                like_counts.get(post.id()).copied().unwrap_or(0),
            );
            PostWithCounts::new(post, counts)
        })
        .collect())
}

fn profile_counts(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<ProfileCounts> {
    let posts = schema::posts::table
        .filter(schema::posts::author_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;
    let followers = schema::follows::table
        .filter(schema::follows::following_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;
    let following = schema::follows::table
        .filter(schema::follows::follower_id.eq(user_id))
        .count()
        .get_result::<i64>(conn)?;

    Ok(ProfileCounts::new(posts, followers, following))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fragment_is_unchanged() {
        assert_eq!(escape_like_pattern("ann"), "ann");
    }

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(escape_like_pattern("a_b%c"), "a\\_b\\%c");
    }

    #[test]
    fn backslash_is_escaped_first() {
        assert_eq!(escape_like_pattern("a\\_"), "a\\\\\\_");
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = UserRepository::new("  ".to_string()).unwrap_err();
        assert_eq!(err.kind, DbErrorKind::Connection);
    }
}
