//! Command-line interface for userdir.

use clap::{Parser, Subcommand};

/// User Directory - look up, search and edit user accounts
#[derive(Parser, Debug)]
#[command(name = "userdir")]
#[command(about = "User account directory over SQLite", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Database file, overriding config and DATABASE_PATH
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Skip applying pending migrations on startup
    #[arg(long, global = true)]
    pub no_migrate: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations and exit
    Migrate,

    /// Create an account
    Create {
        /// Unique username
        #[arg(long)]
        username: String,

        /// Unique email address
        #[arg(long)]
        email: String,

        /// Password (stored as given; hash it upstream)
        #[arg(long)]
        password: String,

        /// Profile image URL
        #[arg(long)]
        image: Option<String>,
    },

    /// Look up a user by id
    Get {
        /// User id
        id: i32,
    },

    /// Look up a user by exact email
    ByEmail {
        /// Email address
        email: String,
    },

    /// Look up a user by exact username
    ByUsername {
        /// Username
        username: String,
    },

    /// Search usernames containing a fragment, case-insensitively
    Search {
        /// Fragment to look for
        query: String,

        /// Id of the searching user, excluded from results
        #[arg(long)]
        as_user: i32,
    },

    /// List every user
    List,

    /// Show a profile with posts and counts
    Profile {
        /// Username
        username: String,
    },

    /// Edit a user's username, email or image
    Edit {
        /// User id
        id: i32,

        /// New username
        #[arg(long)]
        username: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New image URL (empty keeps the current one)
        #[arg(long)]
        image: Option<String>,
    },

    /// Follow another user
    Follow {
        /// Follower id
        follower: i32,

        /// Id of the user to follow
        following: i32,
    },

    /// Stop following a user
    Unfollow {
        /// Follower id
        follower: i32,

        /// Id of the user to stop following
        following: i32,
    },

    /// Publish a post
    Post {
        /// Author id
        author: i32,

        /// Post body
        body: String,
    },
}
