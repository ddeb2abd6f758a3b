//! User Directory - command-line entry point.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use serde::Serialize;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;
use user_directory::{
    DirectoryConfig, EditUserData, FollowService, NewPost, SignUpData, UserRepository,
    UserService,
};

fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(database_path = %config.database_path(), "Starting userdir");

    let repository = UserRepository::new(config.database_path().clone())?;
    if *config.run_migrations() || matches!(cli.command, Command::Migrate) {
        let applied = repository.run_migrations()?;
        debug!(applied, "Schema ready");
    }

    // Collaborators are assembled once here and passed down explicitly.
    let follows = FollowService::new(repository.clone());
    let service = UserService::new(repository, follows);

    run(&service, cli.command)
}

/// Builds the configuration: file (if any), then environment, then flags.
fn load_config(cli: &Cli) -> Result<DirectoryConfig> {
    let base = match &cli.config {
        Some(path) => DirectoryConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DirectoryConfig::default(),
    };

    let config = base
        .with_env_overrides()
        .with_overrides(cli.db_path.clone(), None);
    if cli.no_migrate {
        return Ok(config.with_run_migrations(false));
    }
    Ok(config)
}

/// Dispatches one subcommand against the directory.
#[instrument(skip_all)]
fn run(service: &UserService, command: Command) -> Result<()> {
    match command {
        Command::Migrate => {
            info!("Migrations complete");
            Ok(())
        }
        Command::Create {
            username,
            email,
            password,
            image,
        } => print_json(&service.create(SignUpData::new(username, email, password, image))?),
        Command::Get { id } => print_json(&service.find_one_by_id(id)?),
        Command::ByEmail { email } => print_json(&service.find_one_by_email(&email)?),
        Command::ByUsername { username } => print_json(&service.find_one_by_username(&username)?),
        Command::Search { query, as_user } => {
            let current = service
                .find_one_by_id(as_user)?
                .with_context(|| format!("no user with id {}", as_user))?;
            print_json(&service.find_all_by_username(&query, &current)?)
        }
        Command::List => print_json(&service.find_all()?),
        Command::Profile { username } => {
            print_json(&service.find_one_by_username_with_posts(&username)?)
        }
        Command::Edit {
            id,
            username,
            email,
            image,
        } => {
            let data = EditUserData {
                username,
                email,
                image,
            };
            print_json(&service.edit(id, data)?)
        }
        Command::Follow {
            follower,
            following,
        } => print_json(&service.follows().follow(follower, following)?),
        Command::Unfollow {
            follower,
            following,
        } => print_json(&service.follows().unfollow(follower, following)?),
        Command::Post { author, body } => {
            let post = NewPost::new(author, body, chrono::Utc::now().naive_utc());
            print_json(&service.repository().create_post(post)?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
