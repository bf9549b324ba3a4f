//! Subcommand implementations.

pub mod migrate;
pub mod prune;

use weathervane_server::config::ConfigError;

/// Errors shared by the database-backed commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A repository operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] weathervane_server::db::RepositoryError),
}
