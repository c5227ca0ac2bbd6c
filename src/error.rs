use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayDateError {
    // Configuration errors
    #[error("Missing required environment variable '{name}'")]
    MissingEnv { name: String },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // Store errors
    #[error("Database error: {source}")]
    Database {
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to run migrations: {source}")]
    Migration {
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Name '{name}' is already taken")]
    NameTaken { name: String },

    #[error("Playdate {id} has already happened")]
    PlayDateClosed { id: i32 },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // OAuth / outbound HTTP errors
    #[error("OAuth error: {message}")]
    OAuth { message: String },

    #[error("HTTP request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlayDateError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        PlayDateError::NotFound {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<serenity::Error> for PlayDateError {
    fn from(err: serenity::Error) -> Self {
        PlayDateError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for PlayDateError {
    fn from(err: sqlx::Error) -> Self {
        PlayDateError::Database { source: err }
    }
}

impl From<sqlx::migrate::MigrateError> for PlayDateError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        PlayDateError::Migration { source: err }
    }
}

impl From<reqwest::Error> for PlayDateError {
    fn from(err: reqwest::Error) -> Self {
        PlayDateError::Http { source: err }
    }
}

pub type Result<T> = std::result::Result<T, PlayDateError>;

use poise::serenity_prelude as serenity;
