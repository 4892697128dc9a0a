use thiserror::Error;

use crate::api::ServerError;
use crate::config::ConfigError;
use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::validation::ValidationError;

/// Failure of a care-record operation (patients, doctors, catalogue,
/// schedules, dose history).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(entity.to_string())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => Self::NotFound(entity_type),
            other => Self::Database(other),
        }
    }
}

/// Failure while bringing the service up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("Startup task failed: {0}")]
    Task(String),

    #[error("Could not listen for shutdown signal: {0}")]
    Signal(std::io::Error),
}
