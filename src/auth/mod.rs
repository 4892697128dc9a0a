//! Account authentication: credentials, sessions, sign-in throttling.
//!
//! Identity is local. Passwords are stored as PBKDF2-SHA256 verifiers,
//! bearer tokens only as SHA-256 hashes. Failures carry the stable
//! machine codes clients already know (`auth/user-not-found`, ...).

pub mod password;
pub mod service;
pub mod session;
pub mod throttle;

pub use service::*;
pub use session::{generate_token, hash_token, Session, SessionStore};
pub use throttle::SignInThrottle;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No account found with this email address")]
    UserNotFound,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("An account with this email already exists")]
    EmailAlreadyInUse,

    #[error("Password should be at least 6 characters")]
    WeakPassword,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Account is deactivated. Please contact administrator.")]
    UserDisabled,

    #[error("Too many failed attempts. Please try again later")]
    TooManyRequests,

    #[error("Not signed in")]
    Unauthenticated,

    #[error("{0}")]
    Validation(ValidationError),

    #[error("Internal lock error")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl AuthError {
    /// Stable machine code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound => "auth/user-not-found",
            Self::WrongPassword => "auth/wrong-password",
            Self::EmailAlreadyInUse => "auth/email-already-in-use",
            Self::WeakPassword => "auth/weak-password",
            Self::InvalidEmail => "auth/invalid-email",
            Self::UserDisabled => "auth/user-disabled",
            Self::TooManyRequests => "auth/too-many-requests",
            Self::Unauthenticated => "unauthenticated",
            Self::Validation(_) => "invalid-argument",
            Self::LockPoisoned | Self::Database(_) => "unknown",
        }
    }
}

/// Password rules surface under their own auth codes so clients can map
/// them the same way as store-side failures.
impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        match (err.field, err.message.as_str()) {
            ("email", "Please enter a valid email address") => Self::InvalidEmail,
            ("password", m) if m.starts_with("Password must be at least") => Self::WeakPassword,
            _ => Self::Validation(err),
        }
    }
}

/// User-facing message for a machine error code. Unknown codes fall back
/// to the generic message.
pub fn error_message(code: &str) -> &'static str {
    match code {
        "auth/user-not-found" => "No account found with this email address",
        "auth/wrong-password" => "Incorrect password",
        "auth/email-already-in-use" => "An account with this email already exists",
        "auth/weak-password" => "Password should be at least 6 characters",
        "auth/invalid-email" => "Please enter a valid email address",
        "auth/user-disabled" => "Account is deactivated. Please contact administrator.",
        "auth/too-many-requests" => "Too many failed attempts. Please try again later",
        "permission-denied" => "Access denied",
        "not-found" => "Data not found",
        "already-exists" => "Data already exists",
        "unauthenticated" => "Not signed in",
        _ => "An unknown error occurred",
    }
}

/// The sign-in screen does not reveal which half of the credentials was
/// wrong.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
