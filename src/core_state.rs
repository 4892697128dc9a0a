//! Shared application state.
//!
//! One `CoreState` lives behind an `Arc` for the whole process. It owns
//! the database location and the in-memory auth state; every request
//! opens its own SQLite connection through `open_db`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::auth::{Session, SessionStore, SignInThrottle};
use crate::config::AppConfig;
use crate::db;

pub struct CoreState {
    db_path: PathBuf,
    sessions: RwLock<SessionStore>,
    sign_in_throttle: Mutex<SignInThrottle>,
}

impl CoreState {
    pub fn new(db_path: impl Into<PathBuf>, session_ttl: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            sessions: RwLock::new(SessionStore::new(session_ttl)),
            sign_in_throttle: Mutex::new(SignInThrottle::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.db_path.clone(), config.session_ttl)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a database connection. Migrations run on first open.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    // ── Sessions ────────────────────────────────────────────

    pub fn write_sessions(&self) -> Result<RwLockWriteGuard<'_, SessionStore>, CoreError> {
        self.sessions.write().map_err(|_| CoreError::LockPoisoned)
    }

    /// Resolve a bearer token. Refreshes the idle timer, so it needs the
    /// write lock.
    pub fn resolve_session(&self, token: &str) -> Result<Option<Session>, CoreError> {
        Ok(self.write_sessions()?.resolve(token))
    }

    pub fn revoke_user_sessions(&self, user_id: &Uuid) -> Result<usize, CoreError> {
        Ok(self.write_sessions()?.revoke_user(user_id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    // ── Sign-in throttle ────────────────────────────────────

    pub fn throttle(&self) -> Result<MutexGuard<'_, SignInThrottle>, CoreError> {
        self.sign_in_throttle
            .lock()
            .map_err(|_| CoreError::LockPoisoned)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::UserRole;

    #[test]
    fn open_db_creates_schema_in_new_file() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::new(tmp.path().join("nested/medtrack.db"), Duration::from_secs(60));
        let conn = core.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 8);
        assert!(core.db_path().exists());
    }

    #[test]
    fn sessions_are_shared_through_state() {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::new(tmp.path().join("m.db"), Duration::from_secs(60));
        let user = Uuid::new_v4();
        let token = core.write_sessions().unwrap().create(user, UserRole::Admin);

        assert_eq!(core.session_count(), 1);
        let session = core.resolve_session(&token).unwrap().unwrap();
        assert_eq!(session.user_id, user);

        assert_eq!(core.revoke_user_sessions(&user).unwrap(), 1);
        assert!(core.resolve_session(&token).unwrap().is_none());
    }

    #[test]
    fn from_config_uses_configured_path() {
        let cfg = AppConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            db_path: PathBuf::from("/tmp/medtrack-test.db"),
            session_ttl: Duration::from_secs(5),
            seed_demo: false,
        };
        let core = CoreState::from_config(&cfg);
        assert_eq!(core.db_path(), Path::new("/tmp/medtrack-test.db"));
    }
}
