//! In-memory bearer sessions with an idle timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::enums::UserRole;

/// A signed-in user as seen by request handlers.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub role: UserRole,
    last_seen: Instant,
}

/// Sessions keyed by the SHA-256 of their token; raw tokens are never kept.
pub struct SessionStore {
    sessions: HashMap<[u8; 32], Session>,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_ttl,
        }
    }

    /// Open a session and return its bearer token.
    pub fn create(&mut self, user_id: Uuid, role: UserRole) -> String {
        self.purge_expired();
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            Session {
                user_id,
                role,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Look up a token and refresh its idle timer. Expired sessions are
    /// dropped on sight.
    pub fn resolve(&mut self, token: &str) -> Option<Session> {
        let key = hash_token(token);
        let now = Instant::now();
        let expired = match self.sessions.get_mut(&key) {
            None => return None,
            Some(session) if now.duration_since(session.last_seen) > self.idle_ttl => true,
            Some(session) => {
                session.last_seen = now;
                return Some(session.clone());
            }
        };
        if expired {
            self.sessions.remove(&key);
        }
        None
    }

    /// Returns whether a session was removed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    /// Drop every session of a user, e.g. after deactivation.
    pub fn revoke_user(&mut self, user_id: &Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.user_id != user_id);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        let ttl = self.idle_ttl;
        self.sessions
            .retain(|_, s| now.duration_since(s.last_seen) <= ttl);
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
