//! Authentication: bearer sessions and long-lived API keys.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use grc_core::config::AuthConfig;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// How a token was issued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    ApiKey,
}

/// Bearer token issued after authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: TokenKind,
    pub roles: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A user session backed by an auth token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: Uuid,
    pub token: AuthToken,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Central authentication manager holding sessions.
pub struct AuthManager {
    /// token_id -> session
    sessions: DashMap<Uuid, AuthSession>,
    session_ttl: Duration,
    api_key_ttl: Duration,
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new(&AuthConfig::default())
    }
}

impl AuthManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            session_ttl: Duration::hours(config.session_ttl_hours),
            api_key_ttl: Duration::days(config.api_key_ttl_days),
        }
    }

    /// Create a new authenticated session and return it.
    pub fn create_session(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
    ) -> AuthSession {
        let session = self.issue(user_id, tenant_id, roles, TokenKind::Session, self.session_ttl);
        info!(
            session_id = %session.session_id,
            user_id = %user_id,
            tenant_id = %tenant_id,
            "Session created"
        );
        session
    }

    /// Generate a long-lived API key token.
    pub fn generate_api_key(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
    ) -> AuthToken {
        let session = self.issue(user_id, tenant_id, roles, TokenKind::ApiKey, self.api_key_ttl);
        info!(token_id = %session.token.token_id, user_id = %user_id, "API key generated");
        session.token
    }

    fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        roles: Vec<String>,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthSession {
        let now = Utc::now();
        let token = AuthToken {
            token_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            kind,
            roles,
            issued_at: now,
            expires_at: now + ttl,
        };
        let session = AuthSession {
            session_id: Uuid::new_v4(),
            token,
            created_at: now,
            last_active: now,
        };
        self.sessions.insert(session.token.token_id, session.clone());
        session
    }

    /// Validate a token by its id; returns `None` when expired or missing.
    pub fn validate_token(&self, token_id: Uuid) -> Option<AuthToken> {
        let mut entry = self.sessions.get_mut(&token_id)?;
        let now = Utc::now();
        if now >= entry.token.expires_at {
            return None;
        }
        entry.last_active = now;
        Some(entry.token.clone())
    }

    /// Revoke a session by its token. Returns `true` when it existed.
    pub fn revoke_session(&self, token_id: Uuid) -> bool {
        let removed = self.sessions.remove(&token_id).is_some();
        if removed {
            info!(token_id = %token_id, "Session revoked");
        }
        removed
    }

    /// List all active (non-expired) sessions for a given user.
    pub fn list_active_sessions(&self, user_id: Uuid) -> Vec<AuthSession> {
        let now = Utc::now();
        self.sessions
            .iter()
            .filter(|e| e.value().token.user_id == user_id && now < e.value().token.expires_at)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now < s.token.expires_at);
        before - self.sessions.len()
    }
}
