//! Admin authentication module.
//!
//! Provides a single static admin credential verified server-side:
//! - Credentials come from the environment, never from client code
//! - Passwords are compared as SHA-256 digests
//! - Successful logins mint random bearer tokens held in process memory

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during authentication
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Admin login is not configured")]
    NotConfigured,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid session token")]
    InvalidToken,
}

/// Configuration for the admin login
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Admin username
    pub username: String,
    /// SHA-256 hex digest of the admin password
    pub password_digest: String,
}

impl AdminConfig {
    /// Create a config from a plain-text credential pair
    pub fn new(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            password_digest: sha256_hex(password),
        }
    }

    /// Build from optional settings, failing when either half is missing
    pub fn from_settings(
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, AuthError> {
        match (username, password) {
            (Some(username), Some(password))
                if !username.is_empty() && !password.is_empty() =>
            {
                Ok(Self::new(username, &password))
            }
            _ => Err(AuthError::NotConfigured),
        }
    }
}

/// An open admin session
#[derive(Debug, Clone)]
pub struct Session {
    /// Logged-in username
    pub username: String,
    /// Unix timestamp of login
    pub created_at: i64,
}

/// Admin login service with in-memory bearer sessions
pub struct AdminAuth {
    config: Option<AdminConfig>,
    sessions: DashMap<String, Session>,
}

impl AdminAuth {
    /// Create a new service from a validated config
    pub fn new(config: AdminConfig) -> Self {
        Self {
            config: Some(config),
            sessions: DashMap::new(),
        }
    }

    /// Create without credentials (logins will fail with 503)
    pub fn unconfigured() -> Self {
        Self {
            config: None,
            sessions: DashMap::new(),
        }
    }

    /// Verify a credential pair and open a session
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let config = self.config.as_ref().ok_or(AuthError::NotConfigured)?;
        if username != config.username || sha256_hex(password) != config.password_digest {
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_session_token();
        self.sessions.insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );

        info!("Admin session opened for {}", username);
        Ok(token)
    }

    /// Look up the session behind a bearer token
    pub fn session(&self, token: &str) -> Result<Session, AuthError> {
        self.sessions
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or(AuthError::InvalidToken)
    }

    /// Close a session. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            info!("Admin session closed");
        }
    }
}

/// Generate a secure session token
fn generate_session_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    let mut hasher = Sha256::new();
    hasher.update(&random_bytes);
    hasher.update(chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hex::encode(hasher.finalize())
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}
