//! Authentication state for a single run.
//!
//! A [`Session`] is produced by [`SessionManager::login`] and owns the cookie
//! jar that proves the login to the gallog. It is never persisted and is
//! dropped when the run that created it ends.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::cookie::Jar;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::remote::{Forum, RemoteError};

/// Identity and secret typed in by the user. Kept in memory only.
#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Local shape check done before any request goes out.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.identity.trim().is_empty() || self.secret.is_empty() {
            return Err(AuthError::InvalidCredentialsFormat);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An authenticated context against the gallog.
pub struct Session {
    user_id: String,
    http: Client,
    jar: Arc<Jar>,
    established_at: DateTime<Utc>,
    valid: AtomicBool,
}

impl Session {
    pub fn new(user_id: impl Into<String>, http: Client, jar: Arc<Jar>) -> Self {
        Self {
            user_id: user_id.into(),
            http,
            jar,
            established_at: Utc::now(),
            valid: AtomicBool::new(true),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Marks the session unusable, e.g. after the server rejected its cookies.
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            warn!(user = %self.user_id, "session invalidated");
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("established_at", &self.established_at)
            .field("valid", &self.is_valid())
            .finish_non_exhaustive()
    }
}

/// Performs the login handshake. Never retries: a failed login is reported as is.
pub struct SessionManager<'a, F> {
    forum: &'a F,
}

impl<'a, F: Forum> SessionManager<'a, F> {
    pub fn new(forum: &'a F) -> Self {
        Self { forum }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        credentials.validate()?;

        let identity = credentials.identity.trim();
        match self.forum.open_session(identity, &credentials.secret).await {
            Ok(Some(session)) => {
                info!(user = %session.user_id(), "logged in");
                Ok(session)
            }
            Ok(None) => {
                warn!(user = %identity, "login rejected");
                Err(AuthError::AuthRejected)
            }
            Err(RemoteError::AuthInvalid) => Err(AuthError::AuthRejected),
            Err(e) => {
                warn!(user = %identity, error = %e, "login request failed");
                Err(AuthError::Unreachable(e.to_string()))
            }
        }
    }
}
