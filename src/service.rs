//! Commands offered to the presentation layer.
//!
//! Everything here speaks in strings and plain values; the engine types stay
//! behind it.

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::cancel::CancelHandle;
use crate::catalog::GalleryCatalog;
use crate::challenge::{ChallengeResolver, solver_for};
use crate::config::CleanerConfig;
use crate::error::{AuthError, CatalogError, RunError, ServiceError};
use crate::model::{ContentKind, Gallery, GalleryFilter};
use crate::orchestrator::{CleanupOrchestrator, RunRequest, RunSettings};
use crate::remote::{Forum, GallogClient};
use crate::session::{Credentials, Session, SessionManager};
use crate::state_machine::{RunProgress, RunResult};

struct LoginState {
    credentials: Credentials,
    session: Session,
}

/// Clears the "run active" flag and the cancel slot when a run ends, however it ends.
struct RunGuard<'a> {
    active: &'a AtomicBool,
    cancel: &'a StdMutex<Option<CancelHandle>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.active.store(false, Ordering::Release);
    }
}

pub struct CleanerService<F = GallogClient> {
    forum: F,
    config: CleanerConfig,
    login: Mutex<Option<LoginState>>,
    active: AtomicBool,
    cancel: StdMutex<Option<CancelHandle>>,
}

impl CleanerService<GallogClient> {
    pub fn from_config(config: CleanerConfig) -> Self {
        Self::new(GallogClient::new(&config), config)
    }
}

impl<F: Forum> CleanerService<F> {
    pub fn new(forum: F, config: CleanerConfig) -> Self {
        Self {
            forum,
            config,
            login: Mutex::new(None),
            active: AtomicBool::new(false),
            cancel: StdMutex::new(None),
        }
    }

    /// `Ok(false)` for malformed or refused credentials; `Err` only when the
    /// server could not be reached.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<bool, ServiceError> {
        let credentials = Credentials::new(identity, secret);
        match SessionManager::new(&self.forum).login(&credentials).await {
            Ok(session) => {
                *self.login.lock().await = Some(LoginState {
                    credentials,
                    session,
                });
                Ok(true)
            }
            Err(AuthError::InvalidCredentialsFormat | AuthError::AuthRejected) => {
                *self.login.lock().await = None;
                Ok(false)
            }
            Err(AuthError::Unreachable(message)) => Err(ServiceError::Transport(message)),
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.login.lock().await.is_some()
    }

    /// Galleries for `post_type` ("posting" or "comment").
    ///
    /// An expired session is renewed once with the stored credentials.
    pub async fn get_galleries(&self, post_type: &str) -> Result<Vec<Gallery>, String> {
        let kind: ContentKind = post_type.parse()?;
        let mut guard = self.login.lock().await;
        let state = guard.as_mut().ok_or_else(|| RunError::NotLoggedIn.to_string())?;

        let catalog = GalleryCatalog::new(&self.forum);
        match catalog.list_galleries(&state.session, kind).await {
            Err(CatalogError::SessionExpired) => {
                info!("session expired, logging in again");
                state.session = SessionManager::new(&self.forum)
                    .login(&state.credentials)
                    .await
                    .map_err(|e| e.to_string())?;
                catalog
                    .list_galleries(&state.session, kind)
                    .await
                    .map_err(|e| e.to_string())
            }
            other => other.map_err(|e| e.to_string()),
        }
    }

    /// Runs a cleanup to its end and returns the full result.
    pub async fn run_cleaning(
        &self,
        kind: ContentKind,
        gallery: GalleryFilter,
        captcha_key: Option<&str>,
        captcha_type: Option<&str>,
        progress: &UnboundedSender<RunProgress>,
    ) -> Result<RunResult, RunError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RunError::RunAlreadyInProgress);
        }
        let cancel = CancelHandle::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());
        let _guard = RunGuard {
            active: &self.active,
            cancel: &self.cancel,
        };

        let credentials = match self.login.lock().await.as_ref() {
            Some(state) => state.credentials.clone(),
            None => return Err(RunError::NotLoggedIn),
        };

        let key = captcha_key
            .filter(|k| !k.trim().is_empty())
            .or(Some(self.config.captcha.api_key.as_str()));
        let solver = solver_for(key, captcha_type, &self.config.captcha)
            .map_err(RunError::InvalidRequest)?;
        if solver.is_none() {
            warn!("no captcha key configured, challenged items will fail");
        }

        let orchestrator = CleanupOrchestrator::new(
            &self.forum,
            ChallengeResolver::new(solver),
            RunSettings::from(&self.config),
        );
        let request = RunRequest {
            credentials,
            kind,
            gallery,
        };
        Ok(orchestrator.run(request, progress, &cancel).await)
    }

    /// String-typed form of [`run_cleaning`](Self::run_cleaning); answers with
    /// the final status message.
    pub async fn start_cleaning(
        &self,
        post_type: &str,
        gallery_id: Option<&str>,
        captcha_key: Option<&str>,
        captcha_type: Option<&str>,
        progress: &UnboundedSender<RunProgress>,
    ) -> Result<String, String> {
        let kind: ContentKind = post_type.parse()?;
        self.run_cleaning(
            kind,
            GalleryFilter::from_option(gallery_id),
            captcha_key,
            captcha_type,
            progress,
        )
        .await
        .map(|result| result.last_message)
        .map_err(|e| e.to_string())
    }

    /// Asks the active run to stop. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(handle) => {
                info!("cancellation requested");
                handle.cancel();
                true
            }
            None => false,
        }
    }
}
