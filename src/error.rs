use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of the login handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity and password must not be empty")]
    InvalidCredentialsFormat,

    #[error("login rejected by the server")]
    AuthRejected,

    #[error("login server unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("gallery list unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("session expired while listing galleries")]
    SessionExpired,
}

/// Errors surfaced while walking the activity log.
///
/// [`Gallery`](EnumerationError::Gallery) is recorded and skipped; the other
/// variants end the enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnumerationError {
    #[error("gallery {gallery}: {message}")]
    Gallery { gallery: String, message: String },

    #[error("session expired during enumeration")]
    SessionExpired,

    #[error("enumeration failed: {0}")]
    EnumerationFailed(String),
}

impl EnumerationError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EnumerationError::Gallery { .. })
    }
}

/// Failures of a captcha solving attempt.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge required but no solver is configured")]
    ChallengeRequiredNoSolver,

    #[error("captcha solver did not answer in time")]
    ChallengeTimeout,

    #[error("captcha solver refused the task: {0}")]
    Rejected(String),

    #[error("captcha solver unreachable: {0}")]
    Network(#[from] reqwest::Error),
}

/// Why a single item could not be deleted. Recorded, never fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    ChallengeRequiredNoSolver,
    ChallengeTimeout,
    ChallengeRetryExhausted,
    ChallengeSolverFailed(String),
    /// Rate limiting or transport errors outlasted every attempt.
    Transient,
    Remote(u16),
    /// The server answered with something that could not be read.
    UnexpectedResponse(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::ChallengeRequiredNoSolver => write!(f, "captcha required, no solver"),
            FailureReason::ChallengeTimeout => write!(f, "captcha solver timed out"),
            FailureReason::ChallengeRetryExhausted => write!(f, "captcha retry exhausted"),
            FailureReason::ChallengeSolverFailed(msg) => write!(f, "captcha solver failed: {msg}"),
            FailureReason::Transient => write!(f, "transient failure, retries exhausted"),
            FailureReason::Remote(code) => write!(f, "remote refused (status {code})"),
            FailureReason::UnexpectedResponse(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

/// The executor signals this instead of a per-item outcome: every later item
/// would fail the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session expired")]
pub struct SessionExpired;

/// Conditions that stop a run before or instead of its deletion phase.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("a cleanup run is already in progress")]
    RunAlreadyInProgress,

    #[error("login required")]
    NotLoggedIn,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures the service facade cannot fold into a plain `false`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),
}
