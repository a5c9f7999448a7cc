//! Anti-bot challenge handling.
//!
//! The gallog asks for a reCAPTCHA v2 token when it suspects automation. A
//! [`ChallengeResolver`] hands the challenge to a third-party solving service
//! through the [`ChallengeSolver`] capability and returns a
//! [`ChallengeTicket`] that the next delete request replays.

mod anti_captcha;
mod resolver;
mod two_captcha;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use anti_captcha::AntiCaptchaClient;
pub use resolver::ChallengeResolver;
pub use two_captcha::TwoCaptchaClient;

use crate::config::CaptchaConfig;
use crate::error::ChallengeError;

/// An unsolved reCAPTCHA as the solving services need it described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub site_key: String,
    pub page_url: String,
}

/// A challenge together with its solved answer. Valid for one delete attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeTicket {
    pub challenge: Challenge,
    pub answer: String,
}

/// Supported solving services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptchaBackend {
    #[serde(rename = "2captcha")]
    TwoCaptcha,
    #[serde(rename = "anticaptcha")]
    AntiCaptcha,
}

impl fmt::Display for CaptchaBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptchaBackend::TwoCaptcha => write!(f, "2captcha"),
            CaptchaBackend::AntiCaptcha => write!(f, "anticaptcha"),
        }
    }
}

impl FromStr for CaptchaBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2captcha" | "twocaptcha" => Ok(CaptchaBackend::TwoCaptcha),
            "anticaptcha" | "anti-captcha" => Ok(CaptchaBackend::AntiCaptcha),
            other => Err(format!("unknown captcha type: {other}")),
        }
    }
}

/// How long a backend waits for a worker to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_polls: u32,
}

impl From<&CaptchaConfig> for PollSettings {
    fn from(config: &CaptchaConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls.max(1),
        }
    }
}

/// Anything that turns a challenge into a token.
#[allow(async_fn_in_trait)]
pub trait ChallengeSolver {
    async fn solve(&self, challenge: &Challenge) -> Result<String, ChallengeError>;
}

/// The configured solving service.
pub enum CaptchaSolver {
    TwoCaptcha(TwoCaptchaClient),
    AntiCaptcha(AntiCaptchaClient),
}

impl CaptchaSolver {
    pub fn new(
        backend: CaptchaBackend,
        api_key: String,
        config: &CaptchaConfig,
    ) -> Result<Self, ChallengeError> {
        let poll = PollSettings::from(config);
        Ok(match backend {
            CaptchaBackend::TwoCaptcha => CaptchaSolver::TwoCaptcha(TwoCaptchaClient::with_base_url(
                api_key,
                config.two_captcha_url.clone(),
                poll,
            )?),
            CaptchaBackend::AntiCaptcha => CaptchaSolver::AntiCaptcha(
                AntiCaptchaClient::with_base_url(api_key, config.anti_captcha_url.clone(), poll)?,
            ),
        })
    }

    pub fn backend(&self) -> CaptchaBackend {
        match self {
            CaptchaSolver::TwoCaptcha(_) => CaptchaBackend::TwoCaptcha,
            CaptchaSolver::AntiCaptcha(_) => CaptchaBackend::AntiCaptcha,
        }
    }
}

impl ChallengeSolver for CaptchaSolver {
    async fn solve(&self, challenge: &Challenge) -> Result<String, ChallengeError> {
        match self {
            CaptchaSolver::TwoCaptcha(client) => client.solve(challenge).await,
            CaptchaSolver::AntiCaptcha(client) => client.solve(challenge).await,
        }
    }
}

/// Builds the solver a run asked for.
///
/// A missing or blank key disables solving altogether, whatever backend was
/// named. A key without a backend uses 2Captcha.
pub fn solver_for(
    api_key: Option<&str>,
    backend: Option<&str>,
    config: &CaptchaConfig,
) -> Result<Option<CaptchaSolver>, String> {
    let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(None);
    };
    let backend = match backend.map(str::trim).filter(|b| !b.is_empty()) {
        Some(name) => name.parse::<CaptchaBackend>()?,
        None => config.backend,
    };
    CaptchaSolver::new(backend, key.to_string(), config)
        .map(Some)
        .map_err(|e| e.to_string())
}
