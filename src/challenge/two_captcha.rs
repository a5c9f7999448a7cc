use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use super::{Challenge, ChallengeSolver, PollSettings};
use crate::error::ChallengeError;

const NOT_READY: &str = "CAPCHA_NOT_READY";

/// Client for the 2Captcha `in.php` / `res.php` API.
pub struct TwoCaptchaClient {
    api_key: String,
    client: Client,
    base_url: String,
    poll: PollSettings,
}

/// Both endpoints answer `{"status": 0|1, "request": "..."}` in JSON mode.
#[derive(Debug, Deserialize)]
struct Reply {
    status: i64,
    #[serde(default)]
    request: String,
}

impl TwoCaptchaClient {
    /// `base_url` comes from the `[captcha]` config table.
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        poll: PollSettings,
    ) -> Result<Self, ChallengeError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll,
        })
    }

    async fn submit(&self, challenge: &Challenge) -> Result<String, ChallengeError> {
        let reply = self
            .client
            .post(format!("{}/in.php", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("method", "userrecaptcha"),
                ("googlekey", challenge.site_key.as_str()),
                ("pageurl", challenge.page_url.as_str()),
                ("json", "1"),
            ])
            .send()
            .await?
            .json::<Reply>()
            .await?;

        if reply.status != 1 {
            return Err(ChallengeError::Rejected(format!(
                "2captcha submit failed: {}",
                reply.request
            )));
        }
        Ok(reply.request)
    }
}

impl ChallengeSolver for TwoCaptchaClient {
    async fn solve(&self, challenge: &Challenge) -> Result<String, ChallengeError> {
        let request_id = self.submit(challenge).await?;
        debug!(request_id = %request_id, "2captcha task submitted");

        for _ in 0..self.poll.max_polls {
            sleep(self.poll.interval).await;
            let reply = self
                .client
                .get(format!("{}/res.php", self.base_url))
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("action", "get"),
                    ("id", request_id.as_str()),
                    ("json", "1"),
                ])
                .send()
                .await?
                .json::<Reply>()
                .await?;

            if reply.status == 1 {
                return Ok(reply.request);
            }
            if reply.request != NOT_READY {
                return Err(ChallengeError::Rejected(format!(
                    "2captcha error: {}",
                    reply.request
                )));
            }
        }

        Err(ChallengeError::ChallengeTimeout)
    }
}
