use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::debug;

use super::{Challenge, ChallengeSolver, PollSettings};
use crate::error::ChallengeError;


/// Client for the Anti-Captcha `createTask` / `getTaskResult` API.
pub struct AntiCaptchaClient {
    api_key: String,
    client: Client,
    base_url: String,
    poll: PollSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskReply {
    #[serde(default = "error_id_missing")]
    error_id: i64,
    task_id: Option<i64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultReply {
    #[serde(default = "error_id_missing")]
    error_id: i64,
    status: Option<String>,
    solution: Option<Solution>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Solution {
    g_recaptcha_response: String,
}

// A reply without errorId is treated as an error.
fn error_id_missing() -> i64 {
    1
}

impl AntiCaptchaClient {
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

    async fn create_task(&self, challenge: &Challenge) -> Result<i64, ChallengeError> {
        let reply = self
            .client
            .post(format!("{}/createTask", self.base_url))
            .json(&json!({
                "clientKey": self.api_key,
                "task": {
                    "type": "RecaptchaV2TaskProxyless",
                    "websiteURL": challenge.page_url,
                    "websiteKey": challenge.site_key,
                }
            }))
            .send()
            .await?
            .json::<CreateTaskReply>()
            .await?;

        match (reply.error_id, reply.task_id) {
            (0, Some(task_id)) => Ok(task_id),
            _ => Err(ChallengeError::Rejected(format!(
                "anti-captcha createTask failed: {}",
                reply.error_description.unwrap_or_default()
            ))),
        }
    }
}

impl ChallengeSolver for AntiCaptchaClient {
    async fn solve(&self, challenge: &Challenge) -> Result<String, ChallengeError> {
        let task_id = self.create_task(challenge).await?;
        debug!(task_id, "anti-captcha task created");

        for _ in 0..self.poll.max_polls {
            sleep(self.poll.interval).await;
            let reply = self
                .client
                .post(format!("{}/getTaskResult", self.base_url))
                .json(&json!({
                    "clientKey": self.api_key,
                    "taskId": task_id,
                }))
                .send()
                .await?
                .json::<TaskResultReply>()
                .await?;

            if reply.error_id != 0 {
                return Err(ChallengeError::Rejected(format!(
                    "anti-captcha getTaskResult failed: {}",
                    reply.error_description.unwrap_or_default()
                )));
            }
            if reply.status.as_deref() == Some("ready") {
                return reply
                    .solution
                    .map(|s| s.g_recaptcha_response)
                    .ok_or_else(|| ChallengeError::Rejected("ready task without solution".into()));
            }
        }

        Err(ChallengeError::ChallengeTimeout)
    }
}
