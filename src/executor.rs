//! Deletes one content item with bounded retries.
//!
//! Classification of a delete attempt:
//! - success or already gone: `Deleted`
//! - challenge: solve it, then retry exactly once with the ticket
//! - rate limited or transport failure: exponential backoff, `max_attempts` in total
//! - session rejected: [`SessionExpired`], which ends the whole run
//! - refused with a status: `Failed(Remote(status))`
//! - unreadable reply: `Failed(UnexpectedResponse(..))`

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::challenge::{ChallengeResolver, ChallengeSolver};
use crate::error::{ChallengeError, FailureReason, SessionExpired};
use crate::model::ContentItem;
use crate::remote::{DeleteResponse, Forum, RemoteError};
use crate::session::Session;
use crate::state_machine::{ItemOutcome, RetryConfig};

pub struct DeletionExecutor<'a, F, S> {
    forum: &'a F,
    resolver: &'a ChallengeResolver<S>,
    retry: RetryConfig,
}

/// Where the transient-retry loop ended up.
enum Attempt {
    Answered(DeleteResponse),
    Unreadable(String),
    Exhausted,
}

impl<'a, F: Forum, S: ChallengeSolver> DeletionExecutor<'a, F, S> {
    pub fn new(forum: &'a F, resolver: &'a ChallengeResolver<S>, retry: RetryConfig) -> Self {
        Self {
            forum,
            resolver,
            retry,
        }
    }

    pub async fn delete_one(
        &self,
        session: &Session,
        item: &ContentItem,
    ) -> Result<ItemOutcome, SessionExpired> {
        let outcome = match self.send_with_retry(session, item).await? {
            Attempt::Answered(DeleteResponse::Deleted) => ItemOutcome::Deleted,
            Attempt::Answered(DeleteResponse::NotFound) => {
                debug!(item = %item.id, "already gone");
                ItemOutcome::Deleted
            }
            Attempt::Answered(DeleteResponse::ChallengeRequired) => {
                self.answer_challenge(session, item).await?
            }
            Attempt::Answered(DeleteResponse::Rejected { status, message }) => {
                warn!(item = %item.id, status, %message, "delete refused");
                ItemOutcome::Failed(FailureReason::Remote(status))
            }
            Attempt::Unreadable(message) => {
                ItemOutcome::Failed(FailureReason::UnexpectedResponse(message))
            }
            Attempt::Exhausted => ItemOutcome::Failed(FailureReason::Transient),
        };

        match &outcome {
            ItemOutcome::Deleted => info!(item = %item.id, "deleted"),
            ItemOutcome::Failed(reason) => warn!(item = %item.id, %reason, "delete failed"),
        }
        Ok(outcome)
    }

    async fn send_with_retry(
        &self,
        session: &Session,
        item: &ContentItem,
    ) -> Result<Attempt, SessionExpired> {
        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let error = match self.forum.delete(session, item, None).await {
                Ok(response) => return Ok(Attempt::Answered(response)),
                Err(RemoteError::AuthInvalid) => {
                    session.invalidate();
                    return Err(SessionExpired);
                }
                Err(e) if e.is_transient() => e,
                Err(RemoteError::Status { status, message }) => {
                    return Ok(Attempt::Answered(DeleteResponse::Rejected { status, message }));
                }
                Err(RemoteError::Parse(message)) => return Ok(Attempt::Unreadable(message)),
                Err(e) => return Ok(Attempt::Unreadable(e.to_string())),
            };

            if attempt == max_attempts {
                warn!(item = %item.id, attempt, error = %error, "giving up after transient failures");
                break;
            }
            let mut delay_ms = self.retry.delay_for_attempt(attempt);
            if let RemoteError::RateLimited { retry_after_ms } = error {
                delay_ms = delay_ms.max(retry_after_ms);
            }
            log_retry(&item.id, attempt, max_attempts, &error, delay_ms);
            sleep(Duration::from_millis(delay_ms)).await;
        }
        Ok(Attempt::Exhausted)
    }

    async fn answer_challenge(
        &self,
        session: &Session,
        item: &ContentItem,
    ) -> Result<ItemOutcome, SessionExpired> {
        let challenge = self.forum.challenge_for(session, item);
        let ticket = match self.resolver.resolve(challenge).await {
            Ok(ticket) => ticket,
            Err(ChallengeError::ChallengeRequiredNoSolver) => {
                return Ok(ItemOutcome::Failed(FailureReason::ChallengeRequiredNoSolver));
            }
            Err(ChallengeError::ChallengeTimeout) => {
                return Ok(ItemOutcome::Failed(FailureReason::ChallengeTimeout));
            }
            Err(e) => {
                return Ok(ItemOutcome::Failed(FailureReason::ChallengeSolverFailed(
                    e.to_string(),
                )));
            }
        };

        match self.forum.delete(session, item, Some(&ticket)).await {
            Ok(DeleteResponse::Deleted | DeleteResponse::NotFound) => Ok(ItemOutcome::Deleted),
            Err(RemoteError::AuthInvalid) => {
                session.invalidate();
                Err(SessionExpired)
            }
            Ok(other) => {
                debug!(item = %item.id, response = ?other, "delete with ticket still refused");
                Ok(ItemOutcome::Failed(FailureReason::ChallengeRetryExhausted))
            }
            Err(e) => {
                debug!(item = %item.id, error = %e, "delete with ticket failed");
                Ok(ItemOutcome::Failed(FailureReason::ChallengeRetryExhausted))
            }
        }
    }
}

fn log_retry(item: &str, attempt: u32, max: u32, error: &RemoteError, delay_ms: u64) {
    warn!(item, attempt, max, error = %error, delay_ms, "retrying delete");
}
