use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, sleep_until};
use tracing::{info, warn};

use crate::cancel::CancelHandle;
use crate::challenge::{ChallengeResolver, ChallengeSolver};
use crate::config::{CleanerConfig, MAX_CONCURRENCY};
use crate::enumerator::ContentEnumerator;
use crate::error::{EnumerationError, SessionExpired};
use crate::executor::DeletionExecutor;
use crate::model::{ContentItem, ContentKind, GalleryFilter};
use crate::remote::Forum;
use crate::session::{Credentials, Session, SessionManager};
use crate::state_machine::{
    AbortReason, ItemOutcome, RetryConfig, Run, RunEvent, RunProgress, RunResult, StateMachine,
};

/// Knobs of a run that come from configuration.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Deletes in flight at once, 1..=4.
    pub concurrency: usize,
    pub retry: RetryConfig,
    /// Pause before each dispatched delete after the first.
    pub dispatch_delay: Duration,
    pub max_pages: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from(&CleanerConfig::default())
    }
}

impl From<&CleanerConfig> for RunSettings {
    fn from(config: &CleanerConfig) -> Self {
        Self {
            concurrency: config.concurrency.clamp(1, MAX_CONCURRENCY),
            retry: RetryConfig {
                max_attempts: config.max_attempts.max(1),
                base_delay_ms: config.base_delay_ms,
            },
            dispatch_delay: Duration::from_millis(config.dispatch_delay_ms),
            max_pages: config.max_pages,
        }
    }
}

/// What to clean.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub credentials: Credentials,
    pub kind: ContentKind,
    pub gallery: GalleryFilter,
}

/// Why the delete loop stopped dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Cancelled,
    SessionExpired,
}

/// Drives one cleanup run: login, enumeration, deletion.
pub struct CleanupOrchestrator<'a, F, S> {
    forum: &'a F,
    resolver: ChallengeResolver<S>,
    settings: RunSettings,
}

impl<'a, F: Forum, S: ChallengeSolver> CleanupOrchestrator<'a, F, S> {
    pub fn new(forum: &'a F, resolver: ChallengeResolver<S>, settings: RunSettings) -> Self {
        Self {
            forum,
            resolver,
            settings,
        }
    }

    /// Run to a terminal state, sending a progress snapshot after every transition.
    ///
    /// Progress is sent in the order produced; a closed receiver is ignored.
    pub async fn run(
        &self,
        request: RunRequest,
        progress: &UnboundedSender<RunProgress>,
        cancel: &CancelHandle,
    ) -> RunResult {
        let gallery = match &request.gallery {
            GalleryFilter::All => None,
            GalleryFilter::Only(id) => Some(id.clone()),
        };
        let mut run = Run::new(request.kind, gallery);
        info!(run_id = %run.id, kind = %request.kind, gallery = run.gallery.as_deref().unwrap_or("*"), "run started");

        advance(&mut run, RunEvent::Start, progress);
        if cancel.is_cancelled() {
            advance(&mut run, RunEvent::Cancel, progress);
            return finish(&run);
        }

        let session = match SessionManager::new(self.forum).login(&request.credentials).await {
            Ok(session) => session,
            Err(e) => {
                advance(
                    &mut run,
                    RunEvent::Abort {
                        reason: AbortReason::AuthFailed,
                        detail: e.to_string(),
                    },
                    progress,
                );
                return finish(&run);
            }
        };
        advance(&mut run, RunEvent::Authenticated, progress);

        let items = match self.enumerate(&mut run, &session, &request, progress, cancel).await {
            Some(items) => items,
            None => return finish(&run),
        };

        let total = items.len() as u32;
        advance(&mut run, RunEvent::Enumerated { total }, progress);
        if run.state.is_terminal() {
            return finish(&run);
        }

        match self.delete_all(&mut run, &session, items, progress, cancel).await {
            Some(Halt::SessionExpired) if !run.state.is_terminal() => {
                advance(
                    &mut run,
                    RunEvent::Abort {
                        reason: AbortReason::SessionExpired,
                        detail: String::new(),
                    },
                    progress,
                );
            }
            Some(Halt::Cancelled) if !run.state.is_terminal() => {
                advance(&mut run, RunEvent::Cancel, progress);
            }
            _ => {}
        }

        finish(&run)
    }

    /// Drains the enumeration. `None` means the run already reached a terminal state.
    async fn enumerate(
        &self,
        run: &mut Run,
        session: &Session,
        request: &RunRequest,
        progress: &UnboundedSender<RunProgress>,
        cancel: &CancelHandle,
    ) -> Option<Vec<ContentItem>> {
        let walk = ContentEnumerator::new(self.forum, self.settings.max_pages).enumerate(
            session,
            request.kind,
            request.gallery.clone(),
        );
        let drained = walk.drain(cancel).await;
        run.gallery_failures = drained.gallery_failures;

        if drained.cancelled {
            advance(run, RunEvent::Cancel, progress);
            return None;
        }

        let abort = match drained.fatal {
            Some(EnumerationError::SessionExpired) => {
                Some((AbortReason::SessionExpired, String::new()))
            }
            Some(e) => Some((AbortReason::EnumerationFailed, e.to_string())),
            None if drained.items.is_empty() && !run.gallery_failures.is_empty() => Some((
                AbortReason::EnumerationFailed,
                format!("all {} galleries failed", run.gallery_failures.len()),
            )),
            None => None,
        };
        if let Some((reason, detail)) = abort {
            advance(run, RunEvent::Abort { reason, detail }, progress);
            return None;
        }

        if !run.gallery_failures.is_empty() {
            warn!(
                run_id = %run.id,
                failed_galleries = run.gallery_failures.len(),
                "continuing with partial enumeration"
            );
        }
        Some(drained.items)
    }

    /// Deletes items with bounded parallelism, counting outcomes by completion.
    ///
    /// Consecutive dispatches are at least `dispatch_delay` apart; the cancel
    /// flag is checked again after every wait.
    async fn delete_all(
        &self,
        run: &mut Run,
        session: &Session,
        items: Vec<ContentItem>,
        progress: &UnboundedSender<RunProgress>,
        cancel: &CancelHandle,
    ) -> Option<Halt> {
        let executor = DeletionExecutor::new(self.forum, &self.resolver, self.settings.retry.clone());
        let executor = &executor;
        let dispatch_delay = self.settings.dispatch_delay;
        let concurrency = self.settings.concurrency.clamp(1, MAX_CONCURRENCY);

        let mut queue = items.into_iter().peekable();
        let mut in_flight = FuturesUnordered::new();
        let mut next_dispatch: Option<Instant> = None;
        let mut halt = None;

        loop {
            let slot_free = halt.is_none() && in_flight.len() < concurrency && queue.peek().is_some();
            if !slot_free {
                match in_flight.next().await {
                    Some((item, outcome)) => settle(run, session, item, outcome, progress, &mut halt),
                    None => break,
                }
                continue;
            }

            if cancel.is_cancelled() {
                info!(run_id = %run.id, "cancellation requested, draining in-flight deletes");
                halt = Some(Halt::Cancelled);
                continue;
            }

            if let Some(at) = next_dispatch
                && Instant::now() < at
            {
                if in_flight.is_empty() {
                    sleep_until(at).await;
                } else {
                    tokio::select! {
                        _ = sleep_until(at) => {}
                        Some((item, outcome)) = in_flight.next() => {
                            settle(run, session, item, outcome, progress, &mut halt);
                        }
                    }
                }
                // re-evaluate slots and the cancel flag after waiting
                continue;
            }

            let Some(item) = queue.next() else { continue };
            next_dispatch = Some(Instant::now() + dispatch_delay);
            in_flight.push(async move {
                let outcome = executor.delete_one(session, &item).await;
                (item, outcome)
            });
        }

        halt
    }
}

/// Folds one finished delete into the run.
fn settle(
    run: &mut Run,
    session: &Session,
    item: ContentItem,
    outcome: Result<ItemOutcome, SessionExpired>,
    progress: &UnboundedSender<RunProgress>,
    halt: &mut Option<Halt>,
) {
    match outcome {
        Ok(outcome) => {
            let event = RunEvent::ItemResolved {
                item_id: item.id,
                outcome,
            };
            advance(run, event, progress);
        }
        Err(SessionExpired) => {
            let age_secs = (Utc::now() - session.established_at()).num_seconds();
            warn!(run_id = %run.id, item = %item.id, age_secs, "session expired, stopping dispatch");
            *halt = Some(Halt::SessionExpired);
        }
    }
}

/// Applies `event` and publishes the resulting progress.
fn advance(run: &mut Run, event: RunEvent, progress: &UnboundedSender<RunProgress>) {
    match StateMachine::next(run, event) {
        Ok(_) => {
            let _ = progress.send(run.progress.clone());
        }
        Err(e) => warn!(run_id = %run.id, error = %e, "ignored invalid transition"),
    }
}

fn finish(run: &Run) -> RunResult {
    let result = RunResult::from_run(run);
    info!(
        run_id = %result.run_id,
        state = %result.terminal_state,
        succeeded = result.succeeded,
        failed = result.failed,
        total = result.total,
        "run finished"
    );
    result
}
