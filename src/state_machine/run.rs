use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::RunState;
use crate::error::{EnumerationError, FailureReason};
use crate::model::ContentKind;

/// What happened to one content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
    Deleted,
    Failed(FailureReason),
}

/// Progress snapshot sent to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub current: u32,
    pub total: u32,
    pub message: String,
}

/// Retry behavior for transient delete failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per item, the first one included.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// delay = base_delay_ms * 2^(attempt - 1)
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// An item that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub reason: FailureReason,
}

/// Mutable bookkeeping of one cleanup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub kind: ContentKind,
    /// `None` means every gallery.
    pub gallery: Option<String>,
    pub state: RunState,
    pub state_history: Vec<RunState>,
    pub progress: RunProgress,
    /// Set once, when enumeration finishes.
    pub total_fixed: bool,
    pub succeeded: u32,
    pub failed: u32,
    pub failures: Vec<ItemFailure>,
    pub gallery_failures: Vec<EnumerationError>,
    pub started_at: DateTime<Utc>,
}

impl Run {
    pub fn new(kind: ContentKind, gallery: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            gallery,
            state: RunState::Idle,
            state_history: Vec::new(),
            progress: RunProgress {
                current: 0,
                total: 0,
                message: String::new(),
            },
            total_fixed: false,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            gallery_failures: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// "X deleted, Y failed" as used in terminal messages.
    pub fn tally(&self) -> String {
        format!("{} deleted, {} failed", self.succeeded, self.failed)
    }
}

/// Terminal summary produced once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub kind: ContentKind,
    pub gallery: Option<String>,
    pub terminal_state: RunState,
    pub succeeded: u32,
    pub failed: u32,
    pub total: u32,
    pub last_message: String,
    pub failures: Vec<ItemFailure>,
    pub gallery_failures: Vec<EnumerationError>,
    pub state_transitions: Vec<RunState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunResult {
    pub fn from_run(run: &Run) -> Self {
        let now = Utc::now();
        let mut transitions = run.state_history.clone();
        transitions.push(run.state);

        Self {
            run_id: run.id.clone(),
            kind: run.kind,
            gallery: run.gallery.clone(),
            terminal_state: run.state,
            succeeded: run.succeeded,
            failed: run.failed,
            total: run.progress.total,
            last_message: run.progress.message.clone(),
            failures: run.failures.clone(),
            gallery_failures: run.gallery_failures.clone(),
            state_transitions: transitions,
            started_at: run.started_at,
            finished_at: now,
            duration_ms: (now - run.started_at).num_milliseconds(),
        }
    }
}
