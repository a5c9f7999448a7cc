use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::run::{ItemFailure, ItemOutcome, Run};

/// Why a run stopped before finishing its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    AuthFailed,
    EnumerationFailed,
    SessionExpired,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::AuthFailed => write!(f, "login failed"),
            AbortReason::EnumerationFailed => write!(f, "enumeration failed"),
            AbortReason::SessionExpired => write!(f, "session expired"),
        }
    }
}

/// States of a cleanup run.
///
/// IDLE → AUTHENTICATING → ENUMERATING → DELETING → COMPLETED, with CANCELLED
/// and ABORTED as the other terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Authenticating,
    Enumerating,
    Deleting,
    Completed,
    Cancelled,
    Aborted(AbortReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::Aborted(_)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Authenticating => write!(f, "AUTHENTICATING"),
            RunState::Enumerating => write!(f, "ENUMERATING"),
            RunState::Deleting => write!(f, "DELETING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Cancelled => write!(f, "CANCELLED"),
            RunState::Aborted(reason) => write!(f, "ABORTED({reason})"),
        }
    }
}

/// Inputs that drive a run forward.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Start,
    Authenticated,
    /// Enumeration drained; `total` is the deduplicated item count.
    Enumerated { total: u32 },
    ItemResolved { item_id: String, outcome: ItemOutcome },
    Cancel,
    Abort { reason: AbortReason, detail: String },
}

/// The result of applying an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Moved to a new non-terminal state.
    Next(RunState),
    /// Stayed in the current state (an item finished but others remain).
    Stay(RunState),
    /// Reached a terminal state.
    Complete(RunState),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("event {event} is not valid in state {state}")]
pub struct InvalidTransition {
    pub state: RunState,
    pub event: String,
}

/// Drives a [`Run`] through its states and keeps its progress consistent.
pub struct StateMachine;

impl StateMachine {
    /// Apply `event` to `run`, updating state, history, counters and the
    /// progress message.
    ///
    /// `total` is fixed exactly once by `Enumerated`; `current` only grows
    /// and never passes `total`.
    pub fn next(run: &mut Run, event: RunEvent) -> Result<Transition, InvalidTransition> {
        let invalid = |run: &Run, event: &RunEvent| InvalidTransition {
            state: run.state,
            event: format!("{event:?}"),
        };

        if run.state.is_terminal() {
            return Err(invalid(run, &event));
        }

        let target = match (&run.state, &event) {
            (RunState::Idle, RunEvent::Start) => {
                run.progress.message = "logging in".to_string();
                RunState::Authenticating
            }
            (RunState::Authenticating, RunEvent::Authenticated) => {
                run.progress.message = "enumeration started".to_string();
                RunState::Enumerating
            }
            (RunState::Enumerating, RunEvent::Enumerated { total }) => {
                if run.total_fixed {
                    return Err(invalid(run, &event));
                }
                run.total_fixed = true;
                run.progress.total = *total;
                if *total == 0 {
                    run.progress.message = "nothing to delete".to_string();
                    RunState::Completed
                } else {
                    run.progress.message = format!("found {total} items, deleting");
                    RunState::Deleting
                }
            }
            (RunState::Deleting, RunEvent::ItemResolved { item_id, outcome }) => {
                if run.progress.current >= run.progress.total {
                    return Err(invalid(run, &event));
                }
                run.progress.current += 1;
                let position = format!("({}/{})", run.progress.current, run.progress.total);
                match outcome {
                    ItemOutcome::Deleted => {
                        run.succeeded += 1;
                        run.progress.message = format!("deleted #{item_id} {position}");
                    }
                    ItemOutcome::Failed(reason) => {
                        run.failed += 1;
                        run.progress.message = format!("failed #{item_id}: {reason} {position}");
                        run.failures.push(ItemFailure {
                            item_id: item_id.clone(),
                            reason: reason.clone(),
                        });
                    }
                }
                if run.progress.current == run.progress.total {
                    run.progress.message = format!("completed: {}", run.tally());
                    RunState::Completed
                } else {
                    RunState::Deleting
                }
            }
            (_, RunEvent::Cancel) => {
                run.progress.message = format!("cancelled: {}", run.tally());
                RunState::Cancelled
            }
            (
                RunState::Authenticating | RunState::Enumerating | RunState::Deleting,
                RunEvent::Abort { reason, detail },
            ) => {
                run.progress.message = if detail.is_empty() {
                    format!("aborted ({reason}): {}", run.tally())
                } else {
                    format!("aborted ({reason}: {detail}): {}", run.tally())
                };
                RunState::Aborted(*reason)
            }
            _ => return Err(invalid(run, &event)),
        };

        let transition = if target.is_terminal() {
            Transition::Complete(target)
        } else if target == run.state {
            Transition::Stay(target)
        } else {
            Transition::Next(target)
        };

        if target != run.state {
            run.state_history.push(run.state);
            run.state = target;
        }

        Ok(transition)
    }
}
