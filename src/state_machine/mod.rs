mod run;
mod state;

pub use run::{ItemFailure, ItemOutcome, RetryConfig, Run, RunProgress, RunResult};
pub use state::{AbortReason, InvalidTransition, RunEvent, RunState, StateMachine, Transition};
