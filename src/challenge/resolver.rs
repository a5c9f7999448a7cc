use tracing::{info, warn};

use super::{Challenge, ChallengeSolver, ChallengeTicket};
use crate::error::ChallengeError;

/// Resolves challenges on demand. Without a solver every challenge fails
/// locally and no solving service is contacted.
pub struct ChallengeResolver<S> {
    solver: Option<S>,
}

impl<S: ChallengeSolver> ChallengeResolver<S> {
    pub fn new(solver: Option<S>) -> Self {
        Self { solver }
    }

    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// Solves `challenge`, retrying once if the solver times out.
    pub async fn resolve(&self, challenge: Challenge) -> Result<ChallengeTicket, ChallengeError> {
        let Some(solver) = &self.solver else {
            return Err(ChallengeError::ChallengeRequiredNoSolver);
        };

        let answer = match solver.solve(&challenge).await {
            Err(ChallengeError::ChallengeTimeout) => {
                warn!(page = %challenge.page_url, "captcha solve timed out, retrying once");
                solver.solve(&challenge).await?
            }
            other => other?,
        };

        info!(page = %challenge.page_url, "captcha solved");
        Ok(ChallengeTicket { challenge, answer })
    }
}
