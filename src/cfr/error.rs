//! Error taxonomy shared by the game contract and the solvers.
//!
//! Two of the variants are caller bugs surfaced immediately
//! (`IllegalAction`, `InvalidState`); `ConvergenceTimeout` is a cooperative
//! stop signal that training recovers from; `UnsupportedTopology` rejects
//! game shapes the solvers were not built for at construction time.

use std::time::{Duration, Instant};

/// Errors produced by games and solvers in this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// An action outside the current legal set was applied.
    ///
    /// Always a caller bug. The offending player and a label for the action
    /// are carried for diagnostics.
    IllegalAction {
        /// Player that attempted the action.
        player: usize,
        /// Display label of the rejected action.
        action: String,
    },

    /// An operation was attempted on a terminal or malformed state.
    InvalidState(&'static str),

    /// Training exceeded its wall-clock budget.
    ///
    /// Recoverable: the training loop stops at the next iteration boundary
    /// and the strategy accumulated so far stays valid.
    ConvergenceTimeout {
        /// Time spent when the deadline fired.
        elapsed: Duration,
    },

    /// A solver was asked to handle a player count or action-space shape it
    /// was not built for.
    UnsupportedTopology(String),
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::IllegalAction { player, action } => {
                write!(f, "illegal action {} by player {}", action, player)
            }
            SolverError::InvalidState(what) => {
                write!(f, "invalid state: {}", what)
            }
            SolverError::ConvergenceTimeout { elapsed } => {
                write!(f, "training deadline expired after {:.2}s", elapsed.as_secs_f64())
            }
            SolverError::UnsupportedTopology(what) => {
                write!(f, "unsupported game topology: {}", what)
            }
        }
    }
}

impl std::error::Error for SolverError {}

/// A wall-clock budget checked cooperatively at iteration boundaries.
///
/// Replaces alarm-style interruption: no timer is armed, so every exit path
/// (including propagated errors) leaves nothing to release, and the check
/// composes with multi-threaded extensions.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
}

impl Deadline {
    /// Start a deadline with the given budget. `None` never expires.
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    /// Time elapsed since the deadline was started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Check the budget, returning `ConvergenceTimeout` once it is spent.
    pub fn check(&self) -> Result<(), SolverError> {
        match self.budget {
            Some(budget) if self.started.elapsed() >= budget => {
                Err(SolverError::ConvergenceTimeout {
                    elapsed: self.started.elapsed(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_deadline_never_expires() {
        let deadline = Deadline::new(None);
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let deadline = Deadline::new(Some(Duration::from_secs(0)));
        match deadline.check() {
            Err(SolverError::ConvergenceTimeout { .. }) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn error_messages_name_the_offender() {
        let err = SolverError::IllegalAction {
            player: 2,
            action: "Propose(Wed)".to_string(),
        };
        assert_eq!(err.to_string(), "illegal action Propose(Wed) by player 2");
    }
}
