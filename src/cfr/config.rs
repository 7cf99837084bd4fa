//! Configuration and statistics for the CFR solver.
//!
//! The configuration controls which traversal mode is used, the bounds that
//! keep a single iteration cheap in large action spaces, and the stopping
//! rules (iteration budget, wall-clock deadline, convergence threshold).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cfr::error::SolverError;

/// How the game tree is traversed on each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Recursive CFR expanding all legal actions at every node, bounded by
    /// `max_depth` and `branching_limit`. One traversal per player per
    /// iteration.
    Exact,

    /// Externally-sampled Monte Carlo CFR: the sampling player expands all
    /// of their actions, every other player's action is sampled from the
    /// current strategy. Roughly linear cost in depth, variance amortized
    /// over iterations. The sampling player rotates each iteration.
    ExternalSampling,
}

/// Configuration for [`CfrSolver`](crate::cfr::CfrSolver).
///
/// # Example
/// ```
/// use negotiation_solver::cfr::CfrConfig;
///
/// let config = CfrConfig::default().with_seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfrConfig {
    /// Traversal mode. External sampling is the default: the negotiation
    /// action space grows too fast for exhaustive traversal past toy sizes.
    pub mode: SamplingMode,

    /// Maximum recursion depth for exact traversal. Subtrees cut off at this
    /// depth contribute zero utility, an explicit approximation that trades
    /// missed regret mass for bounded per-iteration cost.
    pub max_depth: usize,

    /// Branching cap for exact traversal. Nodes with more legal actions than
    /// this expand a uniformly-drawn subsample of this size, again trading
    /// regret coverage for bounded cost.
    pub branching_limit: usize,

    /// Wall-clock budget for a `train` call. Checked cooperatively at every
    /// iteration boundary; `None` trains without a deadline.
    pub timeout: Option<Duration>,

    /// Early-stop threshold on the mean positive regret across visited
    /// information sets. A liveness bound, not a correctness one.
    pub convergence_threshold: f64,

    /// How many iterations between convergence checks.
    pub check_interval: u64,

    /// Random seed for reproducibility. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for CfrConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::ExternalSampling,
            max_depth: 50,
            branching_limit: 20,
            timeout: None,
            convergence_threshold: 1e-3,
            check_interval: 10,
            seed: None,
        }
    }
}

impl CfrConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for exact depth-limited CFR.
    pub fn exact() -> Self {
        Self {
            mode: SamplingMode::Exact,
            ..Default::default()
        }
    }

    /// Builder method: set the traversal mode.
    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method: set the exact-traversal recursion cap.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builder method: set the exact-traversal branching cap.
    pub fn with_branching_limit(mut self, limit: usize) -> Self {
        self.branching_limit = limit;
        self
    }

    /// Builder method: set the wall-clock training budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder method: set the early-stop regret threshold.
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Builder method: set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.max_depth == 0 {
            return Err(SolverError::UnsupportedTopology(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.branching_limit == 0 {
            return Err(SolverError::UnsupportedTopology(
                "branching_limit must be at least 1".to_string(),
            ));
        }
        if self.check_interval == 0 {
            return Err(SolverError::UnsupportedTopology(
                "check_interval must be at least 1".to_string(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(SolverError::UnsupportedTopology(format!(
                "convergence_threshold {} must be finite and non-negative",
                self.convergence_threshold
            )));
        }
        Ok(())
    }
}

/// Statistics tracked during CFR training.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CfrStats {
    /// Total iterations completed.
    pub iterations: u64,

    /// Unique information sets discovered.
    pub info_sets: usize,

    /// Total training time in seconds.
    pub elapsed_seconds: f64,

    /// Iterations per second.
    pub iterations_per_second: f64,

    /// Mean positive regret per action slot and iteration at the last
    /// convergence check.
    pub mean_positive_regret: f64,

    /// Iterations abandoned because a traversal failed. Recorded, not
    /// silently swallowed; a warning is logged per failure.
    pub failed_iterations: u64,

    /// Mean positive regret sampled at each convergence check.
    pub regret_history: Vec<RegretPoint>,
}

/// One convergence measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegretPoint {
    /// Iteration at which the measurement was taken.
    pub iteration: u64,
    /// Mean positive regret at that iteration.
    pub mean_positive_regret: f64,
}

impl CfrStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update `iterations_per_second` from the elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.iterations_per_second = self.iterations as f64 / self.elapsed_seconds;
        }
    }

    /// Record a convergence measurement.
    pub fn record_regret(&mut self, iteration: u64, mean_positive_regret: f64) {
        self.mean_positive_regret = mean_positive_regret;
        self.regret_history.push(RegretPoint {
            iteration,
            mean_positive_regret,
        });
    }
}

/// Why a `train` call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The requested iteration count was reached.
    Completed,
    /// Mean positive regret fell below the convergence threshold.
    Converged,
    /// The wall-clock budget expired. The strategy trained so far is kept.
    DeadlineExpired,
}

/// Outcome of a `train` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Why training stopped.
    pub stop: StopReason,
    /// Statistics at the stop point.
    pub stats: CfrStats,
}
