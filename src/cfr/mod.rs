//! CFR (Counterfactual Regret Minimization) solver module.
//!
//! This module provides a generic implementation of the CFR algorithm family
//! for computing Nash equilibrium strategies in extensive-form games, plus
//! the evaluation tooling that goes with it.
//!
//! # Overview
//!
//! CFR is an iterative algorithm that converges to Nash equilibrium by:
//! 1. Computing counterfactual regret for each action at each decision point
//! 2. Updating strategies by regret matching to minimize regret over time
//! 3. Averaging strategies across iterations to converge to equilibrium
//!
//! # Supported Variants
//!
//! - **Exact CFR**: Full tree traversal with depth and branching limits
//! - **External-sampling MCCFR**: Samples non-traversing players' actions
//!   for scalability
//!
//! # Evaluation
//!
//! - [`best_response`]: Exact and depth-limited best response against a
//!   fixed profile, plus exploitability and NashConv
//! - [`mcts`]: UCT tree search for the perfect-information variant, as an
//!   independent baseline
//!
//! # Usage
//!
//! 1. Implement the [`Game`] trait for your game
//! 2. Create a [`CfrSolver`] with your game and a [`CfrConfig`]
//! 3. Call `train()` to run iterations
//! 4. Extract strategies with `get_average_strategy()`
//!
//! ```ignore
//! use negotiation_solver::cfr::{CfrConfig, CfrSolver};
//!
//! let config = CfrConfig::default().with_seed(7);
//! let mut solver = CfrSolver::new(game, config)?;
//! let report = solver.train(10_000)?;
//! println!("{} info sets, stopped: {:?}", report.stats.info_sets, report.stop);
//! ```
//!
//! # Theory
//!
//! **Regret**: the difference between the value of an action and the value
//! of the current strategy.
//!
//! **Regret matching**: play each action proportionally to its positive
//! accumulated regret.
//!
//! **Convergence**: average regret decreases as O(1/sqrt(T)) and the
//! time-averaged strategy converges to a Nash equilibrium (exactly in
//! two-player zero-sum games; empirically well beyond).
//!
//! # References
//!
//! - Zinkevich, M., et al. "Regret Minimization in Games with Incomplete Information" (2007)
//! - Lanctot, M., et al. "Monte Carlo Sampling for Regret Minimization in Extensive Games" (2009)

pub mod best_response;
pub mod config;
pub mod error;
pub mod game;
pub mod mcts;
pub mod solver;
pub mod storage;

// Re-export main types for convenient access
pub use best_response::{
    nash_conv, profile_value, BestResponse, BestResponseStats, DepthLimitedBestResponse,
    NashConvReport, StrategyProfile, UniformProfile,
};
pub use config::{CfrConfig, CfrStats, RegretPoint, SamplingMode, StopReason, TrainingReport};
pub use error::{Deadline, SolverError};
pub use game::{Game, GameAction, GameState, InfoKey};
pub use mcts::{MctsConfig, MctsResult, MctsSolver};
pub use solver::CfrSolver;
pub use storage::RegretStorage;
