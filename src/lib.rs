//! # Negotiation Solver
//!
//! Equilibrium solvers for multi-party negotiation games: a generic CFR
//! engine over the [`cfr::Game`] trait, best-response evaluation with
//! NashConv, and a UCT baseline for the perfect-information variant,
//! applied to an N-player slot-scheduling negotiation.
//!
//! ## Features
//!
//! - **Generic CFR engine**: exact and external-sampling traversal over any
//!   game implementing the `Game` trait
//! - **Best response**: exact memoized and depth-limited variants, plus
//!   exploitability and NashConv reports
//! - **UCT search**: an independent Monte Carlo baseline that never touches
//!   information sets
//! - **Negotiation game**: propose/respond state machine with configurable
//!   scoring and no-agreement policies
//!
//! ## Quick Start
//!
//! ```ignore
//! use negotiation_solver::cfr::{CfrConfig, CfrSolver, nash_conv};
//! use negotiation_solver::games::negotiation::NegotiationGame;
//!
//! let game = NegotiationGame::new(valuations, availability, config)?;
//! let mut solver = CfrSolver::new(game, CfrConfig::exact().with_seed(42))?;
//! let report = solver.train(10_000)?;
//!
//! let quality = nash_conv(solver.game(), &solver)?;
//! println!("NashConv: {:.4}", quality.nash_conv);
//! ```
//!
//! ## Modules
//!
//! - [`cfr`]: solver core — CFR, best response, NashConv, UCT
//! - [`games`]: the negotiation game and a validation game

#![warn(missing_docs)]

/// Solver core: CFR, best response, NashConv, and UCT search.
pub mod cfr;

/// Game implementations solved by the engines in [`cfr`].
pub mod games;

// Re-export commonly used types at crate root for convenience
pub use cfr::{
    CfrConfig, CfrSolver, CfrStats, Game, GameAction, GameState, InfoKey, SolverError,
};
