//! Game implementations for the solvers.
//!
//! Every game here implements the [`crate::cfr::Game`] trait and serves one
//! or both of two purposes:
//!
//! 1. **The real thing**: [`negotiation`] is the multi-party scheduling
//!    negotiation the crate exists to solve.
//!
//! 2. **Validation**: [`dilemma`] is a two-player game with a known
//!    dominant-strategy equilibrium, used to verify that the solver
//!    machinery converges to the right place.
//!
//! ## Adding New Games
//!
//! 1. Create a new module under `src/games/`
//! 2. Define state, action, and information-key types
//! 3. Implement the `Game` trait
//! 4. Add tests that verify expected behavior
//!
//! See [`dilemma`] for a minimal complete example.

pub mod dilemma;
pub mod negotiation;
