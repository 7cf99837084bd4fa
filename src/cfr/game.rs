//! Game trait definitions for the solvers.
//!
//! Any sequential game that implements the `Game` trait can be handed to the
//! CFR solver, the best-response solvers, and (for perfect-information use)
//! the UCT tree search. The trait is the only surface the solvers touch.

use std::fmt::Debug;
use std::hash::Hash;

use crate::cfr::error::SolverError;

/// Trait for actions that can be taken in a game.
///
/// Actions are stored in per-information-set tables, so they must be
/// cloneable, comparable, and hashable.
pub trait GameAction: Clone + Eq + Hash + Debug + Send + Sync {
    /// Short human-readable label for display and error messages.
    fn label(&self) -> String;
}

/// Trait for structural information-set keys.
///
/// A key identifies everything the acting player knows at a decision point:
/// the public record of play plus the player's own identity and preferences,
/// never other players' private information. Keys are structural values, not
/// serialized strings, so two distinct observable histories can never
/// collide by stringifying identically.
///
/// Invariant relied on by the regret tables: states that produce identical
/// keys always face identical, identically-ordered legal-action lists.
pub trait InfoKey: Clone + Eq + Hash + Debug + Send + Sync {}

/// Trait for game states.
///
/// `Clone` must be a deep, independent copy: solvers mutate clones while
/// retaining the original for alternative-branch exploration, so no history,
/// proposal, or response data may be aliased between a state and its clone.
pub trait GameState: Clone + Debug + Send + Sync {}

/// The interface every solvable game implements.
///
/// Games are immutable once constructed; all evolving data lives in the
/// `State` values threaded through these methods.
pub trait Game: Clone + Send + Sync {
    /// The type representing a complete game state.
    type State: GameState;

    /// The type representing an action a player can take.
    type Action: GameAction;

    /// The structural information-set key type.
    type Key: InfoKey;

    /// Create the initial game state. Called at the start of every traversal
    /// and simulation to get a fresh game.
    fn initial_state(&self) -> Self::State;

    /// Total number of players. Fixed at construction time.
    fn num_players(&self) -> usize;

    /// Whether the state is terminal (no further actions, payoffs defined).
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Utilities for all players, indexed by player.
    ///
    /// All-zero on non-terminal states and on no-agreement outcomes; games
    /// define their own terminal payoff rules.
    fn returns(&self, state: &Self::State) -> Vec<f64>;

    /// The player to act, or `None` on terminal states.
    fn current_player(&self, state: &Self::State) -> Option<usize>;

    /// Legal actions for the player to act, in a deterministic order.
    ///
    /// Non-empty for every reachable non-terminal state. Fails with
    /// `InvalidState` when called on a terminal state.
    fn legal_actions(&self, state: &Self::State) -> Result<Vec<Self::Action>, SolverError>;

    /// Apply an action, returning the successor state.
    ///
    /// Deterministic; the input state is not modified. Fails with
    /// `IllegalAction` if `action` is not in `legal_actions(state)`.
    fn apply_action(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Self::State, SolverError>;

    /// Information-set key for `player` at this state.
    ///
    /// A pure function of what `player` can observe: the public history,
    /// the phase, and the player's own identity. Other players' private
    /// valuations must never influence the key.
    fn info_key(&self, state: &Self::State, player: usize) -> Self::Key;

    /// Cheap utility estimate used when a depth-limited search is cut off
    /// at a non-terminal state. Defaults to a neutral evaluation.
    fn heuristic_value(&self, _state: &Self::State, _player: usize) -> f64 {
        0.0
    }

    /// Human-readable name for an action, for logs and reports.
    fn action_name(&self, action: &Self::Action) -> String {
        action.label()
    }
}
