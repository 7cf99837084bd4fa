//! Best-response computation against fixed strategy profiles.
//!
//! Given fixed (possibly mixed) strategies for the other players, the exact
//! solver computes the best achievable value for one player by memoized
//! max/expectation recursion over the full tree. The depth-limited variant
//! truncates the same recursion at a fixed lookahead and substitutes the
//! game's cheap heuristic evaluation at the cutoff — an explicit
//! approximation for state spaces where the exact solver is intractable.
//!
//! Exploitability and NashConv are derived on top: the gap between a
//! player's best-response value and the value they achieve following the
//! profile themselves, summed (and averaged) over players.

use rustc_hash::FxHashMap;

use crate::cfr::error::SolverError;
use crate::cfr::game::Game;
use crate::cfr::solver::CfrSolver;

/// A fixed strategy profile the best-response solvers play against.
///
/// `action_probabilities` must align with the deterministic order of
/// `legal_actions` and return a distribution (non-negative, summing to one)
/// for every non-terminal state. Repeated calls with identical inputs must
/// be deterministic.
pub trait StrategyProfile<G: Game> {
    /// Probability of each legal action for `player` at `state`.
    fn action_probabilities(
        &self,
        game: &G,
        state: &G::State,
        player: usize,
    ) -> Result<Vec<f64>, SolverError>;
}

/// The trained average strategy of a CFR solver is a strategy profile.
impl<G: Game> StrategyProfile<G> for CfrSolver<G> {
    fn action_probabilities(
        &self,
        _game: &G,
        state: &G::State,
        player: usize,
    ) -> Result<Vec<f64>, SolverError> {
        Ok(self
            .get_average_strategy(state, player)?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }
}

/// Uniform-random play, the baseline profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformProfile;

impl<G: Game> StrategyProfile<G> for UniformProfile {
    fn action_probabilities(
        &self,
        game: &G,
        state: &G::State,
        _player: usize,
    ) -> Result<Vec<f64>, SolverError> {
        let n = game.legal_actions(state)?.len();
        Ok(vec![1.0 / n as f64; n])
    }
}

/// Counters for the exact solver's memoization behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestResponseStats {
    /// Nodes whose value was computed.
    pub states_evaluated: u64,
    /// Nodes answered from the memo table.
    pub cache_hits: u64,
}

/// Exact best response for one player against a fixed profile.
///
/// Memoized by `(information-set key of the target player, acting player)`;
/// a cache hit short-circuits all recursion below that node. The memo is
/// exact only when that key pins down the whole public state, as it does in
/// games whose keys carry the full public record; for keys that merge
/// value-distinct states the result is an optimistic approximation.
pub struct BestResponse<'a, G: Game, P: StrategyProfile<G>> {
    game: &'a G,
    profile: &'a P,
    target: usize,
    memo: FxHashMap<(G::Key, usize), f64>,
    stats: BestResponseStats,
}

impl<'a, G: Game, P: StrategyProfile<G>> BestResponse<'a, G, P> {
    /// Create a best-response solver for `target`.
    pub fn new(game: &'a G, profile: &'a P, target: usize) -> Result<Self, SolverError> {
        if target >= game.num_players() {
            return Err(SolverError::UnsupportedTopology(format!(
                "best-response target {} out of range for {} players",
                target,
                game.num_players()
            )));
        }
        Ok(Self {
            game,
            profile,
            target,
            memo: FxHashMap::default(),
            stats: BestResponseStats::default(),
        })
    }

    /// Best achievable value for the target player from the initial state.
    pub fn value(&mut self) -> Result<f64, SolverError> {
        let state = self.game.initial_state();
        self.value_from(&state)
    }

    /// Best achievable value for the target player from `state`.
    pub fn value_from(&mut self, state: &G::State) -> Result<f64, SolverError> {
        if self.game.is_terminal(state) {
            return Ok(self.game.returns(state)[self.target]);
        }
        let actor = match self.game.current_player(state) {
            Some(p) => p,
            None => return Ok(self.game.returns(state)[self.target]),
        };

        let memo_key = (self.game.info_key(state, self.target), actor);
        if let Some(&value) = self.memo.get(&memo_key) {
            self.stats.cache_hits += 1;
            return Ok(value);
        }
        self.stats.states_evaluated += 1;

        let actions = self.game.legal_actions(state)?;
        let value = if actor == self.target {
            // Target node: max over actions.
            let mut best = f64::NEG_INFINITY;
            for action in &actions {
                let next = self.game.apply_action(state, action)?;
                best = best.max(self.value_from(&next)?);
            }
            best
        } else {
            // Opponent node: expectation under the fixed profile.
            let probs = self.profile.action_probabilities(self.game, state, actor)?;
            let mut expected = 0.0;
            for (action, prob) in actions.iter().zip(probs.iter()) {
                if *prob > 0.0 {
                    let next = self.game.apply_action(state, action)?;
                    expected += prob * self.value_from(&next)?;
                }
            }
            expected
        };

        self.memo.insert(memo_key, value);
        Ok(value)
    }

    /// The value-maximizing action for the target player at `state`.
    pub fn best_action(&mut self, state: &G::State) -> Result<G::Action, SolverError> {
        if self.game.current_player(state) != Some(self.target) {
            return Err(SolverError::InvalidState(
                "best_action queried at a state the target does not own",
            ));
        }
        let actions = self.game.legal_actions(state)?;
        let mut best: Option<(G::Action, f64)> = None;
        for action in actions {
            let next = self.game.apply_action(state, &action)?;
            let value = self.value_from(&next)?;
            if best.as_ref().map_or(true, |(_, v)| value > *v) {
                best = Some((action, value));
            }
        }
        best.map(|(a, _)| a)
            .ok_or(SolverError::InvalidState("no legal actions at decision node"))
    }

    /// Memoization counters.
    pub fn stats(&self) -> BestResponseStats {
        self.stats
    }
}

/// Depth-limited approximate best response.
///
/// The same max/expectation alternation as [`BestResponse`], truncated at a
/// fixed lookahead with the game's heuristic evaluation at the cutoff. The
/// result is an approximation, not an exact best response.
pub struct DepthLimitedBestResponse<'a, G: Game, P: StrategyProfile<G>> {
    game: &'a G,
    profile: &'a P,
    target: usize,
    lookahead: usize,
}

impl<'a, G: Game, P: StrategyProfile<G>> DepthLimitedBestResponse<'a, G, P> {
    /// Create an approximate best-response solver with the given lookahead.
    pub fn new(
        game: &'a G,
        profile: &'a P,
        target: usize,
        lookahead: usize,
    ) -> Result<Self, SolverError> {
        if target >= game.num_players() {
            return Err(SolverError::UnsupportedTopology(format!(
                "best-response target {} out of range for {} players",
                target,
                game.num_players()
            )));
        }
        if lookahead == 0 {
            return Err(SolverError::UnsupportedTopology(
                "lookahead must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            game,
            profile,
            target,
            lookahead,
        })
    }

    /// Approximately best action for the target player at `state`.
    pub fn best_action(&self, state: &G::State) -> Result<G::Action, SolverError> {
        if self.game.current_player(state) != Some(self.target) {
            return Err(SolverError::InvalidState(
                "best_action queried at a state the target does not own",
            ));
        }
        let actions = self.game.legal_actions(state)?;
        let mut best: Option<(G::Action, f64)> = None;
        for action in actions {
            let next = self.game.apply_action(state, &action)?;
            let value = self.evaluate(&next, self.lookahead)?;
            if best.as_ref().map_or(true, |(_, v)| value > *v) {
                best = Some((action, value));
            }
        }
        best.map(|(a, _)| a)
            .ok_or(SolverError::InvalidState("no legal actions at decision node"))
    }

    /// Lookahead value of `state` for the target player.
    pub fn value_from(&self, state: &G::State) -> Result<f64, SolverError> {
        self.evaluate(state, self.lookahead)
    }

    fn evaluate(&self, state: &G::State, depth: usize) -> Result<f64, SolverError> {
        if self.game.is_terminal(state) {
            return Ok(self.game.returns(state)[self.target]);
        }
        if depth == 0 {
            return Ok(self.game.heuristic_value(state, self.target));
        }
        let actor = match self.game.current_player(state) {
            Some(p) => p,
            None => return Ok(self.game.returns(state)[self.target]),
        };
        let actions = self.game.legal_actions(state)?;

        if actor == self.target {
            let mut best = f64::NEG_INFINITY;
            for action in &actions {
                let next = self.game.apply_action(state, action)?;
                best = best.max(self.evaluate(&next, depth - 1)?);
            }
            Ok(best)
        } else {
            let probs = self.profile.action_probabilities(self.game, state, actor)?;
            let mut expected = 0.0;
            for (action, prob) in actions.iter().zip(probs.iter()) {
                if *prob > 0.0 {
                    let next = self.game.apply_action(state, action)?;
                    expected += prob * self.evaluate(&next, depth - 1)?;
                }
            }
            Ok(expected)
        }
    }
}

/// Per-player exploitability and the NashConv aggregate.
#[derive(Debug, Clone)]
pub struct NashConvReport {
    /// `max(0, best_response_value − self_play_value)` per player.
    pub exploitability: Vec<f64>,
    /// Sum of per-player exploitabilities.
    pub nash_conv: f64,
    /// Mean per-player exploitability.
    pub mean_exploitability: f64,
}

/// Expected value for `player` when every player follows `profile`.
pub fn profile_value<G: Game, P: StrategyProfile<G>>(
    game: &G,
    profile: &P,
    state: &G::State,
    player: usize,
) -> Result<f64, SolverError> {
    if game.is_terminal(state) {
        return Ok(game.returns(state)[player]);
    }
    let actor = match game.current_player(state) {
        Some(p) => p,
        None => return Ok(game.returns(state)[player]),
    };
    let actions = game.legal_actions(state)?;
    let probs = profile.action_probabilities(game, state, actor)?;
    let mut expected = 0.0;
    for (action, prob) in actions.iter().zip(probs.iter()) {
        if *prob > 0.0 {
            let next = game.apply_action(state, action)?;
            expected += prob * profile_value(game, profile, &next, player)?;
        }
    }
    Ok(expected)
}

/// Exact NashConv of a strategy profile.
///
/// For each player, re-runs the exact best-response solver against the
/// profile and compares it with the value of following the profile;
/// deterministic for identical inputs. Intended for games small enough for
/// the exact solver — use [`DepthLimitedBestResponse`] and sampled
/// simulation for anything larger.
pub fn nash_conv<G: Game, P: StrategyProfile<G>>(
    game: &G,
    profile: &P,
) -> Result<NashConvReport, SolverError> {
    let mut exploitability = Vec::with_capacity(game.num_players());
    for player in 0..game.num_players() {
        let br_value = BestResponse::new(game, profile, player)?.value()?;
        let own_value = profile_value(game, profile, &game.initial_state(), player)?;
        // Best response can only do at least as well; clamp float slack.
        exploitability.push((br_value - own_value).max(0.0));
    }
    let nash_conv: f64 = exploitability.iter().sum();
    let mean = nash_conv / game.num_players() as f64;
    Ok(NashConvReport {
        exploitability,
        nash_conv,
        mean_exploitability: mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::game::{GameAction, GameState, InfoKey};

    /// Two players pick left or right in sequence; the second player sees
    /// the first move. Payoffs: LL (4,1), LR (0,3), RL (2,2), RR (1,4).
    #[derive(Debug, Clone, Copy)]
    struct MatrixGame;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Pick {
        Left,
        Right,
    }

    impl GameAction for Pick {
        fn label(&self) -> String {
            format!("{:?}", self)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct MatrixState {
        picks: Vec<Pick>,
    }

    impl GameState for MatrixState {}

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct MatrixKey {
        player: usize,
        seen: Vec<Pick>,
    }

    impl InfoKey for MatrixKey {}

    impl Game for MatrixGame {
        type State = MatrixState;
        type Action = Pick;
        type Key = MatrixKey;

        fn initial_state(&self) -> MatrixState {
            MatrixState::default()
        }

        fn num_players(&self) -> usize {
            2
        }

        fn is_terminal(&self, state: &MatrixState) -> bool {
            state.picks.len() == 2
        }

        fn returns(&self, state: &MatrixState) -> Vec<f64> {
            match (state.picks.first(), state.picks.get(1)) {
                (Some(Pick::Left), Some(Pick::Left)) => vec![4.0, 1.0],
                (Some(Pick::Left), Some(Pick::Right)) => vec![0.0, 3.0],
                (Some(Pick::Right), Some(Pick::Left)) => vec![2.0, 2.0],
                (Some(Pick::Right), Some(Pick::Right)) => vec![1.0, 4.0],
                _ => vec![0.0, 0.0],
            }
        }

        fn current_player(&self, state: &MatrixState) -> Option<usize> {
            if self.is_terminal(state) {
                None
            } else {
                Some(state.picks.len())
            }
        }

        fn legal_actions(&self, state: &MatrixState) -> Result<Vec<Pick>, SolverError> {
            if self.is_terminal(state) {
                return Err(SolverError::InvalidState("terminal"));
            }
            Ok(vec![Pick::Left, Pick::Right])
        }

        fn apply_action(
            &self,
            state: &MatrixState,
            action: &Pick,
        ) -> Result<MatrixState, SolverError> {
            let mut next = state.clone();
            next.picks.push(*action);
            Ok(next)
        }

        fn info_key(&self, state: &MatrixState, player: usize) -> MatrixKey {
            MatrixKey {
                player,
                seen: state.picks.clone(),
            }
        }
    }

    #[test]
    fn exact_values_against_uniform() {
        let game = MatrixGame;
        // Player 1 responds optimally to each first move: 3 after Left and
        // 4 after Right, expected 3.5 against a uniform first mover.
        let value1 = BestResponse::new(&game, &UniformProfile, 1)
            .unwrap()
            .value()
            .unwrap();
        assert!((value1 - 3.5).abs() < 1e-12);
        // Player 0 against a coin-flipping responder: Left averages 2.0,
        // Right averages 1.5.
        let value0 = BestResponse::new(&game, &UniformProfile, 0)
            .unwrap()
            .value()
            .unwrap();
        assert!((value0 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn repeated_queries_hit_the_memo() {
        let game = MatrixGame;
        let mut br = BestResponse::new(&game, &UniformProfile, 0).unwrap();
        let first = br.value().unwrap();
        let evaluated = br.stats().states_evaluated;
        let second = br.value().unwrap();
        assert_eq!(first, second);
        // The second pass answers the root from the cache without new work.
        assert_eq!(br.stats().states_evaluated, evaluated);
        assert!(br.stats().cache_hits > 0);
    }

    #[test]
    fn best_action_picks_the_max_branch() {
        let game = MatrixGame;
        let mut br = BestResponse::new(&game, &UniformProfile, 0).unwrap();
        let action = br.best_action(&game.initial_state()).unwrap();
        assert_eq!(action, Pick::Left);
    }

    #[test]
    fn nash_conv_sums_per_player_gaps() {
        let game = MatrixGame;
        let report = nash_conv(&game, &UniformProfile).unwrap();
        // Uniform self-play values: 1.75 for player 0 and 2.5 for player 1.
        assert!((report.exploitability[0] - 0.25).abs() < 1e-12);
        assert!((report.exploitability[1] - 1.0).abs() < 1e-12);
        assert!((report.nash_conv - 1.25).abs() < 1e-12);
        assert!((report.mean_exploitability - 0.625).abs() < 1e-12);
    }

    #[test]
    fn depth_limit_falls_back_to_the_heuristic() {
        let game = MatrixGame;
        let limited = DepthLimitedBestResponse::new(&game, &UniformProfile, 0, 1).unwrap();
        // One ply reaches player 1's node, which is cut off at depth zero
        // and scored by the default heuristic of 0.
        let value = limited.value_from(&game.initial_state()).unwrap();
        assert_eq!(value, 0.0);
        // Two plies reach the terminals and recover the exact value.
        let full = DepthLimitedBestResponse::new(&game, &UniformProfile, 0, 2).unwrap();
        let value = full.value_from(&game.initial_state()).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let game = MatrixGame;
        assert!(BestResponse::new(&game, &UniformProfile, 2).is_err());
        assert!(DepthLimitedBestResponse::new(&game, &UniformProfile, 0, 0).is_err());
    }
}
