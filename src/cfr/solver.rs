//! Counterfactual regret minimization for N-player negotiation games.
//!
//! Two traversal modes are provided:
//! - **Exact**: recursive CFR expanding every legal action at every node,
//!   bounded by a recursion depth cap and a branching cap. Truncated
//!   subtrees score zero and over-wide nodes expand a random subsample, so
//!   the traversal is an explicit approximation in large action spaces.
//! - **External sampling (MCCFR)**: one sampling player per iteration
//!   expands all of their actions while every other player's action is
//!   drawn from the current strategy, making an iteration roughly linear in
//!   game depth at the cost of sampling variance.
//!
//! Regret attribution follows the counterfactual rule: at a node owned by
//! player `p`, `regret[a] += opponent_reach × (value[a] − node_value)`,
//! and the strategy sum accumulates `reach[p] × strategy[a]`, whose
//! normalization is the average strategy that converges to equilibrium.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::cfr::config::{CfrConfig, CfrStats, SamplingMode, StopReason, TrainingReport};
use crate::cfr::error::{Deadline, SolverError};
use crate::cfr::game::Game;
use crate::cfr::storage::RegretStorage;

/// The CFR solver. Owns its regret tables and RNG; independent instances
/// share no mutable data.
pub struct CfrSolver<G: Game> {
    game: G,
    config: CfrConfig,
    storage: RegretStorage<G::Key>,
    iteration: u64,
    stats: CfrStats,
    rng: StdRng,
}

impl<G: Game> CfrSolver<G> {
    /// Create a solver for `game`.
    ///
    /// Fails with `UnsupportedTopology` if the configuration is malformed
    /// or the game has fewer than two players.
    pub fn new(game: G, config: CfrConfig) -> Result<Self, SolverError> {
        config.validate()?;
        if game.num_players() < 2 {
            return Err(SolverError::UnsupportedTopology(format!(
                "CFR requires at least 2 players, got {}",
                game.num_players()
            )));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            game,
            config,
            storage: RegretStorage::new(),
            iteration: 0,
            stats: CfrStats::new(),
            rng,
        })
    }

    /// Run a single iteration: one full traversal from the initial state
    /// (exact mode), or one traversal for the rotating sampling player
    /// (external sampling).
    pub fn run_iteration(&mut self) -> Result<(), SolverError> {
        self.iteration += 1;
        let state = self.game.initial_state();
        let reach = vec![1.0; self.game.num_players()];

        match self.config.mode {
            SamplingMode::Exact => {
                let depth = self.config.max_depth;
                self.traverse_exact(&state, &reach, depth)?;
            }
            SamplingMode::ExternalSampling => {
                let sampling_player = (self.iteration - 1) as usize % self.game.num_players();
                self.traverse_sampled(&state, &reach, sampling_player)?;
            }
        }
        Ok(())
    }

    /// Train for up to `iterations` iterations.
    ///
    /// Stops early when the mean positive regret across visited information
    /// sets falls below the convergence threshold, or when the wall-clock
    /// budget expires; both are reported through [`StopReason`], never as
    /// errors. A traversal failure abandons that iteration, is counted and
    /// logged, and training continues.
    pub fn train(&mut self, iterations: u64) -> Result<TrainingReport, SolverError> {
        self.train_impl(iterations, None::<fn(&CfrStats)>)
    }

    /// Train with a progress callback invoked every `interval` iterations.
    pub fn train_with_callback<F>(
        &mut self,
        iterations: u64,
        interval: u64,
        mut callback: F,
    ) -> Result<TrainingReport, SolverError>
    where
        F: FnMut(&CfrStats),
    {
        if interval == 0 {
            return Err(SolverError::UnsupportedTopology(
                "callback interval must be at least 1".to_string(),
            ));
        }
        self.train_impl(iterations, Some(move |stats: &CfrStats| callback(stats)))
    }

    fn train_impl<F>(
        &mut self,
        iterations: u64,
        mut callback: Option<F>,
    ) -> Result<TrainingReport, SolverError>
    where
        F: FnMut(&CfrStats),
    {
        let deadline = Deadline::new(self.config.timeout);
        let mut stop = StopReason::Completed;

        for i in 0..iterations {
            if let Err(SolverError::ConvergenceTimeout { elapsed }) = deadline.check() {
                debug!(
                    "training deadline expired after {:.2}s at iteration {}",
                    elapsed.as_secs_f64(),
                    self.iteration
                );
                stop = StopReason::DeadlineExpired;
                break;
            }

            if let Err(err) = self.run_iteration() {
                self.stats.failed_iterations += 1;
                warn!("abandoning iteration {}: {}", self.iteration, err);
                continue;
            }

            if (i + 1) % self.config.check_interval == 0 {
                let regret = self.mean_positive_regret();
                self.stats.record_regret(self.iteration, regret);
                if let Some(ref mut cb) = callback {
                    self.refresh_stats(&deadline);
                    cb(&self.stats);
                }
                if regret < self.config.convergence_threshold {
                    debug!(
                        "converged at iteration {} with mean positive regret {:.6}",
                        self.iteration, regret
                    );
                    stop = StopReason::Converged;
                    break;
                }
            }
        }

        self.refresh_stats(&deadline);
        self.stats.mean_positive_regret = self.mean_positive_regret();
        Ok(TrainingReport {
            stop,
            stats: self.stats.clone(),
        })
    }

    fn refresh_stats(&mut self, deadline: &Deadline) {
        self.stats.iterations = self.iteration;
        self.stats.info_sets = self.storage.num_info_sets();
        self.stats.elapsed_seconds = deadline.elapsed().as_secs_f64();
        self.stats.update_rate();
    }

    /// Exact depth-limited traversal. Returns per-player utilities.
    fn traverse_exact(
        &mut self,
        state: &G::State,
        reach: &[f64],
        depth: usize,
    ) -> Result<Vec<f64>, SolverError> {
        if self.game.is_terminal(state) {
            return Ok(self.game.returns(state));
        }
        if depth == 0 {
            // Truncated subtree: neutral utility, regret mass below this
            // point is deliberately dropped.
            return Ok(vec![0.0; self.game.num_players()]);
        }

        let actor = match self.game.current_player(state) {
            Some(p) => p,
            None => return Ok(self.game.returns(state)),
        };
        let actions = self.game.legal_actions(state)?;
        let num_actions = actions.len();
        if num_actions == 0 {
            return Err(SolverError::InvalidState(
                "non-terminal state with no legal actions",
            ));
        }

        let key = self.game.info_key(state, actor);
        let strategy = self.storage.current_strategy(&key, num_actions);

        // Bounded subsample when the branching factor is too large. Regret
        // and strategy vectors keep full length so table entries for this
        // info set stay aligned; unexplored actions get a zero regret delta.
        let explored: Vec<usize> = if num_actions > self.config.branching_limit {
            let mut indices: Vec<usize> = (0..num_actions).collect();
            indices.shuffle(&mut self.rng);
            indices.truncate(self.config.branching_limit);
            indices
        } else {
            (0..num_actions).collect()
        };

        let mut action_utils: Vec<Option<Vec<f64>>> = vec![None; num_actions];
        for &i in &explored {
            let next = self.game.apply_action(state, &actions[i])?;
            let mut next_reach = reach.to_vec();
            next_reach[actor] *= strategy[i];
            action_utils[i] = Some(self.traverse_exact(&next, &next_reach, depth - 1)?);
        }

        // Node utility is the expectation over the explored actions with
        // their strategy mass renormalized.
        let explored_mass: f64 = explored.iter().map(|&i| strategy[i]).sum();
        let mut node_utils = vec![0.0; self.game.num_players()];
        for &i in &explored {
            let utils = action_utils[i].as_ref().map(Vec::as_slice).unwrap_or(&[]);
            let prob = if explored_mass > 0.0 {
                strategy[i] / explored_mass
            } else {
                1.0 / explored.len() as f64
            };
            for (acc, &u) in node_utils.iter_mut().zip(utils.iter()) {
                *acc += prob * u;
            }
        }

        let opp_reach: f64 = reach
            .iter()
            .enumerate()
            .filter(|&(p, _)| p != actor)
            .map(|(_, &r)| r)
            .product();

        let mut regret_updates = vec![0.0; num_actions];
        for &i in &explored {
            if let Some(utils) = &action_utils[i] {
                regret_updates[i] = opp_reach * (utils[actor] - node_utils[actor]);
            }
        }
        self.storage.update_regrets(&key, &regret_updates);
        self.storage.update_strategy_sum(&key, &strategy, reach[actor]);

        Ok(node_utils)
    }

    /// Externally-sampled traversal for one sampling player.
    fn traverse_sampled(
        &mut self,
        state: &G::State,
        reach: &[f64],
        sampling_player: usize,
    ) -> Result<Vec<f64>, SolverError> {
        if self.game.is_terminal(state) {
            return Ok(self.game.returns(state));
        }
        let actor = match self.game.current_player(state) {
            Some(p) => p,
            None => return Ok(self.game.returns(state)),
        };
        let actions = self.game.legal_actions(state)?;
        let num_actions = actions.len();
        if num_actions == 0 {
            return Err(SolverError::InvalidState(
                "non-terminal state with no legal actions",
            ));
        }

        let key = self.game.info_key(state, actor);
        let strategy = self.storage.current_strategy(&key, num_actions);

        if actor == sampling_player {
            // The sampling player expands every action.
            let mut node_utils = vec![0.0; self.game.num_players()];
            let mut action_values = vec![0.0; num_actions];
            for (i, action) in actions.iter().enumerate() {
                let next = self.game.apply_action(state, action)?;
                let mut next_reach = reach.to_vec();
                next_reach[actor] *= strategy[i];
                let utils = self.traverse_sampled(&next, &next_reach, sampling_player)?;
                action_values[i] = utils[actor];
                for (acc, &u) in node_utils.iter_mut().zip(utils.iter()) {
                    *acc += strategy[i] * u;
                }
            }

            let opp_reach: f64 = reach
                .iter()
                .enumerate()
                .filter(|&(p, _)| p != actor)
                .map(|(_, &r)| r)
                .product();
            let regret_updates: Vec<f64> = action_values
                .iter()
                .map(|&v| opp_reach * (v - node_utils[actor]))
                .collect();
            self.storage.update_regrets(&key, &regret_updates);
            self.storage.update_strategy_sum(&key, &strategy, reach[actor]);

            Ok(node_utils)
        } else {
            // Everyone else contributes a single sampled action.
            let i = self.sample_index(&strategy);
            let next = self.game.apply_action(state, &actions[i])?;
            let mut next_reach = reach.to_vec();
            next_reach[actor] *= strategy[i];
            self.traverse_sampled(&next, &next_reach, sampling_player)
        }
    }

    /// Sample an index from a probability distribution.
    fn sample_index(&mut self, strategy: &[f64]) -> usize {
        let r: f64 = self.rng.gen();
        let mut cumsum = 0.0;
        for (i, &prob) in strategy.iter().enumerate() {
            cumsum += prob;
            if r < cumsum {
                return i;
            }
        }
        // Floating-point slack lands on the last action.
        strategy.len() - 1
    }

    /// Average strategy for `player` at `state`, paired with the legal
    /// actions in their deterministic order.
    ///
    /// Uniform over the legal actions when the information set was never
    /// visited; never empty while legal actions exist.
    pub fn get_average_strategy(
        &self,
        state: &G::State,
        player: usize,
    ) -> Result<Vec<(G::Action, f64)>, SolverError> {
        let actions = self.game.legal_actions(state)?;
        let key = self.game.info_key(state, player);
        let probs = self.storage.average_strategy(&key, actions.len());
        Ok(actions.into_iter().zip(probs).collect())
    }

    /// Current regret-matched strategy for `player` at `state`.
    pub fn get_current_strategy(
        &self,
        state: &G::State,
        player: usize,
    ) -> Result<Vec<(G::Action, f64)>, SolverError> {
        let actions = self.game.legal_actions(state)?;
        let key = self.game.info_key(state, player);
        let probs = self.storage.current_strategy(&key, actions.len());
        Ok(actions.into_iter().zip(probs).collect())
    }

    /// Mean positive regret per action slot and iteration.
    ///
    /// Cumulative positive regret grows on the order of sqrt(T), so the
    /// per-iteration average shrinks as training converges; this is the
    /// quantity compared against the convergence threshold.
    pub fn mean_positive_regret(&self) -> f64 {
        if self.iteration == 0 {
            return 0.0;
        }
        self.storage.mean_positive_regret() / self.iteration as f64
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Information sets discovered so far.
    pub fn num_info_sets(&self) -> usize {
        self.storage.num_info_sets()
    }

    /// Current statistics.
    pub fn stats(&self) -> &CfrStats {
        &self.stats
    }

    /// The game being solved.
    pub fn game(&self) -> &G {
        &self.game
    }

    /// The solver configuration.
    pub fn config(&self) -> &CfrConfig {
        &self.config
    }

    /// Read access to the regret tables, for analysis.
    pub fn storage(&self) -> &RegretStorage<G::Key> {
        &self.storage
    }

    /// Discard all accumulated regret and strategy mass.
    pub fn reset(&mut self) {
        self.storage.clear();
        self.iteration = 0;
        self.stats = CfrStats::new();
    }
}

impl<G: Game> Clone for CfrSolver<G> {
    fn clone(&self) -> Self {
        Self {
            game: self.game.clone(),
            config: self.config.clone(),
            storage: self.storage.clone(),
            iteration: self.iteration,
            stats: self.stats.clone(),
            // Fresh RNG so the clone explores independently.
            rng: StdRng::from_entropy(),
        }
    }
}
