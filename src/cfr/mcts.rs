//! UCT tree search for the perfect-information variant of a game.
//!
//! The search consumes game states directly and never consults information
//! sets, which is exactly the variant where every player's valuations are
//! public. Each simulation runs the classic four phases: UCB1 selection
//! down the tree, expansion of exactly one child, a uniformly random
//! rollout to termination, and backpropagation of the terminal returns into
//! every ancestor's visit count and running mean (incremental mean, so the
//! accumulators stay bounded).
//!
//! Nodes live in an index-addressed arena rather than a pointer graph,
//! which keeps ownership cycle-free and cleanup a single `Vec` drop.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::cfr::error::SolverError;
use crate::cfr::game::Game;

/// Configuration for [`MctsSolver`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MctsConfig {
    /// Simulations per `solve` call.
    pub simulations: u64,

    /// UCB1 exploration constant `c`.
    pub exploration: f64,

    /// Random seed for reproducibility. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            simulations: 1000,
            exploration: 1.4,
            seed: None,
        }
    }
}

impl MctsConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the simulation count.
    pub fn with_simulations(mut self, simulations: u64) -> Self {
        self.simulations = simulations;
        self
    }

    /// Builder method: set the exploration constant.
    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    /// Builder method: set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.simulations == 0 {
            return Err(SolverError::UnsupportedTopology(
                "simulations must be at least 1".to_string(),
            ));
        }
        if !self.exploration.is_finite() || self.exploration < 0.0 {
            return Err(SolverError::UnsupportedTopology(format!(
                "exploration constant {} must be finite and non-negative",
                self.exploration
            )));
        }
        Ok(())
    }
}

/// One search-tree node in the arena.
#[derive(Debug, Clone)]
struct MctsNode<G: Game> {
    state: G::State,
    parent: Option<usize>,
    action: Option<(usize, G::Action)>,
    children: Vec<usize>,
    untried: Vec<G::Action>,
    visits: u64,
    /// Running mean return per player.
    mean: Vec<f64>,
}

/// Result of a `solve` call.
#[derive(Debug, Clone)]
pub struct MctsResult<G: Game> {
    /// Recommended line of play: the most-visited child at every level.
    pub path: Vec<(usize, G::Action)>,
    /// Returns of the state reached by replaying `path`; all-zero if the
    /// path stops short of a terminal state.
    pub expected_returns: Vec<f64>,
    /// Simulations that reached the root (equals the configured count).
    pub root_visits: u64,
}

/// UCT solver over the perfect-information game.
pub struct MctsSolver<G: Game> {
    game: G,
    config: MctsConfig,
    arena: Vec<MctsNode<G>>,
    rng: StdRng,
}

impl<G: Game> MctsSolver<G> {
    /// Create a solver for `game`.
    pub fn new(game: G, config: MctsConfig) -> Result<Self, SolverError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            game,
            config,
            arena: Vec::new(),
            rng,
        })
    }

    /// Run the configured number of simulations from a fresh initial state
    /// and return the most-visited line of play.
    ///
    /// Most-visited, not highest-mean: visit counts are the robust choice
    /// under rollout noise.
    pub fn solve(&mut self) -> Result<MctsResult<G>, SolverError> {
        self.arena.clear();
        let root_state = self.game.initial_state();
        self.push_node(root_state, None, None)?;

        for _ in 0..self.config.simulations {
            let leaf = self.select_and_expand()?;
            let returns = self.rollout(leaf)?;
            self.backpropagate(leaf, &returns);
        }

        let path = self.most_visited_path();
        let expected_returns = self.replay_returns(&path)?;
        debug!(
            "mcts: {} nodes, recommended path of {} moves",
            self.arena.len(),
            path.len()
        );
        Ok(MctsResult {
            path,
            expected_returns,
            root_visits: self.arena[0].visits,
        })
    }

    fn push_node(
        &mut self,
        state: G::State,
        parent: Option<usize>,
        action: Option<(usize, G::Action)>,
    ) -> Result<usize, SolverError> {
        let untried = if self.game.is_terminal(&state) {
            Vec::new()
        } else {
            self.game.legal_actions(&state)?
        };
        let node = MctsNode {
            state,
            parent,
            action,
            children: Vec::new(),
            untried,
            visits: 0,
            mean: vec![0.0; self.game.num_players()],
        };
        self.arena.push(node);
        Ok(self.arena.len() - 1)
    }

    /// Descend by UCB1 until a node with untried actions or a terminal is
    /// reached; expand exactly one child when possible.
    fn select_and_expand(&mut self) -> Result<usize, SolverError> {
        let mut idx = 0;
        loop {
            if self.game.is_terminal(&self.arena[idx].state) {
                return Ok(idx);
            }
            if !self.arena[idx].untried.is_empty() {
                // Expansion: exactly one new child per simulation.
                let action = self
                    .arena[idx]
                    .untried
                    .pop()
                    .ok_or(SolverError::InvalidState("untried action list drained"))?;
                let actor = self
                    .game
                    .current_player(&self.arena[idx].state)
                    .ok_or(SolverError::InvalidState("non-terminal state without actor"))?;
                let next = self.game.apply_action(&self.arena[idx].state, &action)?;
                return self.push_node(next, Some(idx), Some((actor, action)));
            }
            idx = self.best_ucb_child(idx)?;
        }
    }

    /// Child maximizing `mean + c·sqrt(2·ln(parent_visits)/child_visits)`
    /// from the acting player's perspective.
    fn best_ucb_child(&self, idx: usize) -> Result<usize, SolverError> {
        let node = &self.arena[idx];
        let actor = self
            .game
            .current_player(&node.state)
            .ok_or(SolverError::InvalidState("non-terminal state without actor"))?;
        let parent_visits = node.visits.max(1) as f64;

        let mut best: Option<(usize, f64)> = None;
        for &child_idx in &node.children {
            let child = &self.arena[child_idx];
            let visits = child.visits.max(1) as f64;
            let score = child.mean[actor]
                + self.config.exploration * (2.0 * parent_visits.ln() / visits).sqrt();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((child_idx, score));
            }
        }
        best.map(|(i, _)| i)
            .ok_or(SolverError::InvalidState("fully expanded node has no children"))
    }

    /// Uniformly random playout from the leaf's state to termination.
    fn rollout(&mut self, leaf: usize) -> Result<Vec<f64>, SolverError> {
        let mut state = self.arena[leaf].state.clone();
        while !self.game.is_terminal(&state) {
            let actions = self.game.legal_actions(&state)?;
            let action = actions
                .choose(&mut self.rng)
                .ok_or(SolverError::InvalidState(
                    "non-terminal state with no legal actions",
                ))?;
            state = self.game.apply_action(&state, action)?;
        }
        Ok(self.game.returns(&state))
    }

    /// Update visit counts and running means for the leaf and all ancestors.
    fn backpropagate(&mut self, leaf: usize, returns: &[f64]) {
        let mut current = Some(leaf);
        while let Some(idx) = current {
            let node = &mut self.arena[idx];
            node.visits += 1;
            let visits = node.visits as f64;
            for (mean, &value) in node.mean.iter_mut().zip(returns.iter()) {
                *mean += (value - *mean) / visits;
            }
            current = node.parent;
        }
    }

    /// Follow the most-visited child at each level from the root.
    fn most_visited_path(&self) -> Vec<(usize, G::Action)> {
        let mut path = Vec::new();
        let mut idx = 0;
        loop {
            let node = &self.arena[idx];
            let next = node
                .children
                .iter()
                .copied()
                .max_by_key(|&c| self.arena[c].visits);
            match next {
                Some(child_idx) => {
                    if let Some(step) = self.arena[child_idx].action.clone() {
                        path.push(step);
                    }
                    idx = child_idx;
                }
                None => break,
            }
        }
        path
    }

    /// Replay the path through the real state machine and read its returns.
    fn replay_returns(&self, path: &[(usize, G::Action)]) -> Result<Vec<f64>, SolverError> {
        let mut state = self.game.initial_state();
        for (_, action) in path {
            state = self.game.apply_action(&state, action)?;
        }
        Ok(self.game.returns(&state))
    }

    /// The game being searched.
    pub fn game(&self) -> &G {
        &self.game
    }

    /// Number of nodes in the last search tree.
    pub fn tree_size(&self) -> usize {
        self.arena.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::dilemma::{DilemmaAction, DilemmaGame};

    #[test]
    fn config_validation_rejects_degenerate_settings() {
        assert!(MctsConfig::new().with_simulations(0).validate().is_err());
        assert!(MctsConfig::new().with_exploration(-1.0).validate().is_err());
        assert!(MctsConfig::new().with_seed(1).validate().is_ok());
    }

    #[test]
    fn search_recommends_the_dominant_action() {
        let config = MctsConfig::new().with_simulations(2_000).with_seed(4);
        let mut solver = MctsSolver::new(DilemmaGame, config).unwrap();
        let result = solver.solve().unwrap();

        assert_eq!(result.root_visits, 2_000);
        assert!(solver.tree_size() > 1);
        let (actor, action) = &result.path[0];
        assert_eq!(*actor, 0);
        assert_eq!(*action, DilemmaAction::Defect);
    }

    #[test]
    fn repeated_solves_rebuild_the_tree() {
        let config = MctsConfig::new().with_simulations(200).with_seed(4);
        let mut solver = MctsSolver::new(DilemmaGame, config).unwrap();
        solver.solve().unwrap();
        let first = solver.tree_size();
        solver.solve().unwrap();
        // A fresh arena each call, no accumulation across solves.
        assert_eq!(solver.tree_size(), first);
    }

    #[test]
    fn seeded_searches_are_reproducible() {
        let config = MctsConfig::new().with_simulations(500).with_seed(99);
        let mut a = MctsSolver::new(DilemmaGame, config.clone()).unwrap();
        let mut b = MctsSolver::new(DilemmaGame, config).unwrap();
        let ra = a.solve().unwrap();
        let rb = b.solve().unwrap();
        assert_eq!(ra.path, rb.path);
        assert_eq!(ra.expected_returns, rb.expected_returns);
    }
}
