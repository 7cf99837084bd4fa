//! One-shot prisoner's dilemma as a minimal validation game.
//!
//! Two players pick `Cooperate` or `Defect`. The moves are simultaneous in
//! spirit: player 0 acts first in tree order, but player 1's information
//! key does not reveal player 0's move, so both act under the same
//! ignorance. Defection strictly dominates, which gives the solvers a
//! known equilibrium to converge to.
//!
//! Payoffs: both cooperate (3, 3); both defect (1, 1); a lone defector
//! takes 5 and leaves the cooperator 0.

use crate::cfr::error::SolverError;
use crate::cfr::game::{Game, GameAction, GameState, InfoKey};

/// Actions in the dilemma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DilemmaAction {
    /// Play nice.
    Cooperate,
    /// Don't.
    Defect,
}

impl GameAction for DilemmaAction {
    fn label(&self) -> String {
        match self {
            DilemmaAction::Cooperate => "Cooperate".to_string(),
            DilemmaAction::Defect => "Defect".to_string(),
        }
    }
}

/// Moves committed so far, in player order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DilemmaState {
    /// Player 0's move, then player 1's.
    pub moves: Vec<DilemmaAction>,
}

impl GameState for DilemmaState {}

/// Information key: the acting player only, never the other player's move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DilemmaInfo {
    /// The observing player.
    pub player: usize,
}

impl InfoKey for DilemmaInfo {}

/// The one-shot prisoner's dilemma.
#[derive(Debug, Clone, Copy, Default)]
pub struct DilemmaGame;

impl Game for DilemmaGame {
    type State = DilemmaState;
    type Action = DilemmaAction;
    type Key = DilemmaInfo;

    fn initial_state(&self) -> Self::State {
        DilemmaState::default()
    }

    fn num_players(&self) -> usize {
        2
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        state.moves.len() == 2
    }

    fn returns(&self, state: &Self::State) -> Vec<f64> {
        if state.moves.len() < 2 {
            return vec![0.0, 0.0];
        }
        use DilemmaAction::{Cooperate, Defect};
        match (state.moves[0], state.moves[1]) {
            (Cooperate, Cooperate) => vec![3.0, 3.0],
            (Cooperate, Defect) => vec![0.0, 5.0],
            (Defect, Cooperate) => vec![5.0, 0.0],
            (Defect, Defect) => vec![1.0, 1.0],
        }
    }

    fn current_player(&self, state: &Self::State) -> Option<usize> {
        if self.is_terminal(state) {
            None
        } else {
            Some(state.moves.len())
        }
    }

    fn legal_actions(&self, state: &Self::State) -> Result<Vec<Self::Action>, SolverError> {
        if self.is_terminal(state) {
            return Err(SolverError::InvalidState(
                "legal_actions called on a terminal state",
            ));
        }
        Ok(vec![DilemmaAction::Cooperate, DilemmaAction::Defect])
    }

    fn apply_action(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Self::State, SolverError> {
        if self.is_terminal(state) {
            return Err(SolverError::InvalidState(
                "apply_action called on a terminal state",
            ));
        }
        let mut next = state.clone();
        next.moves.push(*action);
        Ok(next)
    }

    fn info_key(&self, _state: &Self::State, player: usize) -> Self::Key {
        DilemmaInfo { player }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfr::best_response::{profile_value, UniformProfile};
    use crate::cfr::config::CfrConfig;
    use crate::cfr::solver::CfrSolver;

    #[test]
    fn payoff_matrix() {
        let game = DilemmaGame;
        let state = game.initial_state();
        let state = game.apply_action(&state, &DilemmaAction::Defect).unwrap();
        assert_eq!(game.current_player(&state), Some(1));
        let state = game
            .apply_action(&state, &DilemmaAction::Cooperate)
            .unwrap();
        assert!(game.is_terminal(&state));
        assert_eq!(game.returns(&state), vec![5.0, 0.0]);
    }

    #[test]
    fn second_player_is_blind_to_the_first_move() {
        let game = DilemmaGame;
        let root = game.initial_state();
        let after_c = game.apply_action(&root, &DilemmaAction::Cooperate).unwrap();
        let after_d = game.apply_action(&root, &DilemmaAction::Defect).unwrap();
        assert_eq!(game.info_key(&after_c, 1), game.info_key(&after_d, 1));
    }

    #[test]
    fn cfr_converges_to_mutual_defection() {
        let game = DilemmaGame;
        let config = CfrConfig::exact().with_seed(11);
        let mut solver = CfrSolver::new(game, config).unwrap();
        solver.train(500).unwrap();

        let root = DilemmaGame.initial_state();
        for player in 0..2 {
            let state = if player == 0 {
                root.clone()
            } else {
                DilemmaGame
                    .apply_action(&root, &DilemmaAction::Cooperate)
                    .unwrap()
            };
            let strategy = solver.get_average_strategy(&state, player).unwrap();
            let defect = strategy
                .iter()
                .find(|(a, _)| *a == DilemmaAction::Defect)
                .map(|(_, p)| *p)
                .unwrap();
            assert!(defect > 0.95, "player {} defects with p={}", player, defect);
        }
    }

    #[test]
    fn uniform_play_averages_the_payoff_matrix() {
        let game = DilemmaGame;
        let root = game.initial_state();
        // Each cell of the matrix is reached with probability 1/4, so both
        // players expect (3 + 0 + 5 + 1) / 4.
        for player in 0..2 {
            let value = profile_value(&game, &UniformProfile, &root, player).unwrap();
            assert!((value - 2.25).abs() < 1e-9);
        }
    }
}
