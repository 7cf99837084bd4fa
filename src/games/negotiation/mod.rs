//! The negotiation state machine: an N-player, multi-round scheduling
//! negotiation as an extensive-form game with imperfect information.
//!
//! ## Rules
//!
//! Play alternates between two phases. In `Proposing`, the acting player
//! puts forward one of their available slots. In `Responding`, every other
//! player in turn answers `Accept` or `Reject`. Unanimous acceptance ends
//! the game with an agreement on the proposed slot. Any rejection rotates
//! the proposer role to the next player; once `max_rounds` full rotations
//! of proposals have been spent without agreement, the game ends with no
//! agreement. A full rotation of identical proposals also counts as an
//! agreement: if the last N proposals name the same slot and come from all
//! N players, the slot is considered unanimously endorsed — the N-party
//! generalization of two-party tit-for-tat agreement.
//!
//! ## Information
//!
//! Proposals and responses are public; each player's valuation of the slots
//! is private. The information-set key therefore carries the public record
//! plus the observing player's identity, and nothing of anyone else's
//! valuations.
//!
//! Payoffs on agreement are each player's valuation of the agreed slot,
//! under a configurable scoring policy that can grant proportional partial
//! credit to near-match slots. The partial-credit rule is a heuristic
//! scoring policy, not a fairness guarantee.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cfr::error::SolverError;
use crate::cfr::game::{Game, GameAction, GameState, InfoKey};

/// An opaque, totally-ordered proposal unit (a calendar window, say).
///
/// The core compares slots only for identity and order; what a slot means
/// belongs to the preference layer that constructs the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(pub u32);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Actions in the negotiation game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationAction {
    /// Put a slot on the table.
    Propose(Slot),
    /// Accept the active proposal.
    Accept,
    /// Reject the active proposal.
    Reject,
}

impl GameAction for NegotiationAction {
    fn label(&self) -> String {
        match self {
            NegotiationAction::Propose(slot) => format!("Propose({})", slot),
            NegotiationAction::Accept => "Accept".to_string(),
            NegotiationAction::Reject => "Reject".to_string(),
        }
    }
}

/// Which phase the negotiation is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The acting player picks a slot to propose.
    Proposing,
    /// The non-proposers answer the active proposal one by one.
    Responding,
}

/// The proposal currently on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Proposal {
    /// Who proposed.
    pub proposer: usize,
    /// The proposed slot.
    pub slot: Slot,
}

/// A recorded answer to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Response {
    /// The responder accepted.
    Accept,
    /// The responder rejected.
    Reject,
}

/// How the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Unanimous agreement on a slot.
    Agreement(Slot),
    /// The round budget ran out without agreement.
    NoAgreement,
}

/// Scoring rule applied to each player's valuation on agreement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoringPolicy {
    /// Only the exactly-agreed slot pays out.
    Exact,
    /// Slots within `radius` of the agreed slot (by slot order) pay a
    /// linearly decaying share of their valuation. A heuristic compromise
    /// reward, configurable rather than load-bearing.
    Proportional {
        /// Maximum slot-order distance that still earns credit.
        radius: u32,
    },
}

/// Payoff rule when the round budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoAgreementPolicy {
    /// Everyone gets zero.
    Zero,
    /// If a strict majority of distinct proposers backed one slot, each
    /// player is paid their score for that slot scaled by the backer
    /// share; otherwise zero.
    MajorityShare,
}

/// Static configuration of a negotiation game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationConfig {
    /// Full proposer rotations before the game times out. The proposal
    /// budget is `max_rounds × num_players`.
    pub max_rounds: u32,
    /// Payoff rule on agreement.
    pub scoring: ScoringPolicy,
    /// Payoff rule on budget exhaustion.
    pub no_agreement: NoAgreementPolicy,
    /// Flat bonus added to every player's payoff on agreement.
    pub agreement_bonus: f64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            scoring: ScoringPolicy::Exact,
            no_agreement: NoAgreementPolicy::Zero,
            agreement_bonus: 0.0,
        }
    }
}

/// The mutable game-tree node.
///
/// History is append-only and carries one `(player, slot)` entry per
/// applied proposal; together with the phase, turn, and response scalars it
/// fully determines behavior (the state is Markov in these fields).
/// `Clone` deep-copies every field, so a clone can be mutated while the
/// original is retained for alternative-branch exploration.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiationState {
    /// All proposals made so far, in order.
    pub history: Vec<(usize, Slot)>,
    /// Current phase.
    pub phase: Phase,
    /// Player to act.
    pub to_act: usize,
    /// Proposals spent against the round budget.
    pub proposals_made: u32,
    /// The proposal being responded to, if any.
    pub active: Option<Proposal>,
    /// Responses to the active proposal, indexed by player; `None` is
    /// pending (the proposer's own entry stays `None`).
    pub responses: Vec<Option<Response>>,
    /// Set once a termination condition fires; the state is immutable
    /// afterwards.
    pub outcome: Option<Outcome>,
}

impl GameState for NegotiationState {}

/// Structural information-set key: the public record as seen by one player.
///
/// Contains the observer's identity (their own preferences are fixed per
/// player), the phase, the proposal history, the active proposal, and the
/// public responses. Never any other player's private valuations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NegotiationInfo {
    /// The observing player.
    pub player: usize,
    /// Current phase.
    pub phase: Phase,
    /// Public proposal history.
    pub history: Vec<(usize, Slot)>,
    /// The active proposal, if any.
    pub active: Option<Proposal>,
    /// Public responses to the active proposal.
    pub responses: Vec<Option<Response>>,
}

impl InfoKey for NegotiationInfo {}

/// The negotiation game. Immutable once constructed; all solvers work on
/// `NegotiationState` values produced by [`Game::initial_state`].
#[derive(Debug, Clone)]
pub struct NegotiationGame {
    valuations: Vec<FxHashMap<Slot, f64>>,
    availability: Vec<Vec<Slot>>,
    config: NegotiationConfig,
}

impl NegotiationGame {
    /// Build a game from per-player valuations and availability.
    ///
    /// Availability lists are sorted and deduplicated so legal-action order
    /// is deterministic. Fails with `UnsupportedTopology` for fewer than
    /// two players, mismatched maps, an empty availability list, negative
    /// valuations, or a zero round budget.
    pub fn new(
        valuations: Vec<FxHashMap<Slot, f64>>,
        availability: Vec<Vec<Slot>>,
        config: NegotiationConfig,
    ) -> Result<Self, SolverError> {
        let n = availability.len();
        if n < 2 {
            return Err(SolverError::UnsupportedTopology(format!(
                "negotiation requires at least 2 players, got {}",
                n
            )));
        }
        if valuations.len() != n {
            return Err(SolverError::UnsupportedTopology(format!(
                "{} valuation maps for {} players",
                valuations.len(),
                n
            )));
        }
        if config.max_rounds == 0 {
            return Err(SolverError::UnsupportedTopology(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        for (player, map) in valuations.iter().enumerate() {
            for (&slot, &value) in map {
                if !value.is_finite() || value < 0.0 {
                    return Err(SolverError::UnsupportedTopology(format!(
                        "player {} values {} at {}, valuations must be finite and non-negative",
                        player, slot, value
                    )));
                }
            }
        }
        let mut availability = availability;
        for (player, slots) in availability.iter_mut().enumerate() {
            slots.sort_unstable();
            slots.dedup();
            if slots.is_empty() {
                return Err(SolverError::UnsupportedTopology(format!(
                    "player {} has no available slots",
                    player
                )));
            }
        }
        Ok(Self {
            valuations,
            availability,
            config,
        })
    }

    /// The static configuration.
    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// A player's available slots, sorted.
    pub fn availability(&self, player: usize) -> &[Slot] {
        &self.availability[player]
    }

    /// A player's valuation of a slot under the configured scoring policy.
    pub fn score(&self, player: usize, slot: Slot) -> f64 {
        let valuation = &self.valuations[player];
        match self.config.scoring {
            ScoringPolicy::Exact => valuation.get(&slot).copied().unwrap_or(0.0),
            ScoringPolicy::Proportional { radius } => {
                let mut best = 0.0f64;
                for (&valued, &value) in valuation {
                    let distance = valued.0.abs_diff(slot.0);
                    if distance <= radius {
                        let credit = 1.0 - distance as f64 / (radius as f64 + 1.0);
                        best = best.max(value * credit);
                    }
                }
                best
            }
        }
    }

    fn proposal_budget(&self) -> u32 {
        self.config.max_rounds * self.availability.len() as u32
    }

    /// Whether the last N proposals name one slot, endorsed by all N
    /// distinct players.
    fn full_rotation_agreement(&self, history: &[(usize, Slot)]) -> Option<Slot> {
        let n = self.availability.len();
        if history.len() < n {
            return None;
        }
        let cycle = &history[history.len() - n..];
        let slot = cycle[0].1;
        if cycle.iter().any(|&(_, s)| s != slot) {
            return None;
        }
        let mut seen = vec![false; n];
        for &(player, _) in cycle {
            seen[player] = true;
        }
        if seen.iter().all(|&s| s) {
            Some(slot)
        } else {
            None
        }
    }

    /// Next responder after `from`, skipping the proposer and players who
    /// already answered.
    fn next_responder(&self, state: &NegotiationState, from: usize) -> Option<usize> {
        let n = self.availability.len();
        let proposer = state.active.map(|p| p.proposer)?;
        for step in 1..=n {
            let candidate = (from + step) % n;
            if candidate != proposer && state.responses[candidate].is_none() {
                return Some(candidate);
            }
        }
        None
    }

    fn no_agreement_returns(&self, state: &NegotiationState) -> Vec<f64> {
        let n = self.availability.len();
        match self.config.no_agreement {
            NoAgreementPolicy::Zero => vec![0.0; n],
            NoAgreementPolicy::MajorityShare => {
                // Modal slot by count of distinct backers.
                let mut backers: FxHashMap<Slot, Vec<bool>> = FxHashMap::default();
                for &(player, slot) in &state.history {
                    backers.entry(slot).or_insert_with(|| vec![false; n])[player] = true;
                }
                let best = backers
                    .into_iter()
                    .map(|(slot, who)| (slot, who.iter().filter(|&&b| b).count()))
                    .max_by_key(|&(slot, count)| (count, std::cmp::Reverse(slot)));
                match best {
                    Some((slot, count)) if count * 2 > n => {
                        let share = count as f64 / n as f64;
                        (0..n).map(|p| self.score(p, slot) * share).collect()
                    }
                    _ => vec![0.0; n],
                }
            }
        }
    }
}

impl Game for NegotiationGame {
    type State = NegotiationState;
    type Action = NegotiationAction;
    type Key = NegotiationInfo;

    fn initial_state(&self) -> Self::State {
        let n = self.availability.len();
        NegotiationState {
            history: Vec::new(),
            phase: Phase::Proposing,
            to_act: 0,
            proposals_made: 0,
            active: None,
            responses: vec![None; n],
            outcome: None,
        }
    }

    fn num_players(&self) -> usize {
        self.availability.len()
    }

    fn is_terminal(&self, state: &Self::State) -> bool {
        state.outcome.is_some()
    }

    fn returns(&self, state: &Self::State) -> Vec<f64> {
        let n = self.availability.len();
        match state.outcome {
            None => vec![0.0; n],
            Some(Outcome::Agreement(slot)) => (0..n)
                .map(|p| self.score(p, slot) + self.config.agreement_bonus)
                .collect(),
            Some(Outcome::NoAgreement) => self.no_agreement_returns(state),
        }
    }

    fn current_player(&self, state: &Self::State) -> Option<usize> {
        if state.outcome.is_some() {
            None
        } else {
            Some(state.to_act)
        }
    }

    fn legal_actions(&self, state: &Self::State) -> Result<Vec<Self::Action>, SolverError> {
        if state.outcome.is_some() {
            return Err(SolverError::InvalidState(
                "legal_actions called on a terminal state",
            ));
        }
        match state.phase {
            Phase::Proposing => {
                let actor = state.to_act;
                let fresh: Vec<Slot> = self.availability[actor]
                    .iter()
                    .copied()
                    .filter(|slot| {
                        !state
                            .history
                            .iter()
                            .any(|&(p, s)| p == actor && s == *slot)
                    })
                    .collect();
                // A player who has proposed everything once may re-propose;
                // legal actions stay non-empty for reachable states.
                let pool = if fresh.is_empty() {
                    self.availability[actor].clone()
                } else {
                    fresh
                };
                Ok(pool.into_iter().map(NegotiationAction::Propose).collect())
            }
            Phase::Responding => Ok(vec![NegotiationAction::Accept, NegotiationAction::Reject]),
        }
    }

    fn apply_action(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Self::State, SolverError> {
        if state.outcome.is_some() {
            return Err(SolverError::InvalidState(
                "apply_action called on a terminal state",
            ));
        }
        let legal = self.legal_actions(state)?;
        if !legal.contains(action) {
            return Err(SolverError::IllegalAction {
                player: state.to_act,
                action: action.label(),
            });
        }

        let n = self.availability.len();
        let mut next = state.clone();
        match (state.phase, action) {
            (Phase::Proposing, NegotiationAction::Propose(slot)) => {
                let actor = state.to_act;
                next.history.push((actor, *slot));
                next.proposals_made += 1;

                if let Some(agreed) = self.full_rotation_agreement(&next.history) {
                    next.outcome = Some(Outcome::Agreement(agreed));
                    return Ok(next);
                }

                next.active = Some(Proposal {
                    proposer: actor,
                    slot: *slot,
                });
                next.phase = Phase::Responding;
                next.responses = vec![None; n];
                match self.next_responder(&next, actor) {
                    Some(responder) => next.to_act = responder,
                    None => {
                        // Degenerate single-responder topologies are rejected
                        // at construction, so every proposal has responders.
                        return Err(SolverError::InvalidState(
                            "proposal with no pending responders",
                        ));
                    }
                }
            }
            (Phase::Responding, NegotiationAction::Accept)
            | (Phase::Responding, NegotiationAction::Reject) => {
                let responder = state.to_act;
                let response = if *action == NegotiationAction::Accept {
                    Response::Accept
                } else {
                    Response::Reject
                };
                next.responses[responder] = Some(response);

                match self.next_responder(&next, responder) {
                    Some(pending) => next.to_act = pending,
                    None => {
                        // Full response cycle collected: evaluate unanimity.
                        let proposal = next.active.ok_or(SolverError::InvalidState(
                            "responding phase without an active proposal",
                        ))?;
                        let unanimous = next
                            .responses
                            .iter()
                            .enumerate()
                            .filter(|&(p, _)| p != proposal.proposer)
                            .all(|(_, r)| *r == Some(Response::Accept));
                        if unanimous {
                            next.outcome = Some(Outcome::Agreement(proposal.slot));
                        } else if next.proposals_made >= self.proposal_budget() {
                            next.outcome = Some(Outcome::NoAgreement);
                        } else {
                            next.phase = Phase::Proposing;
                            next.to_act = (proposal.proposer + 1) % n;
                            next.active = None;
                            next.responses = vec![None; n];
                        }
                    }
                }
            }
            _ => {
                // Phase/action mismatch is filtered by the legality check.
                return Err(SolverError::IllegalAction {
                    player: state.to_act,
                    action: action.label(),
                });
            }
        }
        Ok(next)
    }

    fn info_key(&self, state: &Self::State, player: usize) -> Self::Key {
        NegotiationInfo {
            player,
            phase: state.phase,
            history: state.history.clone(),
            active: state.active,
            responses: state.responses.clone(),
        }
    }

    /// Value of the still-open proposal to `player`; the lookahead cutoff
    /// estimate for the depth-limited best response.
    fn heuristic_value(&self, state: &Self::State, player: usize) -> f64 {
        match state.active {
            Some(proposal) => self.score(player, proposal.slot),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_map(entries: &[(u32, f64)]) -> FxHashMap<Slot, f64> {
        entries.iter().map(|&(s, v)| (Slot(s), v)).collect()
    }

    /// The concrete two-player scenario: Mon=0, Tue=1, Wed=2.
    fn two_player_game() -> NegotiationGame {
        NegotiationGame::new(
            vec![
                slot_map(&[(0, 5.0), (1, 0.0), (2, 3.0)]),
                slot_map(&[(0, 0.0), (1, 4.0), (2, 3.0)]),
            ],
            vec![vec![Slot(0), Slot(2)], vec![Slot(1), Slot(2)]],
            NegotiationConfig::default(),
        )
        .expect("valid game")
    }

    fn three_player_game() -> NegotiationGame {
        NegotiationGame::new(
            vec![
                slot_map(&[(0, 5.0), (1, 1.0), (2, 3.0)]),
                slot_map(&[(0, 1.0), (1, 5.0), (2, 3.0)]),
                slot_map(&[(0, 1.0), (1, 1.0), (2, 5.0)]),
            ],
            vec![
                vec![Slot(0), Slot(1), Slot(2)],
                vec![Slot(0), Slot(1), Slot(2)],
                vec![Slot(0), Slot(1), Slot(2)],
            ],
            NegotiationConfig::default(),
        )
        .expect("valid game")
    }

    #[test]
    fn rejects_degenerate_topologies() {
        assert!(NegotiationGame::new(
            vec![slot_map(&[(0, 1.0)])],
            vec![vec![Slot(0)]],
            NegotiationConfig::default(),
        )
        .is_err());

        assert!(NegotiationGame::new(
            vec![slot_map(&[(0, 1.0)]), slot_map(&[(0, 1.0)])],
            vec![vec![Slot(0)], vec![]],
            NegotiationConfig::default(),
        )
        .is_err());

        assert!(NegotiationGame::new(
            vec![slot_map(&[(0, -2.0)]), slot_map(&[(0, 1.0)])],
            vec![vec![Slot(0)], vec![Slot(0)]],
            NegotiationConfig::default(),
        )
        .is_err());
    }

    #[test]
    fn proposing_actions_are_unused_available_slots() {
        let game = two_player_game();
        let state = game.initial_state();
        let actions = game.legal_actions(&state).unwrap();
        assert_eq!(
            actions,
            vec![
                NegotiationAction::Propose(Slot(0)),
                NegotiationAction::Propose(Slot(2)),
            ]
        );
    }

    #[test]
    fn responding_actions_are_accept_reject() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(0)))
            .unwrap();
        assert_eq!(state.phase, Phase::Responding);
        assert_eq!(state.to_act, 1);
        let actions = game.legal_actions(&state).unwrap();
        assert_eq!(
            actions,
            vec![NegotiationAction::Accept, NegotiationAction::Reject]
        );
    }

    #[test]
    fn unanimous_acceptance_terminates_with_valuation_payoffs() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        assert!(game.is_terminal(&state));
        assert_eq!(state.outcome, Some(Outcome::Agreement(Slot(2))));
        assert_eq!(game.returns(&state), vec![3.0, 3.0]);
    }

    #[test]
    fn rejection_rotates_the_proposer() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(0)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
        assert!(!game.is_terminal(&state));
        assert_eq!(state.phase, Phase::Proposing);
        assert_eq!(state.to_act, 1);
        assert_eq!(state.active, None);
        assert_eq!(game.returns(&state), vec![0.0, 0.0]);
    }

    #[test]
    fn full_rotation_of_identical_proposals_is_agreement() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
        // Player 1 echoes the same slot: a full rotation now endorses Wed.
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        assert!(game.is_terminal(&state));
        assert_eq!(state.outcome, Some(Outcome::Agreement(Slot(2))));
        assert_eq!(game.returns(&state), vec![3.0, 3.0]);
    }

    /// Two players with no common slot: rotation agreement can never fire.
    fn disjoint_game() -> NegotiationGame {
        NegotiationGame::new(
            vec![
                slot_map(&[(0, 2.0), (1, 1.0)]),
                slot_map(&[(2, 2.0), (3, 1.0)]),
            ],
            vec![vec![Slot(0), Slot(1)], vec![Slot(2), Slot(3)]],
            NegotiationConfig::default(),
        )
        .expect("valid game")
    }

    #[test]
    fn round_budget_exhaustion_is_no_agreement_not_an_error() {
        let game = disjoint_game();
        let mut state = game.initial_state();
        // max_rounds=3 × 2 players = 6 proposals. Propose the first legal
        // slot every time and reject every proposal.
        let mut proposals = 0;
        while !game.is_terminal(&state) {
            match state.phase {
                Phase::Proposing => {
                    let action = game.legal_actions(&state).unwrap()[0];
                    state = game.apply_action(&state, &action).unwrap();
                    proposals += 1;
                }
                Phase::Responding => {
                    state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
                }
            }
        }
        assert_eq!(proposals, 6);
        assert_eq!(state.outcome, Some(Outcome::NoAgreement));
        assert_eq!(game.returns(&state), vec![0.0, 0.0]);
    }

    #[test]
    fn terminal_states_reject_further_operations() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        assert!(matches!(
            game.legal_actions(&state),
            Err(SolverError::InvalidState(_))
        ));
        assert!(game
            .apply_action(&state, &NegotiationAction::Accept)
            .is_err());
        assert_eq!(game.current_player(&state), None);
    }

    #[test]
    fn illegal_proposals_are_rejected() {
        let game = two_player_game();
        let state = game.initial_state();
        // Player 0 cannot propose Tue (slot 1): not in their availability.
        match game.apply_action(&state, &NegotiationAction::Propose(Slot(1))) {
            Err(SolverError::IllegalAction { player: 0, .. }) => {}
            other => panic!("expected IllegalAction, got {:?}", other),
        }
        // Responses are illegal while proposing.
        assert!(game.apply_action(&state, &NegotiationAction::Accept).is_err());
    }

    #[test]
    fn clone_is_independent_of_the_original() {
        let game = two_player_game();
        let original = game.initial_state();
        let clone = original.clone();
        let mutated = game
            .apply_action(&clone, &NegotiationAction::Propose(Slot(0)))
            .unwrap();
        // The original state is untouched by the clone's successor.
        assert!(original.history.is_empty());
        assert_eq!(original.phase, Phase::Proposing);
        assert_eq!(original.active, None);
        assert_eq!(mutated.history, vec![(0, Slot(0))]);
    }

    #[test]
    fn three_player_response_order_skips_the_proposer() {
        let game = three_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        assert_eq!(state.to_act, 1);
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        assert_eq!(state.to_act, 2);
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        assert!(game.is_terminal(&state));
        assert_eq!(game.returns(&state), vec![3.0, 3.0, 5.0]);
    }

    #[test]
    fn three_player_agreement_needs_every_responder() {
        let game = three_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(0)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
        assert!(!game.is_terminal(&state));
        // Proposer rotates to player 1.
        assert_eq!(state.phase, Phase::Proposing);
        assert_eq!(state.to_act, 1);
    }

    #[test]
    fn info_key_tracks_public_record_only() {
        let game = two_player_game();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(0)))
            .unwrap();

        let key0 = game.info_key(&state, 0);
        let key1 = game.info_key(&state, 1);
        // Same public record, distinguished only by observer identity.
        assert_eq!(key0.history, key1.history);
        assert_eq!(key0.active, key1.active);
        assert_ne!(key0, key1);
    }

    #[test]
    fn proportional_scoring_credits_near_slots() {
        let mut config = NegotiationConfig::default();
        config.scoring = ScoringPolicy::Proportional { radius: 1 };
        let game = NegotiationGame::new(
            vec![
                slot_map(&[(0, 4.0)]),
                slot_map(&[(1, 4.0)]),
            ],
            vec![vec![Slot(0), Slot(1)], vec![Slot(0), Slot(1)]],
            config,
        )
        .unwrap();
        // Agreement on slot 1: player 0 only values slot 0, one step away,
        // and earns half credit.
        assert_eq!(game.score(0, Slot(1)), 2.0);
        assert_eq!(game.score(1, Slot(1)), 4.0);
        // Exact scoring would give player 0 nothing.
        assert_eq!(game.score(0, Slot(0)), 4.0);
    }

    #[test]
    fn majority_share_pays_the_modal_slot() {
        let mut config = NegotiationConfig::default();
        config.max_rounds = 1;
        config.no_agreement = NoAgreementPolicy::MajorityShare;
        let game = NegotiationGame::new(
            vec![
                slot_map(&[(0, 6.0), (1, 3.0)]),
                slot_map(&[(0, 3.0), (1, 6.0)]),
                slot_map(&[(0, 3.0), (1, 0.0)]),
            ],
            vec![
                vec![Slot(0), Slot(1)],
                vec![Slot(0), Slot(1)],
                vec![Slot(0), Slot(1)],
            ],
            config,
        )
        .unwrap();

        // Three proposals: slot 0 twice (players 0 and 2), slot 1 once.
        // Everyone rejects, so the budget of 1×3 proposals runs out.
        let mut state = game.initial_state();
        let script = [
            NegotiationAction::Propose(Slot(0)),
            NegotiationAction::Reject,
            NegotiationAction::Reject,
            NegotiationAction::Propose(Slot(1)),
            NegotiationAction::Reject,
            NegotiationAction::Reject,
            NegotiationAction::Propose(Slot(0)),
            NegotiationAction::Reject,
            NegotiationAction::Reject,
        ];
        for action in &script {
            state = game.apply_action(&state, action).unwrap();
        }
        assert_eq!(state.outcome, Some(Outcome::NoAgreement));
        // Slot 0 backed by 2 of 3 distinct proposers: share 2/3.
        let returns = game.returns(&state);
        assert!((returns[0] - 4.0).abs() < 1e-12);
        assert!((returns[1] - 2.0).abs() < 1e-12);
        assert!((returns[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn agreement_bonus_is_added_for_everyone() {
        let mut config = NegotiationConfig::default();
        config.agreement_bonus = 1.5;
        let game = NegotiationGame::new(
            vec![
                slot_map(&[(2, 3.0)]),
                slot_map(&[(2, 3.0)]),
            ],
            vec![vec![Slot(2)], vec![Slot(2)]],
            config,
        )
        .unwrap();
        let state = game.initial_state();
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(2)))
            .unwrap();
        let state = game.apply_action(&state, &NegotiationAction::Accept).unwrap();
        assert_eq!(game.returns(&state), vec![4.5, 4.5]);
    }

    #[test]
    fn heuristic_value_reads_the_open_proposal() {
        let game = two_player_game();
        let state = game.initial_state();
        assert_eq!(game.heuristic_value(&state, 0), 0.0);
        let state = game
            .apply_action(&state, &NegotiationAction::Propose(Slot(0)))
            .unwrap();
        assert_eq!(game.heuristic_value(&state, 0), 5.0);
        assert_eq!(game.heuristic_value(&state, 1), 0.0);
    }

    #[test]
    fn exhausted_proposer_falls_back_to_full_availability() {
        let game = disjoint_game();
        let mut state = game.initial_state();
        // Two rounds in which both players spend both of their slots.
        for (p0_slot, p1_slot) in [(Slot(0), Slot(2)), (Slot(1), Slot(3))] {
            state = game
                .apply_action(&state, &NegotiationAction::Propose(p0_slot))
                .unwrap();
            state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
            state = game
                .apply_action(&state, &NegotiationAction::Propose(p1_slot))
                .unwrap();
            state = game.apply_action(&state, &NegotiationAction::Reject).unwrap();
        }
        assert_eq!(state.phase, Phase::Proposing);
        assert_eq!(state.to_act, 0);
        // Both slots already used: the full availability reopens.
        let actions = game.legal_actions(&state).unwrap();
        assert_eq!(
            actions,
            vec![
                NegotiationAction::Propose(Slot(0)),
                NegotiationAction::Propose(Slot(1)),
            ]
        );
    }
}
