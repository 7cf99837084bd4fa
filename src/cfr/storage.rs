//! Regret and strategy-sum tables.
//!
//! Two accumulators exist per information set: cumulative counterfactual
//! regret (driving the instantaneous regret-matched strategy) and the
//! strategy sum (driving the time-averaged strategy that converges to
//! equilibrium). Tables are keyed by the game's structural `InfoKey` type,
//! not by serialized strings.
//!
//! The storage is owned by exactly one solver instance and mutated through
//! `&mut self`; independent solvers share nothing, which keeps per-thread
//! accumulators merged after the fact as the natural parallel extension.

use rustc_hash::FxHashMap;

use crate::cfr::game::InfoKey;

/// Accumulator tables for one CFR solver.
#[derive(Debug, Clone, Default)]
pub struct RegretStorage<K: InfoKey> {
    /// Cumulative regrets: key -> regret per action.
    regrets: FxHashMap<K, Vec<f64>>,

    /// Cumulative strategy sums: key -> strategy weight per action.
    strategy_sums: FxHashMap<K, Vec<f64>>,

    /// Action counts per key, to check the identical-legal-set invariant.
    action_counts: FxHashMap<K, usize>,
}

impl<K: InfoKey> RegretStorage<K> {
    /// Create empty storage.
    pub fn new() -> Self {
        Self {
            regrets: FxHashMap::default(),
            strategy_sums: FxHashMap::default(),
            action_counts: FxHashMap::default(),
        }
    }

    /// Create storage with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            regrets: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            strategy_sums: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            action_counts: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Current strategy for an information set by regret matching.
    ///
    /// Probabilities are proportional to positive accumulated regret;
    /// uniform when no positive regret exists or the key is unseen.
    pub fn current_strategy(&self, key: &K, num_actions: usize) -> Vec<f64> {
        match self.regrets.get(key) {
            Some(r) => {
                let positive: Vec<f64> = r.iter().map(|&x| x.max(0.0)).collect();
                let sum: f64 = positive.iter().sum();
                if sum > 0.0 {
                    positive.iter().map(|&x| x / sum).collect()
                } else {
                    vec![1.0 / num_actions as f64; num_actions]
                }
            }
            None => vec![1.0 / num_actions as f64; num_actions],
        }
    }

    /// Time-averaged strategy for an information set.
    ///
    /// Normalizes the strategy sum; uniform when the key is unvisited.
    /// Never empty when `num_actions > 0`.
    pub fn average_strategy(&self, key: &K, num_actions: usize) -> Vec<f64> {
        match self.strategy_sums.get(key) {
            Some(sums) => {
                let total: f64 = sums.iter().sum();
                if total > 0.0 {
                    sums.iter().map(|&x| x / total).collect()
                } else {
                    vec![1.0 / num_actions as f64; num_actions]
                }
            }
            None => vec![1.0 / num_actions as f64; num_actions],
        }
    }

    /// Accumulate regret deltas for an information set.
    ///
    /// `updates[a]` is `opponent_reach × (action_utility − node_utility)`
    /// for the acting player.
    pub fn update_regrets(&mut self, key: &K, updates: &[f64]) {
        let num_actions = updates.len();
        self.check_action_count(key, num_actions);

        let entry = self
            .regrets
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; num_actions]);
        for (slot, &update) in entry.iter_mut().zip(updates.iter()) {
            *slot += update;
        }
    }

    /// Accumulate the weighted current strategy into the strategy sum.
    ///
    /// `weight` is the acting player's own reach probability.
    pub fn update_strategy_sum(&mut self, key: &K, strategy: &[f64], weight: f64) {
        let num_actions = strategy.len();
        self.check_action_count(key, num_actions);

        let entry = self
            .strategy_sums
            .entry(key.clone())
            .or_insert_with(|| vec![0.0; num_actions]);
        for (slot, &prob) in entry.iter_mut().zip(strategy.iter()) {
            *slot += prob * weight;
        }
    }

    fn check_action_count(&mut self, key: &K, num_actions: usize) {
        match self.action_counts.get(key) {
            Some(&stored) => {
                debug_assert_eq!(
                    stored, num_actions,
                    "action count mismatch for info set {:?}",
                    key
                );
            }
            None => {
                self.action_counts.insert(key.clone(), num_actions);
            }
        }
    }

    /// Mean cumulative positive regret per action slot across all visited
    /// info sets. The solver divides by the iteration count to get the
    /// per-iteration convergence signal.
    pub fn mean_positive_regret(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for regrets in self.regrets.values() {
            for &r in regrets {
                total += r.max(0.0);
                count += 1;
            }
        }
        if count > 0 {
            total / count as f64
        } else {
            0.0
        }
    }

    /// Number of information sets visited so far.
    pub fn num_info_sets(&self) -> usize {
        self.regrets.len()
    }

    /// Whether an information set has been visited.
    pub fn contains(&self, key: &K) -> bool {
        self.regrets.contains_key(key)
    }

    /// Clear all accumulators.
    pub fn clear(&mut self) {
        self.regrets.clear();
        self.strategy_sums.clear();
        self.action_counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl InfoKey for u32 {}

    #[test]
    fn unseen_key_yields_uniform_strategy() {
        let storage: RegretStorage<u32> = RegretStorage::new();
        let strategy = storage.current_strategy(&1, 4);
        assert_eq!(strategy, vec![0.25; 4]);
        let average = storage.average_strategy(&1, 2);
        assert_eq!(average, vec![0.5, 0.5]);
    }

    #[test]
    fn regret_matching_is_positive_proportional() {
        let mut storage: RegretStorage<u32> = RegretStorage::new();
        storage.update_regrets(&7, &[3.0, 1.0, -5.0]);
        let strategy = storage.current_strategy(&7, 3);
        assert!((strategy[0] - 0.75).abs() < 1e-12);
        assert!((strategy[1] - 0.25).abs() < 1e-12);
        assert_eq!(strategy[2], 0.0);
    }

    #[test]
    fn all_negative_regret_falls_back_to_uniform() {
        let mut storage: RegretStorage<u32> = RegretStorage::new();
        storage.update_regrets(&7, &[-1.0, -2.0]);
        assert_eq!(storage.current_strategy(&7, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn average_strategy_normalizes_weighted_sums() {
        let mut storage: RegretStorage<u32> = RegretStorage::new();
        storage.update_strategy_sum(&3, &[0.5, 0.5], 1.0);
        storage.update_strategy_sum(&3, &[1.0, 0.0], 1.0);
        let average = storage.average_strategy(&3, 2);
        assert!((average[0] - 0.75).abs() < 1e-12);
        assert!((average[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mean_positive_regret_ignores_negative_mass() {
        let mut storage: RegretStorage<u32> = RegretStorage::new();
        storage.update_regrets(&1, &[2.0, -4.0]);
        storage.update_regrets(&2, &[0.0, 2.0]);
        // Positive mass 4.0 over 4 action slots.
        assert!((storage.mean_positive_regret() - 1.0).abs() < 1e-12);
    }
}
