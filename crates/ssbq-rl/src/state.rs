//! Tabular learner state: Q-values, counters and outcome frequencies

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;

use ssbq_core::{running_mean_update, Environment, OutcomeLevel, Result, SsbqError};

use crate::algorithm::SelectionStats;
use crate::exploration::SelectionKind;
use crate::history::History;

/// Empirical action frequencies in one visited state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayedPolicy {
    pub state: String,
    pub visits: u64,
    pub actions: Vec<(String, f64)>,
}

/// Tables shared by the tabular learners.
///
/// Every table is populated once from the environment: a Q-value and an
/// experience counter for each legal pair, plus a Q-value for the reinit
/// action in every state. Nothing is added afterwards and lookups outside
/// the tables fail with [`SsbqError::UnrecognizedState`].
#[derive(Debug, Clone)]
pub struct TabularState<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + Eq + Hash + Debug,
{
    states: Vec<S>,
    initial_state: S,
    legal: HashMap<S, Vec<A>>,
    q_values: HashMap<S, HashMap<A, f64>>,
    visits: HashMap<S, u64>,
    experiences: HashMap<S, HashMap<A, u64>>,

    levels: Vec<OutcomeLevel>,
    on_policy: HashMap<OutcomeLevel, f64>,
    real: HashMap<OutcomeLevel, f64>,
    on_policy_episodes: u64,
    episodes: u64,

    stats: SelectionStats,
    history: History<f64>,
}

impl<S, A> TabularState<S, A>
where
    S: Clone + Eq + Hash + Debug,
    A: Clone + Eq + Hash + Debug,
{
    pub fn from_environment<E>(env: &E, history_capacity: usize) -> Result<Self>
    where
        E: Environment<State = S, Action = A> + ?Sized,
    {
        let reinit = env.reinit_action();
        let mut legal = HashMap::with_capacity(env.states().len());
        let mut q_values = HashMap::with_capacity(env.states().len());
        let mut experiences = HashMap::with_capacity(env.states().len());
        let mut visits = HashMap::with_capacity(env.states().len());

        for state in env.states() {
            let actions = env.legal_actions(state)?;
            let mut q: HashMap<A, f64> = actions.iter().map(|a| (a.clone(), 0.0)).collect();
            q.insert(reinit.clone(), 0.0);
            let mut counts: HashMap<A, u64> = actions.iter().map(|a| (a.clone(), 0)).collect();
            counts.insert(reinit.clone(), 0);

            q_values.insert(state.clone(), q);
            experiences.insert(state.clone(), counts);
            visits.insert(state.clone(), 0);
            legal.insert(state.clone(), actions);
        }

        if !legal.contains_key(env.initial_state()) {
            return Err(SsbqError::unrecognized_state(env.initial_state()));
        }

        let levels = env.outcome_levels().to_vec();
        if levels.is_empty() {
            return Err(SsbqError::Config(format!(
                "{} declares no outcome levels",
                env.name()
            )));
        }
        let uniform = 1.0 / levels.len() as f64;
        let frequencies: HashMap<OutcomeLevel, f64> =
            levels.iter().map(|l| (l.clone(), uniform)).collect();

        Ok(Self {
            states: env.states().to_vec(),
            initial_state: env.initial_state().clone(),
            legal,
            q_values,
            visits,
            experiences,
            levels,
            on_policy: frequencies.clone(),
            real: frequencies,
            on_policy_episodes: 0,
            episodes: 0,
            stats: SelectionStats::default(),
            history: History::new(history_capacity),
        })
    }

    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }

    pub fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    pub fn legal_actions(&self, state: &S) -> Result<&[A]> {
        self.legal
            .get(state)
            .map(Vec::as_slice)
            .ok_or_else(|| SsbqError::unrecognized_state(state))
    }

    pub fn q_value(&self, state: &S, action: &A) -> Option<f64> {
        self.q_values.get(state)?.get(action).copied()
    }

    /// Largest Q-value over the legal actions of `state`
    pub fn max_q(&self, state: &S) -> Result<f64> {
        let row = self
            .q_values
            .get(state)
            .ok_or_else(|| SsbqError::unrecognized_state(state))?;
        Ok(self
            .legal_actions(state)?
            .iter()
            .filter_map(|a| row.get(a))
            .copied()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Fail unless `state`, `action` and `next_state` all have table
    /// entries. Learners call this before touching any counter.
    pub fn check_transition(&self, state: &S, action: &A, next_state: &S) -> Result<()> {
        let row = self
            .q_values
            .get(state)
            .ok_or_else(|| SsbqError::unrecognized_state(state))?;
        if !row.contains_key(action) {
            return Err(SsbqError::illegal_action(state, action));
        }
        if !self.q_values.contains_key(next_state) {
            return Err(SsbqError::unrecognized_state(next_state));
        }
        Ok(())
    }

    /// Move `Q[state, action]` towards `target` by `rate`
    pub fn update_q(&mut self, state: &S, action: &A, target: f64, rate: f64) -> Result<f64> {
        let q = self
            .q_values
            .get_mut(state)
            .ok_or_else(|| SsbqError::unrecognized_state(state))?
            .get_mut(action)
            .ok_or_else(|| SsbqError::illegal_action(state, action))?;
        *q += rate * (target - *q);
        Ok(*q)
    }

    /// Count a visit to `state` and an experience of `action` there.
    /// Returns the experience count after the increment.
    pub fn record_experience(&mut self, state: &S, action: &A) -> Result<u64> {
        let count = self
            .experiences
            .get_mut(state)
            .ok_or_else(|| SsbqError::unrecognized_state(state))?
            .get_mut(action)
            .ok_or_else(|| SsbqError::illegal_action(state, action))?;
        *count += 1;
        let count = *count;
        if let Some(visits) = self.visits.get_mut(state) {
            *visits += 1;
        }
        Ok(count)
    }

    pub fn visit_count(&self, state: &S) -> u64 {
        self.visits.get(state).copied().unwrap_or(0)
    }

    pub fn experience_count(&self, state: &S, action: &A) -> u64 {
        self.experiences
            .get(state)
            .and_then(|row| row.get(action))
            .copied()
            .unwrap_or(0)
    }

    /// Count a finished episode; returns the episode number `n` (from 1)
    pub fn count_episode(&mut self) -> u64 {
        self.episodes += 1;
        self.episodes
    }

    /// Count a finished non-exploratory episode; returns its number
    pub fn count_on_policy_episode(&mut self) -> u64 {
        self.on_policy_episodes += 1;
        self.on_policy_episodes
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn on_policy_episodes(&self) -> u64 {
        self.on_policy_episodes
    }

    pub fn update_on_policy(&mut self, level: &OutcomeLevel, coefficient: f64) -> Result<()> {
        running_mean_update(&mut self.on_policy, level, coefficient)
    }

    pub fn update_real(&mut self, level: &OutcomeLevel, coefficient: f64) -> Result<()> {
        running_mean_update(&mut self.real, level, coefficient)
    }

    pub fn on_policy_frequency(&self) -> &HashMap<OutcomeLevel, f64> {
        &self.on_policy
    }

    pub fn real_frequency(&self) -> &HashMap<OutcomeLevel, f64> {
        &self.real
    }

    /// First level at which the real mass still above it drops below `q`
    pub fn quantile_level(&self, q: f64) -> Option<&OutcomeLevel> {
        let mut remaining = 1.0;
        for level in &self.levels {
            remaining -= self.real.get(level).copied().unwrap_or(0.0);
            if remaining < q {
                return Some(level);
            }
        }
        self.levels.last()
    }

    pub fn record_selection(&mut self, kind: SelectionKind) {
        self.stats.record(kind);
    }

    pub fn record_forced_reset(&mut self) {
        self.stats.forced_resets += 1;
    }

    pub fn selection_stats(&self) -> SelectionStats {
        self.stats
    }

    /// Record an episode result (outcome rank or cost-budget score)
    pub fn record_outcome(&mut self, value: f64) {
        self.history.push(value);
    }

    pub fn history(&self) -> &History<f64> {
        &self.history
    }

    /// Experience-over-visit ratios of every visited state, in the
    /// environment's state order
    pub fn played_policy(&self) -> Vec<PlayedPolicy> {
        self.states
            .iter()
            .filter_map(|state| {
                let visits = self.visit_count(state);
                if visits == 0 {
                    return None;
                }
                let row = self.experiences.get(state)?;
                let legal = self.legal.get(state)?;
                let actions = legal
                    .iter()
                    .chain(row.keys().filter(|a| !legal.contains(a)))
                    .filter_map(|a| {
                        let n = row.get(a).copied().unwrap_or(0);
                        (n > 0).then(|| (format!("{a:?}"), n as f64 / visits as f64))
                    })
                    .collect();
                Some(PlayedPolicy {
                    state: format!("{state:?}"),
                    visits,
                    actions,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChoiceEnv, Pick, Spot};

    fn create_test_tables() -> TabularState<Spot, Pick> {
        TabularState::from_environment(&ChoiceEnv::new(), 16).unwrap()
    }

    #[test]
    fn test_tables_are_prepopulated() {
        let tables = create_test_tables();
        assert_eq!(tables.q_value(&Spot::Start, &Pick::Left), Some(0.0));
        assert_eq!(tables.q_value(&Spot::Start, &Pick::Right), Some(0.0));
        assert_eq!(tables.q_value(&Spot::Low, &Pick::Reinit), Some(0.0));
        assert_eq!(tables.q_value(&Spot::Start, &Pick::Reinit), Some(0.0));
        assert_eq!(tables.visit_count(&Spot::Start), 0);
    }

    #[test]
    fn test_frequencies_start_uniform() {
        let tables = create_test_tables();
        let third = 1.0 / 3.0;
        for level in tables.outcome_levels() {
            assert!((tables.real_frequency()[level] - third).abs() < 1e-12);
            assert!((tables.on_policy_frequency()[level] - third).abs() < 1e-12);
        }
    }

    #[test]
    fn test_update_and_max_q() {
        let mut tables = create_test_tables();
        tables.update_q(&Spot::Start, &Pick::Right, 1.0, 0.5).unwrap();
        tables.update_q(&Spot::Start, &Pick::Left, -1.0, 1.0).unwrap();
        assert_eq!(tables.q_value(&Spot::Start, &Pick::Right), Some(0.5));
        assert_eq!(tables.max_q(&Spot::Start).unwrap(), 0.5);
    }

    #[test]
    fn test_max_q_ignores_unlisted_reinit() {
        let mut tables = create_test_tables();
        tables.update_q(&Spot::Start, &Pick::Reinit, 10.0, 1.0).unwrap();
        assert_eq!(tables.max_q(&Spot::Start).unwrap(), 0.0);
    }

    #[test]
    fn test_unknown_entries_fail() {
        let mut tables = create_test_tables();
        assert!(matches!(
            tables.max_q(&Spot::Nowhere),
            Err(SsbqError::UnrecognizedState(_))
        ));
        assert!(matches!(
            tables.update_q(&Spot::Low, &Pick::Left, 1.0, 1.0),
            Err(SsbqError::IllegalAction { .. })
        ));
        assert!(tables.record_experience(&Spot::Nowhere, &Pick::Left).is_err());
        assert_eq!(tables.q_value(&Spot::Nowhere, &Pick::Left), None);
    }

    #[test]
    fn test_record_experience_counts() {
        let mut tables = create_test_tables();
        assert_eq!(tables.record_experience(&Spot::Start, &Pick::Left).unwrap(), 1);
        assert_eq!(tables.record_experience(&Spot::Start, &Pick::Left).unwrap(), 2);
        assert_eq!(tables.record_experience(&Spot::Start, &Pick::Right).unwrap(), 1);
        assert_eq!(tables.visit_count(&Spot::Start), 3);
        assert_eq!(tables.experience_count(&Spot::Start, &Pick::Left), 2);
    }

    #[test]
    fn test_played_policy() {
        let mut tables = create_test_tables();
        for _ in 0..3 {
            tables.record_experience(&Spot::Start, &Pick::Left).unwrap();
        }
        tables.record_experience(&Spot::Start, &Pick::Right).unwrap();

        let policy = tables.played_policy();
        assert_eq!(policy.len(), 1);
        assert_eq!(policy[0].visits, 4);
        assert_eq!(
            policy[0].actions,
            vec![("Left".to_string(), 0.75), ("Right".to_string(), 0.25)]
        );
    }

    #[test]
    fn test_quantile_level() {
        let mut tables = create_test_tables();
        let low = tables.outcome_levels()[0].clone();
        tables.update_real(&low, 1.0).unwrap();
        // All mass on the lowest level
        assert_eq!(tables.quantile_level(0.5), Some(&low));

        let mid = tables.outcome_levels()[1].clone();
        tables.update_real(&mid, 0.8).unwrap();
        // low 0.2, mid 0.8: above low remains 0.8, above mid remains 0
        assert_eq!(tables.quantile_level(0.5), Some(&mid));
        assert_eq!(tables.quantile_level(0.9), Some(&low));
    }
}
