//! The finite MDP contract consumed by the learners
//!
//! An [`Environment`] describes states, actions, ordered outcome levels and
//! the stochastic transition function. The per-episode bookkeeping that a
//! run mutates (decision counter, accumulated operational cost) lives in
//! a separate [`EpisodeContext`] owned by whoever drives the run.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SsbqError};
use crate::types::{OutcomeLevel, Transition, PROBABILITY_TOLERANCE};

/// How the end of an episode is turned into a score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scoring {
    /// Episodes end in terminal states and are scored by outcome rank
    Outcome,

    /// Episodes run to the horizon; the score is `budget` minus the
    /// operational cost accumulated over the episode
    CostBudget { budget: f64 },
}

/// Finite Markov decision process
pub trait Environment: Send + Sync {
    type State: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    type Action: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Human readable problem name
    fn name(&self) -> &str;

    fn states(&self) -> &[Self::State];

    fn actions(&self) -> &[Self::Action];

    /// Outcome levels, least preferred first
    fn outcome_levels(&self) -> &[OutcomeLevel];

    /// Actions available in `state`; never empty for a known state
    fn legal_actions(&self, state: &Self::State) -> Result<Vec<Self::Action>>;

    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Outcome level reached in a terminal state
    fn outcome_of(&self, state: &Self::State) -> Result<OutcomeLevel>;

    /// Distribution over successors of `state` under `action`
    fn transition(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Result<Transition<Self::State>>;

    fn initial_state(&self) -> &Self::State;

    /// Deterministic action leading back to the initial state from anywhere
    fn reinit_action(&self) -> Self::Action;

    /// Number of decisions after which an episode is forcibly reset.
    /// `None` when every episode ends in a terminal state on its own.
    fn horizon(&self) -> Option<usize> {
        None
    }

    fn scoring(&self) -> Scoring {
        Scoring::Outcome
    }

    /// Operational cost charged for moving from `state` to `next_state`
    fn step_cost(&self, _state: &Self::State, _next_state: &Self::State) -> Result<f64> {
        Ok(0.0)
    }

    /// Cost charged for the state in which a horizon-bounded episode ends
    fn closing_cost(&self, _state: &Self::State) -> Result<f64> {
        Ok(0.0)
    }

    /// Rank (index in [`Environment::outcome_levels`]) of a terminal state
    fn outcome_rank(&self, state: &Self::State) -> Result<usize> {
        let level = self.outcome_of(state)?;
        self.outcome_levels()
            .iter()
            .position(|l| *l == level)
            .ok_or_else(|| {
                SsbqError::UnrecognizedState(format!(
                    "{state:?} maps to undeclared outcome level {level}"
                ))
            })
    }

    fn is_reinit(&self, action: &Self::Action) -> bool {
        *action == self.reinit_action()
    }

    /// Sample a successor. Taking the reinit action restarts the episode
    /// counter in `ctx`.
    fn draw_next_state(
        &self,
        state: &Self::State,
        action: &Self::Action,
        ctx: &mut EpisodeContext,
        rng: &mut dyn RngCore,
    ) -> Result<Self::State> {
        if self.is_reinit(action) {
            ctx.restart();
        }
        let transition = self.transition(state, action)?;
        transition.sample(rng).cloned().ok_or_else(|| {
            SsbqError::InvalidTransition(format!("no successor for {action:?} in {state:?}"))
        })
    }
}

/// Per-episode bookkeeping shared by an environment and the learner driving it.
///
/// Exactly one learner drives a given context; independent runs each own
/// their own.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeContext {
    counter: usize,
    horizon: Option<usize>,
    cumulated_cost: f64,
}

impl EpisodeContext {
    pub fn new(horizon: Option<usize>) -> Result<Self> {
        if horizon == Some(0) {
            return Err(SsbqError::Config("horizon must be positive".to_string()));
        }
        Ok(Self {
            counter: 0,
            horizon,
            cumulated_cost: 0.0,
        })
    }

    pub fn for_environment<E: Environment + ?Sized>(env: &E) -> Result<Self> {
        Self::new(env.horizon())
    }

    /// Decisions taken since the last reinit
    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn horizon(&self) -> Option<usize> {
        self.horizon
    }

    pub fn cumulated_cost(&self) -> f64 {
        self.cumulated_cost
    }

    /// Register a new decision.
    ///
    /// Returns `true` when the horizon is exhausted: the caller must take
    /// the reinit action, and the cost accumulator has been cleared.
    pub fn begin_decision(&mut self) -> bool {
        if self.at_horizon() {
            self.cumulated_cost = 0.0;
            return true;
        }
        self.counter += 1;
        false
    }

    /// Whether the last decision used up the horizon
    pub fn at_horizon(&self) -> bool {
        self.horizon.is_some_and(|h| self.counter >= h)
    }

    pub fn restart(&mut self) {
        self.counter = 0;
    }

    pub fn add_cost(&mut self, cost: f64) {
        self.cumulated_cost += cost;
    }
}

/// Check the structural invariants of an environment.
///
/// Every state must have legal actions, every legal transition must be a
/// probability distribution over declared states, terminal states must map
/// to declared outcome levels and reinit must lead to the initial state.
pub fn validate_environment<E: Environment + ?Sized>(env: &E) -> Result<()> {
    let known: HashSet<&E::State> = env.states().iter().collect();
    if !known.contains(env.initial_state()) {
        return Err(SsbqError::unrecognized_state(env.initial_state()));
    }
    if env.outcome_levels().is_empty() {
        return Err(SsbqError::Config(format!("{} declares no outcome levels", env.name())));
    }
    EpisodeContext::for_environment(env)?;

    let reinit = env.reinit_action();
    for state in env.states() {
        let legal = env.legal_actions(state)?;
        if legal.is_empty() {
            return Err(SsbqError::InvalidTransition(format!(
                "no legal action in {state:?}"
            )));
        }
        for action in &legal {
            check_transition(env, &known, state, action)?;
        }

        let back = env.transition(state, &reinit)?;
        if back.len() != 1 || back.probability(env.initial_state()) != 1.0 {
            return Err(SsbqError::InvalidTransition(format!(
                "reinit from {state:?} does not lead to the initial state"
            )));
        }

        if env.is_terminal(state) {
            env.outcome_rank(state)?;
        }
    }

    debug!(
        "Validated environment {} ({} states, {} outcome levels)",
        env.name(),
        env.states().len(),
        env.outcome_levels().len()
    );
    Ok(())
}

fn check_transition<E: Environment + ?Sized>(
    env: &E,
    known: &HashSet<&E::State>,
    state: &E::State,
    action: &E::Action,
) -> Result<()> {
    let transition = env.transition(state, action)?;
    let mass = transition.total_mass();
    if (mass - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(SsbqError::InvalidTransition(format!(
            "{action:?} in {state:?} has total mass {mass}"
        )));
    }
    for (next, probability) in transition.iter() {
        if !known.contains(next) {
            return Err(SsbqError::unrecognized_state(next));
        }
        if probability < 0.0 {
            return Err(SsbqError::InvalidTransition(format!(
                "negative probability {probability} for {next:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Coin flip: from `Start`, `Flip` lands on `Heads` or `Tails`
    struct Coin {
        states: Vec<Side>,
        actions: Vec<Move>,
        levels: Vec<OutcomeLevel>,
        heads_mass: f64,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Side {
        Start,
        Heads,
        Tails,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Move {
        Flip,
        Reinit,
    }

    impl Coin {
        fn new(heads_mass: f64) -> Self {
            Self {
                states: vec![Side::Start, Side::Heads, Side::Tails],
                actions: vec![Move::Reinit, Move::Flip],
                levels: vec!["lose".into(), "win".into()],
                heads_mass,
            }
        }
    }

    impl Environment for Coin {
        type State = Side;
        type Action = Move;

        fn name(&self) -> &str {
            "coin"
        }
        fn states(&self) -> &[Side] {
            &self.states
        }
        fn actions(&self) -> &[Move] {
            &self.actions
        }
        fn outcome_levels(&self) -> &[OutcomeLevel] {
            &self.levels
        }
        fn legal_actions(&self, state: &Side) -> Result<Vec<Move>> {
            Ok(match state {
                Side::Start => vec![Move::Flip],
                _ => vec![Move::Reinit],
            })
        }
        fn is_terminal(&self, state: &Side) -> bool {
            *state != Side::Start
        }
        fn outcome_of(&self, state: &Side) -> Result<OutcomeLevel> {
            match state {
                Side::Heads => Ok("win".into()),
                Side::Tails => Ok("lose".into()),
                Side::Start => Err(SsbqError::unrecognized_state(state)),
            }
        }
        fn transition(&self, state: &Side, action: &Move) -> Result<Transition<Side>> {
            match (state, action) {
                (_, Move::Reinit) => Ok(Transition::certain(Side::Start)),
                (Side::Start, Move::Flip) => Ok(Transition::new(vec![
                    (Side::Heads, self.heads_mass),
                    (Side::Tails, 0.5),
                ])),
                _ => Err(SsbqError::illegal_action(state, action)),
            }
        }
        fn initial_state(&self) -> &Side {
            &Side::Start
        }
        fn reinit_action(&self) -> Move {
            Move::Reinit
        }
        fn horizon(&self) -> Option<usize> {
            Some(3)
        }
    }

    #[test]
    fn test_outcome_rank_follows_declared_order() {
        let coin = Coin::new(0.5);
        assert_eq!(coin.outcome_rank(&Side::Tails).unwrap(), 0);
        assert_eq!(coin.outcome_rank(&Side::Heads).unwrap(), 1);
        assert!(coin.outcome_rank(&Side::Start).is_err());
    }

    #[test]
    fn test_validate_accepts_proper_environment() {
        assert!(validate_environment(&Coin::new(0.5)).is_ok());
    }

    #[test]
    fn test_validate_rejects_leaky_transition() {
        let err = validate_environment(&Coin::new(0.4)).unwrap_err();
        assert!(matches!(err, SsbqError::InvalidTransition(_)));
    }

    #[test]
    fn test_draw_next_state_restarts_counter_on_reinit() {
        let coin = Coin::new(0.5);
        let mut ctx = EpisodeContext::for_environment(&coin).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        assert!(!ctx.begin_decision());
        let next = coin
            .draw_next_state(&Side::Start, &Move::Flip, &mut ctx, &mut rng)
            .unwrap();
        assert!(coin.is_terminal(&next));
        assert_eq!(ctx.counter(), 1);

        let back = coin
            .draw_next_state(&next, &Move::Reinit, &mut ctx, &mut rng)
            .unwrap();
        assert_eq!(back, Side::Start);
        assert_eq!(ctx.counter(), 0);
    }

    #[test]
    fn test_context_forces_reset_at_horizon() {
        let mut ctx = EpisodeContext::new(Some(2)).unwrap();
        assert!(!ctx.begin_decision());
        ctx.add_cost(4.0);
        assert!(!ctx.at_horizon());
        assert!(!ctx.begin_decision());
        ctx.add_cost(1.5);
        assert!(ctx.at_horizon());
        assert_eq!(ctx.cumulated_cost(), 5.5);

        assert!(ctx.begin_decision());
        assert_eq!(ctx.cumulated_cost(), 0.0);
        assert_eq!(ctx.counter(), 2);

        ctx.restart();
        assert!(!ctx.at_horizon());
    }

    #[test]
    fn test_context_without_horizon_never_forces_reset() {
        let mut ctx = EpisodeContext::new(None).unwrap();
        for _ in 0..1000 {
            assert!(!ctx.begin_decision());
        }
        assert_eq!(ctx.counter(), 1000);
    }

    #[test]
    fn test_zero_horizon_is_rejected() {
        assert!(matches!(EpisodeContext::new(Some(0)), Err(SsbqError::Config(_))));
    }
}
