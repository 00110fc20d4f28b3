//! Small environments shared by the unit tests

use ssbq_core::{Environment, OutcomeLevel, Result, Scoring, SsbqError, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spot {
    Start,
    Low,
    Mid,
    /// Never declared as a state
    Nowhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pick {
    Left,
    Right,
    Reinit,
}

/// One decision between two lotteries over the two lower of three
/// outcome levels: `left` reaches `mid` with 0.2, `right` with 0.8.
pub struct ChoiceEnv {
    states: Vec<Spot>,
    actions: Vec<Pick>,
    levels: Vec<OutcomeLevel>,
}

impl ChoiceEnv {
    pub fn new() -> Self {
        Self {
            states: vec![Spot::Start, Spot::Low, Spot::Mid],
            actions: vec![Pick::Left, Pick::Right, Pick::Reinit],
            levels: vec!["low".into(), "mid".into(), "high".into()],
        }
    }
}

impl Environment for ChoiceEnv {
    type State = Spot;
    type Action = Pick;

    fn name(&self) -> &str {
        "choice"
    }

    fn states(&self) -> &[Spot] {
        &self.states
    }

    fn actions(&self) -> &[Pick] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &Spot) -> Result<Vec<Pick>> {
        match state {
            Spot::Start => Ok(vec![Pick::Left, Pick::Right]),
            Spot::Low | Spot::Mid => Ok(vec![Pick::Reinit]),
            Spot::Nowhere => Err(SsbqError::unrecognized_state(state)),
        }
    }

    fn is_terminal(&self, state: &Spot) -> bool {
        matches!(state, Spot::Low | Spot::Mid)
    }

    fn outcome_of(&self, state: &Spot) -> Result<OutcomeLevel> {
        match state {
            Spot::Low => Ok("low".into()),
            Spot::Mid => Ok("mid".into()),
            _ => Err(SsbqError::unrecognized_state(state)),
        }
    }

    fn transition(&self, state: &Spot, action: &Pick) -> Result<Transition<Spot>> {
        match (state, action) {
            (Spot::Nowhere, _) => Err(SsbqError::unrecognized_state(state)),
            (_, Pick::Reinit) => Ok(Transition::certain(Spot::Start)),
            (Spot::Start, Pick::Left) => {
                Ok(Transition::new(vec![(Spot::Low, 0.8), (Spot::Mid, 0.2)]))
            }
            (Spot::Start, Pick::Right) => {
                Ok(Transition::new(vec![(Spot::Low, 0.2), (Spot::Mid, 0.8)]))
            }
            _ => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &Spot {
        &Spot::Start
    }

    fn reinit_action(&self) -> Pick {
        Pick::Reinit
    }
}

/// Cost-budget environment: a meter that either idles (cost 1 per step)
/// or runs (cost 3 per step), with a horizon of two decisions and a
/// closing cost of 10 when the episode ends running.
pub struct MeterEnv {
    states: Vec<bool>,
    actions: Vec<Pick>,
    levels: Vec<OutcomeLevel>,
}

impl MeterEnv {
    pub const BUDGET: f64 = 20.0;

    pub fn new() -> Self {
        Self {
            states: vec![false, true],
            actions: vec![Pick::Left, Pick::Right, Pick::Reinit],
            levels: vec!["score".into()],
        }
    }
}

impl Environment for MeterEnv {
    type State = bool;
    type Action = Pick;

    fn name(&self) -> &str {
        "meter"
    }

    fn states(&self) -> &[bool] {
        &self.states
    }

    fn actions(&self) -> &[Pick] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, _state: &bool) -> Result<Vec<Pick>> {
        Ok(vec![Pick::Left, Pick::Right])
    }

    fn is_terminal(&self, _state: &bool) -> bool {
        false
    }

    fn outcome_of(&self, state: &bool) -> Result<OutcomeLevel> {
        Err(SsbqError::unrecognized_state(state))
    }

    fn transition(&self, _state: &bool, action: &Pick) -> Result<Transition<bool>> {
        Ok(Transition::certain(match action {
            Pick::Left | Pick::Reinit => false,
            Pick::Right => true,
        }))
    }

    fn initial_state(&self) -> &bool {
        &false
    }

    fn reinit_action(&self) -> Pick {
        Pick::Reinit
    }

    fn horizon(&self) -> Option<usize> {
        Some(2)
    }

    fn scoring(&self) -> Scoring {
        Scoring::CostBudget {
            budget: Self::BUDGET,
        }
    }

    fn step_cost(&self, _state: &bool, next_state: &bool) -> Result<f64> {
        Ok(if *next_state { 3.0 } else { 1.0 })
    }

    fn closing_cost(&self, state: &bool) -> Result<f64> {
        Ok(if *state { 10.0 } else { 0.0 })
    }
}
