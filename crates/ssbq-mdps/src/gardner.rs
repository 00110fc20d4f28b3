//! Gardner's non-transitive dice
//!
//! Three dice with faces chosen so that A beats B, B beats C and C beats A
//! more often than not:
//!
//! | Die | Faces                  |
//! |-----|------------------------|
//! | A   | 1 (1/6), 4 (5/6)       |
//! | B   | 3 (5/6), 6 (1/6)       |
//! | C   | 2 (1/2), 5 (1/2)       |
//!
//! The rolled face is the outcome level (`w1` .. `w6`). The sequential
//! variant first decides whether to throw A, and only then chooses
//! between B and C.

use std::fmt;

use ssbq_core::{Environment, OutcomeLevel, Result, SsbqError, Transition};

use crate::{ordinal_preference, rank_of};

/// Mixed equilibrium over the rolled faces shared by both variants
const EQUILIBRIUM: [f64; 6] = [
    1.0 / 26.0,
    7.0 / 26.0,
    5.0 / 26.0,
    5.0 / 26.0,
    7.0 / 26.0,
    1.0 / 26.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Die {
    A,
    B,
    C,
}

impl Die {
    /// Face distribution of the die
    pub fn faces(self) -> [(u8, f64); 2] {
        match self {
            Die::A => [(1, 1.0 / 6.0), (4, 5.0 / 6.0)],
            Die::B => [(3, 5.0 / 6.0), (6, 1.0 / 6.0)],
            Die::C => [(2, 0.5), (5, 0.5)],
        }
    }

    fn throw(self) -> Transition<DiceState> {
        Transition::new(
            self.faces()
                .iter()
                .map(|(face, p)| (DiceState::Rolled(*face), *p))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiceState {
    Start,
    /// Sequential variant only: A was declined
    ChooseBC,
    Rolled(u8),
}

impl fmt::Display for DiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiceState::Start => write!(f, "start"),
            DiceState::ChooseBC => write!(f, "choose-bc"),
            DiceState::Rolled(face) => write!(f, "rolled-{face}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiceMove {
    Throw(Die),
    /// Decline die A (sequential variant)
    PassA,
    Reinit,
}

fn face_levels() -> Vec<OutcomeLevel> {
    (1..=6).map(|i| OutcomeLevel::new(format!("w{i}"))).collect()
}

fn rolled_states() -> impl Iterator<Item = DiceState> {
    (1..=6).map(DiceState::Rolled)
}

fn face_outcome(state: &DiceState) -> Result<OutcomeLevel> {
    match state {
        DiceState::Rolled(face @ 1..=6) => Ok(OutcomeLevel::new(format!("w{face}"))),
        _ => Err(SsbqError::unrecognized_state(state)),
    }
}

fn labelled(levels: &[OutcomeLevel]) -> Vec<(OutcomeLevel, f64)> {
    levels.iter().cloned().zip(EQUILIBRIUM).collect()
}

/// One-shot dice game: pick a die in the start state, roll it, done
#[derive(Debug, Clone)]
pub struct GardnerDice {
    states: Vec<DiceState>,
    actions: Vec<DiceMove>,
    levels: Vec<OutcomeLevel>,
}

impl Default for GardnerDice {
    fn default() -> Self {
        Self::new()
    }
}

impl GardnerDice {
    pub fn new() -> Self {
        Self {
            states: std::iter::once(DiceState::Start)
                .chain(rolled_states())
                .collect(),
            actions: vec![
                DiceMove::Reinit,
                DiceMove::Throw(Die::A),
                DiceMove::Throw(Die::B),
                DiceMove::Throw(Die::C),
            ],
            levels: face_levels(),
        }
    }

    /// SSB preference of one face over another: the higher face wins
    pub fn preference(&self, level: &OutcomeLevel, other: &OutcomeLevel) -> Result<f64> {
        Ok(ordinal_preference(
            rank_of(&self.levels, level)?,
            rank_of(&self.levels, other)?,
        ))
    }

    pub fn equilibrium(&self) -> Vec<(OutcomeLevel, f64)> {
        labelled(&self.levels)
    }
}

impl Environment for GardnerDice {
    type State = DiceState;
    type Action = DiceMove;

    fn name(&self) -> &str {
        "gardner"
    }

    fn states(&self) -> &[DiceState] {
        &self.states
    }

    fn actions(&self) -> &[DiceMove] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &DiceState) -> Result<Vec<DiceMove>> {
        match state {
            DiceState::Start => Ok(vec![
                DiceMove::Throw(Die::A),
                DiceMove::Throw(Die::B),
                DiceMove::Throw(Die::C),
            ]),
            DiceState::Rolled(_) => Ok(vec![DiceMove::Reinit]),
            DiceState::ChooseBC => Err(SsbqError::unrecognized_state(state)),
        }
    }

    fn is_terminal(&self, state: &DiceState) -> bool {
        matches!(state, DiceState::Rolled(_))
    }

    fn outcome_of(&self, state: &DiceState) -> Result<OutcomeLevel> {
        face_outcome(state)
    }

    fn transition(&self, state: &DiceState, action: &DiceMove) -> Result<Transition<DiceState>> {
        match (state, action) {
            (DiceState::Start | DiceState::Rolled(_), DiceMove::Reinit) => {
                Ok(Transition::certain(DiceState::Start))
            }
            (DiceState::Start, DiceMove::Throw(die)) => Ok(die.throw()),
            _ => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &DiceState {
        &DiceState::Start
    }

    fn reinit_action(&self) -> DiceMove {
        DiceMove::Reinit
    }
}

/// Two-stage dice game: throw A or pass, then choose between B and C
#[derive(Debug, Clone)]
pub struct SequentialGardnerDice {
    states: Vec<DiceState>,
    actions: Vec<DiceMove>,
    levels: Vec<OutcomeLevel>,
}

impl Default for SequentialGardnerDice {
    fn default() -> Self {
        Self::new()
    }
}

impl SequentialGardnerDice {
    pub fn new() -> Self {
        Self {
            states: [DiceState::Start, DiceState::ChooseBC]
                .into_iter()
                .chain(rolled_states())
                .collect(),
            actions: vec![
                DiceMove::Reinit,
                DiceMove::Throw(Die::A),
                DiceMove::PassA,
                DiceMove::Throw(Die::B),
                DiceMove::Throw(Die::C),
            ],
            levels: face_levels(),
        }
    }

    pub fn preference(&self, level: &OutcomeLevel, other: &OutcomeLevel) -> Result<f64> {
        Ok(ordinal_preference(
            rank_of(&self.levels, level)?,
            rank_of(&self.levels, other)?,
        ))
    }

    pub fn equilibrium(&self) -> Vec<(OutcomeLevel, f64)> {
        labelled(&self.levels)
    }
}

impl Environment for SequentialGardnerDice {
    type State = DiceState;
    type Action = DiceMove;

    fn name(&self) -> &str {
        "sequential-gardner"
    }

    fn states(&self) -> &[DiceState] {
        &self.states
    }

    fn actions(&self) -> &[DiceMove] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &DiceState) -> Result<Vec<DiceMove>> {
        Ok(match state {
            DiceState::Start => vec![DiceMove::Throw(Die::A), DiceMove::PassA],
            DiceState::ChooseBC => vec![DiceMove::Throw(Die::B), DiceMove::Throw(Die::C)],
            DiceState::Rolled(_) => vec![DiceMove::Reinit],
        })
    }

    fn is_terminal(&self, state: &DiceState) -> bool {
        matches!(state, DiceState::Rolled(_))
    }

    fn outcome_of(&self, state: &DiceState) -> Result<OutcomeLevel> {
        face_outcome(state)
    }

    fn transition(&self, state: &DiceState, action: &DiceMove) -> Result<Transition<DiceState>> {
        match (state, action) {
            (_, DiceMove::Reinit) => Ok(Transition::certain(DiceState::Start)),
            (DiceState::Start, DiceMove::Throw(Die::A)) => Ok(Die::A.throw()),
            (DiceState::Start, DiceMove::PassA) => Ok(Transition::certain(DiceState::ChooseBC)),
            (DiceState::ChooseBC, DiceMove::Throw(die @ (Die::B | Die::C))) => Ok(die.throw()),
            _ => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &DiceState {
        &DiceState::Start
    }

    fn reinit_action(&self) -> DiceMove {
        DiceMove::Reinit
    }
}
