//! "Who wants to be a millionaire" trivia game
//!
//! Fifteen questions of increasing difficulty. Before each question the
//! player either stops and keeps the winnings of the questions answered so
//! far, or plays, possibly spending some of three lifelines to lower the
//! chance of a wrong answer. A wrong answer falls back to the last
//! checkpoint (questions 5 and 10). There are 16 wealth levels, one per
//! number of correct answers.

use std::fmt;

use ssbq_core::{Environment, OutcomeLevel, Result, SsbqError, Transition};

use crate::{ordinal_preference, rank_of};

pub const QUESTIONS: u8 = 15;
const CHECKPOINTS: [u8; 2] = [5, 10];

const WINNINGS: [u32; 16] = [
    0, 150, 300, 450, 900, 1800, 2100, 2700, 3600, 4500, 9000, 18000, 36000, 72000, 144000,
    330000,
];

/// Multiplier applied to the failure probability of question `t` when
/// lifeline `i` is used on it
const LIFELINE_FACTORS: [[f64; 3]; QUESTIONS as usize] = [
    [0.0, 0.0, 0.0],
    [0.672, 0.527, 0.745],
    [0.698, 0.547, 0.773],
    [0.707, 0.554, 0.783],
    [0.711, 0.557, 0.788],
    [0.714, 0.559, 0.791],
    [0.716, 0.561, 0.793],
    [0.717, 0.562, 0.795],
    [0.718, 0.563, 0.796],
    [0.719, 0.563, 0.796],
    [0.719, 0.564, 0.797],
    [0.720, 0.564, 0.798],
    [0.720, 0.564, 0.798],
    [0.721, 0.565, 0.799],
    [0.721, 0.565, 0.799],
];

/// Non-zero mass of the mixed equilibrium, by winnings
const EQUILIBRIUM: [(u32, f64); 4] = [
    (0, 0.328_736_26),
    (1800, 0.363_791_74),
    (2700, 0.213_134_47),
    (3600, 0.094_337_53),
];

/// Probability of answering question `t` wrong without lifelines
fn failure(question: u8) -> f64 {
    0.004 + 0.051 * f64::from(question)
}

/// A set of lifelines, as flags for lifelines 1, 2 and 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lifelines(pub [bool; 3]);

impl Lifelines {
    pub const ALL: Lifelines = Lifelines([true; 3]);
    pub const NONE: Lifelines = Lifelines([false; 3]);

    /// Every set, smallest first
    pub const SUBSETS: [Lifelines; 8] = [
        Lifelines([false, false, false]),
        Lifelines([true, false, false]),
        Lifelines([false, true, false]),
        Lifelines([false, false, true]),
        Lifelines([true, true, false]),
        Lifelines([true, false, true]),
        Lifelines([false, true, true]),
        Lifelines([true, true, true]),
    ];

    pub fn is_subset_of(&self, other: &Lifelines) -> bool {
        self.0.iter().zip(other.0).all(|(mine, theirs)| !*mine || theirs)
    }

    pub fn without(&self, used: &Lifelines) -> Lifelines {
        let mut left = self.0;
        for (flag, spent) in left.iter_mut().zip(used.0) {
            *flag &= !spent;
        }
        Lifelines(left)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|f| **f).count()
    }
}

impl fmt::Display for Lifelines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in self.0 {
            write!(f, "{}", u8::from(flag))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizState {
    /// Wrong answer; the winnings of the given checkpoint are kept
    Lost(u8),
    /// Stopped after answering the given number of questions
    Stopped(u8),
    Playing { lifelines: Lifelines, question: u8 },
    AnsweredAll,
}

impl QuizState {
    pub const START: QuizState = QuizState::Playing {
        lifelines: Lifelines::ALL,
        question: 0,
    };
}

impl fmt::Display for QuizState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizState::Lost(checkpoint) => write!(f, "lost{checkpoint}"),
            QuizState::Stopped(question) => write!(f, "stop{question}"),
            QuizState::Playing {
                lifelines,
                question,
            } => write!(f, "play_{lifelines}_{question}"),
            QuizState::AnsweredAll => write!(f, "answered_all"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuizMove {
    Stop,
    /// Answer the current question using the given lifelines
    Play(Lifelines),
    Reinit,
}

#[derive(Debug, Clone)]
pub struct Millionaire {
    states: Vec<QuizState>,
    actions: Vec<QuizMove>,
    levels: Vec<OutcomeLevel>,
}

impl Default for Millionaire {
    fn default() -> Self {
        Self::new()
    }
}

impl Millionaire {
    pub fn new() -> Self {
        let lost = [0u8]
            .into_iter()
            .chain(CHECKPOINTS)
            .map(QuizState::Lost);
        let stopped = (0..QUESTIONS).map(QuizState::Stopped);
        let playing = Lifelines::SUBSETS.into_iter().rev().flat_map(|lifelines| {
            (0..QUESTIONS).map(move |question| QuizState::Playing {
                lifelines,
                question,
            })
        });
        let states = lost
            .chain(stopped)
            .chain(playing)
            .chain(std::iter::once(QuizState::AnsweredAll))
            .collect();

        let actions = [QuizMove::Reinit, QuizMove::Stop]
            .into_iter()
            .chain(Lifelines::SUBSETS.into_iter().map(QuizMove::Play))
            .collect();

        Self {
            states,
            actions,
            levels: WINNINGS
                .iter()
                .map(|w| OutcomeLevel::new(format!("w{w}")))
                .collect(),
        }
    }

    pub fn preference(&self, level: &OutcomeLevel, other: &OutcomeLevel) -> Result<f64> {
        Ok(ordinal_preference(
            rank_of(&self.levels, level)?,
            rank_of(&self.levels, other)?,
        ))
    }

    /// Known mixed equilibrium over all 16 wealth levels
    pub fn equilibrium(&self) -> Vec<(OutcomeLevel, f64)> {
        WINNINGS
            .iter()
            .zip(&self.levels)
            .map(|(w, level)| {
                let p = EQUILIBRIUM
                    .iter()
                    .find(|(winnings, _)| winnings == w)
                    .map_or(0.0, |(_, p)| *p);
                (level.clone(), p)
            })
            .collect()
    }

    fn last_checkpoint(question: u8) -> u8 {
        CHECKPOINTS
            .iter()
            .rev()
            .find(|c| question >= **c)
            .copied()
            .unwrap_or(0)
    }

    fn answer(
        &self,
        state: &QuizState,
        lifelines: Lifelines,
        question: u8,
        used: Lifelines,
    ) -> Result<Transition<QuizState>> {
        if !used.is_subset_of(&lifelines) || question >= QUESTIONS {
            return Err(SsbqError::illegal_action(state, &QuizMove::Play(used)));
        }
        let factors = &LIFELINE_FACTORS[usize::from(question)];
        let reduction: f64 = used
            .0
            .iter()
            .zip(factors)
            .filter(|(spent, _)| **spent)
            .map(|(_, factor)| factor)
            .product();
        let wrong = reduction * failure(question);

        let success = if question + 1 == QUESTIONS {
            QuizState::AnsweredAll
        } else {
            QuizState::Playing {
                lifelines: lifelines.without(&used),
                question: question + 1,
            }
        };
        Ok(Transition::new(
            [
                (QuizState::Lost(Self::last_checkpoint(question)), wrong),
                (success, 1.0 - wrong),
            ]
            .into_iter()
            .filter(|(_, p)| *p > 0.0)
            .collect(),
        ))
    }
}

impl Environment for Millionaire {
    type State = QuizState;
    type Action = QuizMove;

    fn name(&self) -> &str {
        "million"
    }

    fn states(&self) -> &[QuizState] {
        &self.states
    }

    fn actions(&self) -> &[QuizMove] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &QuizState) -> Result<Vec<QuizMove>> {
        match state {
            QuizState::Playing { lifelines, .. } => Ok(std::iter::once(QuizMove::Stop)
                .chain(
                    Lifelines::SUBSETS
                        .into_iter()
                        .filter(|used| used.is_subset_of(lifelines))
                        .map(QuizMove::Play),
                )
                .collect()),
            _ => Ok(vec![QuizMove::Reinit]),
        }
    }

    fn is_terminal(&self, state: &QuizState) -> bool {
        !matches!(state, QuizState::Playing { .. })
    }

    fn outcome_of(&self, state: &QuizState) -> Result<OutcomeLevel> {
        let rank = match state {
            QuizState::Lost(question) | QuizState::Stopped(question) => usize::from(*question),
            QuizState::AnsweredAll => usize::from(QUESTIONS),
            QuizState::Playing { .. } => return Err(SsbqError::unrecognized_state(state)),
        };
        self.levels
            .get(rank)
            .cloned()
            .ok_or_else(|| SsbqError::unrecognized_state(state))
    }

    fn transition(&self, state: &QuizState, action: &QuizMove) -> Result<Transition<QuizState>> {
        match (*state, *action) {
            (_, QuizMove::Reinit) => Ok(Transition::certain(QuizState::START)),
            (QuizState::Playing { question, .. }, QuizMove::Stop) => {
                Ok(Transition::certain(QuizState::Stopped(question)))
            }
            (
                QuizState::Playing {
                    lifelines,
                    question,
                },
                QuizMove::Play(used),
            ) => self.answer(state, lifelines, question, used),
            _ => Err(SsbqError::illegal_action(state, action)),
        }
    }

    fn initial_state(&self) -> &QuizState {
        &QuizState::START
    }

    fn reinit_action(&self) -> QuizMove {
        QuizMove::Reinit
    }
}
