//! 3x3 grid with cyclic preferences
//!
//! The agent starts in the corner `(0, 0)` and drifts towards the three
//! other corners, each of which ends the episode with its own outcome:
//! `(2, 0)` gives `w1`, `(2, 2)` gives `w2`, `(0, 2)` gives `w3`. Each move
//! goes the intended way with probability 0.8. Along the far edges the
//! agent either stays put or slides into `(2, 2)`.
//!
//! Preferences are cyclic (`w2` over `w1`, `w3` over `w2`, `w1` over `w3`),
//! so the only SSB-optimal behaviour mixes all three corners equally.

use std::fmt;

use ssbq_core::{Environment, OutcomeLevel, Result, SsbqError, Transition};

use crate::rank_of;

const SIZE: u8 = 3;
const LAST: u8 = SIZE - 1;
const START: Cell = Cell { row: 0, col: 0 };
const CENTRE_CORNER: Cell = Cell { row: LAST, col: LAST };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: u8,
    pub col: u8,
}

impl Cell {
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    fn down(self) -> Self {
        Self::new(self.row + 1, self.col)
    }

    fn right(self) -> Self {
        Self::new(self.row, self.col + 1)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}{}", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridMove {
    /// Mostly increases the row
    Left,
    /// Mostly increases the column
    Up,
    Reinit,
}

#[derive(Debug, Clone)]
pub struct Grid {
    states: Vec<Cell>,
    actions: Vec<GridMove>,
    levels: Vec<OutcomeLevel>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            states: (0..SIZE)
                .flat_map(|row| (0..SIZE).map(move |col| Cell::new(row, col)))
                .collect(),
            actions: vec![GridMove::Reinit, GridMove::Left, GridMove::Up],
            levels: vec!["w1".into(), "w2".into(), "w3".into()],
        }
    }

    /// Cyclic SSB preference: a level beats the one just below it and
    /// loses to the one two steps below
    pub fn preference(&self, level: &OutcomeLevel, other: &OutcomeLevel) -> Result<f64> {
        let a = rank_of(&self.levels, level)?;
        let b = rank_of(&self.levels, other)?;
        let sign = if a >= b { 1.0 } else { -1.0 };
        Ok(match a.abs_diff(b) {
            1 => sign * 10.0,
            2 => -sign * 10.0,
            _ => 0.0,
        })
    }

    pub fn equilibrium(&self) -> Vec<(OutcomeLevel, f64)> {
        self.levels.iter().map(|l| (l.clone(), 1.0 / 3.0)).collect()
    }

    fn contains(&self, cell: &Cell) -> bool {
        cell.row < SIZE && cell.col < SIZE
    }

    /// `main` is taken with 0.8, `side` with 0.2 away from the far edges
    fn drift(cell: Cell, action: GridMove) -> Transition<Cell> {
        let (on_main_edge, on_side_edge, main, side) = match action {
            GridMove::Left => (cell.row == LAST, cell.col == LAST, cell.down(), cell.right()),
            _ => (cell.col == LAST, cell.row == LAST, cell.right(), cell.down()),
        };
        if on_main_edge {
            Transition::new(vec![(cell, 0.8), (CENTRE_CORNER, 0.2)])
        } else if on_side_edge {
            Transition::new(vec![(cell, 0.2), (CENTRE_CORNER, 0.8)])
        } else {
            Transition::new(vec![(main, 0.8), (side, 0.2)])
        }
    }
}

impl Environment for Grid {
    type State = Cell;
    type Action = GridMove;

    fn name(&self) -> &str {
        "grid"
    }

    fn states(&self) -> &[Cell] {
        &self.states
    }

    fn actions(&self) -> &[GridMove] {
        &self.actions
    }

    fn outcome_levels(&self) -> &[OutcomeLevel] {
        &self.levels
    }

    fn legal_actions(&self, state: &Cell) -> Result<Vec<GridMove>> {
        if !self.contains(state) {
            return Err(SsbqError::unrecognized_state(state));
        }
        Ok(if self.is_terminal(state) {
            vec![GridMove::Reinit]
        } else {
            vec![GridMove::Left, GridMove::Up]
        })
    }

    fn is_terminal(&self, state: &Cell) -> bool {
        matches!((state.row, state.col), (LAST, 0) | (LAST, LAST) | (0, LAST))
    }

    fn outcome_of(&self, state: &Cell) -> Result<OutcomeLevel> {
        match (state.row, state.col) {
            (LAST, 0) => Ok("w1".into()),
            (LAST, LAST) => Ok("w2".into()),
            (0, LAST) => Ok("w3".into()),
            _ => Err(SsbqError::unrecognized_state(state)),
        }
    }

    fn transition(&self, state: &Cell, action: &GridMove) -> Result<Transition<Cell>> {
        if !self.contains(state) {
            return Err(SsbqError::unrecognized_state(state));
        }
        match action {
            GridMove::Reinit => Ok(Transition::certain(START)),
            _ if self.is_terminal(state) => Err(SsbqError::illegal_action(state, action)),
            _ => Ok(Self::drift(*state, *action)),
        }
    }

    fn initial_state(&self) -> &Cell {
        &START
    }

    fn reinit_action(&self) -> GridMove {
        GridMove::Reinit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssbq_core::validate_environment;

    #[test]
    fn test_grid_is_valid() {
        let grid = Grid::new();
        validate_environment(&grid).unwrap();
        assert_eq!(grid.states().len(), 9);
    }

    #[test]
    fn test_interior_moves() {
        let grid = Grid::new();
        let left = grid.transition(&START, &GridMove::Left).unwrap();
        assert_eq!(left.probability(&Cell::new(1, 0)), 0.8);
        assert_eq!(left.probability(&Cell::new(0, 1)), 0.2);

        let up = grid.transition(&START, &GridMove::Up).unwrap();
        assert_eq!(up.probability(&Cell::new(1, 0)), 0.2);
        assert_eq!(up.probability(&Cell::new(0, 1)), 0.8);
    }

    #[test]
    fn test_edge_moves_slide_into_corner() {
        let grid = Grid::new();
        let bottom = Cell::new(2, 1);
        let left = grid.transition(&bottom, &GridMove::Left).unwrap();
        assert_eq!(left.probability(&bottom), 0.8);
        assert_eq!(left.probability(&CENTRE_CORNER), 0.2);
        let up = grid.transition(&bottom, &GridMove::Up).unwrap();
        assert_eq!(up.probability(&bottom), 0.2);
        assert_eq!(up.probability(&CENTRE_CORNER), 0.8);
    }

    #[test]
    fn test_terminal_corners() {
        let grid = Grid::new();
        assert_eq!(grid.outcome_rank(&Cell::new(2, 0)).unwrap(), 0);
        assert_eq!(grid.outcome_rank(&Cell::new(2, 2)).unwrap(), 1);
        assert_eq!(grid.outcome_rank(&Cell::new(0, 2)).unwrap(), 2);
        assert!(grid
            .transition(&Cell::new(2, 2), &GridMove::Left)
            .is_err());
        assert!(grid.legal_actions(&Cell::new(3, 0)).is_err());
    }

    #[test]
    fn test_preference_is_cyclic() {
        let grid = Grid::new();
        let p = |a: &str, b: &str| grid.preference(&a.into(), &b.into()).unwrap();
        assert_eq!(p("w2", "w1"), 10.0);
        assert_eq!(p("w3", "w2"), 10.0);
        assert_eq!(p("w1", "w3"), 10.0);
        assert_eq!(p("w1", "w2"), -10.0);
        assert_eq!(p("w3", "w3"), 0.0);
    }
}
