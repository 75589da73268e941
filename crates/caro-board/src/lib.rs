//! The caro board: an unbounded grid where two players alternately place
//! marks, and the first to line up `win_length` of them in a row wins.
//!
//! The board is sparse. Only occupied cells are stored, keyed by their
//! signed coordinate, so a game that wanders a million cells to the left
//! costs no more than one played near the origin.
//!
//! Win detection only ever looks at the cell just played: a line that did
//! not exist before the last move and exists after it must pass through
//! that cell.

use std::collections::HashMap;

use caro_protocol::{BoardCell, Coord, Slot};

/// How many marks in a row win when nothing else is configured.
pub const DEFAULT_WIN_LENGTH: u32 = 5;

/// The four line orientations. Each is scanned in both senses, so the
/// opposite four are covered by negating the step.
const DIRECTIONS: [(i64, i64); 4] = [
    (1, 0),  // horizontal
    (0, 1),  // vertical
    (1, 1),  // diagonal
    (1, -1), // anti-diagonal
];

/// Outcome of evaluating the last placed mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Won(Slot),
    Continue,
}

/// Result of [`Board::place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed,
    Occupied(Slot),
}

/// Coordinate → mark for every occupied cell.
#[derive(Debug, Clone, Default)]
pub struct Board {
    cells: HashMap<Coord, Slot>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a board from an ordered list of placements.
    pub fn from_moves(moves: impl IntoIterator<Item = (Coord, Slot)>) -> Self {
        let mut board = Self::new();
        for (coord, mark) in moves {
            board.place(coord, mark);
        }
        board
    }

    /// Puts `mark` on `coord` unless the cell is already taken. An occupied
    /// cell is never overwritten.
    pub fn place(&mut self, coord: Coord, mark: Slot) -> Placement {
        match self.cells.get(&coord) {
            Some(existing) => Placement::Occupied(*existing),
            None => {
                self.cells.insert(coord, mark);
                Placement::Placed
            }
        }
    }

    pub fn get(&self, coord: Coord) -> Option<Slot> {
        self.cells.get(&coord).copied()
    }

    pub fn is_occupied(&self, coord: Coord) -> bool {
        self.cells.contains_key(&coord)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All occupied cells, sorted by `(x, y)` so snapshots are stable.
    pub fn cells(&self) -> Vec<BoardCell> {
        let mut cells: Vec<BoardCell> = self
            .cells
            .iter()
            .map(|(coord, mark)| BoardCell {
                x: coord.x,
                y: coord.y,
                mark: *mark,
            })
            .collect();
        cells.sort_by_key(|cell| (cell.x, cell.y));
        cells
    }

    /// Length of the run through `origin` along `direction`, counting
    /// `origin` itself as `mark` whether or not it is placed yet.
    ///
    /// Scans at most `limit - 1` cells each way and stops at the edge of
    /// the coordinate range, so the result never exceeds `2 * limit - 1`.
    fn run_through(&self, origin: Coord, direction: (i64, i64), mark: Slot, limit: u32) -> u32 {
        let mut run = 1;
        for sense in [1, -1] {
            let mut cell = origin;
            for _ in 1..limit {
                match cell.checked_step(direction, sense) {
                    Some(next) if self.get(next) == Some(mark) => {
                        run += 1;
                        cell = next;
                    }
                    _ => break,
                }
            }
        }
        run
    }

    /// Whether placing `mark` on `coord` would complete a winning line.
    /// Does not touch the board.
    pub fn wins_with(&self, coord: Coord, mark: Slot, win_length: u32) -> bool {
        DIRECTIONS
            .iter()
            .any(|direction| self.run_through(coord, *direction, mark, win_length) >= win_length)
    }
}

/// Decides the game after `last` was placed.
///
/// Reads the mark at `last` from the board; an empty cell means nothing was
/// placed there and the game continues.
pub fn evaluate(board: &Board, last: Coord, win_length: u32) -> Verdict {
    match board.get(last) {
        Some(mark) if board.wins_with(last, mark, win_length) => Verdict::Won(mark),
        _ => Verdict::Continue,
    }
}
