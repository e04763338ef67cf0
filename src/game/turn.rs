//! Ring of participants with a rotation direction, shared by the
//! turn-based games

use serde::{Deserialize, Serialize};

/// Rotation direction, stored as `1` / `-1`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn step(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        direction.step() as i8
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Direction::Forward),
            -1 => Ok(Direction::Backward),
            other => Err(format!("invalid direction {other}")),
        }
    }
}

/// Current-turn pointer over `len` seats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRing {
    len: usize,
    current: usize,
    direction: Direction,
}

impl TurnRing {
    /// `None` for an empty ring. `current` is normalised into range.
    pub fn new(len: usize, current: usize, direction: Direction) -> Option<Self> {
        (len > 0).then(|| Self {
            len,
            current: current % len,
            direction,
        })
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Seat `steps` positions ahead in the current direction
    pub fn peek(&self, steps: usize) -> usize {
        let offset = self.direction.step() * steps as i64;
        (self.current as i64 + offset).rem_euclid(self.len as i64) as usize
    }

    /// Move the pointer `steps` positions and return the new seat
    pub fn advance(&mut self, steps: usize) -> usize {
        self.current = self.peek(steps);
        self.current
    }

    pub fn reverse(&mut self) {
        self.direction = self.direction.reversed();
    }
}
