//! Fixed-point score math and grid coordinates.
//!
//! Scores grow by fractional combo multipliers (0.1, 0.2 and 0.3 per
//! combo step). Fixed-point keeps those gains exact and identical on
//! every platform, which replays and determinism checks rely on.

use std::fmt;

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for score math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Scale `base` by `1 + combo * tenths / 10`.
///
/// The product is formed in integers first and divided once, so a
/// 25-point treasure at combo 1 (step 0.1) is exactly 27.5. Results past
/// the integer range of [`Fixed`] saturate at [`Fixed::MAX`].
#[must_use]
pub fn combo_scaled(base: u32, combo: u32, tenths: u32) -> Fixed {
    let multiplier = i64::from(combo)
        .saturating_mul(i64::from(tenths))
        .saturating_add(10);
    let numerator = i64::from(base).saturating_mul(multiplier);
    let whole = Fixed::saturating_from_num(numerator / 10);
    whole.saturating_add(Fixed::from_num(numerator % 10) / Fixed::from_num(10))
}

/// A cell coordinate. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The neighbouring cell in `direction`, if it lies inside a
    /// `size × size` grid.
    #[must_use]
    pub fn step(self, direction: Direction, size: usize) -> Option<Self> {
        let (dx, dy) = direction.delta();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < size && y < size).then_some(Self { x, y })
    }

    /// All in-bounds orthogonal neighbours, in [`Direction::ALL`] order.
    pub fn neighbours(self, size: usize) -> impl Iterator<Item = Position> {
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| self.step(dir, size))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orthogonal step direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Row - 1.
    Up,
    /// Row + 1.
    Down,
    /// Column - 1.
    Left,
    /// Column + 1.
    Right,
}

impl Direction {
    /// Fixed evaluation order used by spawners and enemy pathing.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Column and row offsets.
    #[must_use]
    pub const fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}
