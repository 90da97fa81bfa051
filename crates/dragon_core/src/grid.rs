//! The square battle field.
//!
//! Cells are stored row-major. Each cell holds a copy of a catalog
//! [`TileType`]; nothing else about a cell is mutable.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TileKind, TileType, FIELD_SIZES};
use crate::error::{GameError, Result};
use crate::math::Position;

/// A `size × size` matrix of tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    cells: Vec<TileType>,
}

impl Grid {
    /// A grid filled with copies of `fill`.
    #[must_use]
    pub fn filled(size: usize, fill: &TileType) -> Self {
        Self {
            size,
            cells: vec![fill.clone(); size * size],
        }
    }

    /// Build a grid from rows of [`TileKind::glyph`] characters.
    ///
    /// Whitespace inside a row is ignored, so layouts may be spaced out
    /// for readability.
    pub fn parse<S: AsRef<str>>(catalog: &Catalog, rows: &[S]) -> Result<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (y, row) in rows.iter().enumerate() {
            let mut width = 0;
            for glyph in row.as_ref().chars().filter(|c| !c.is_whitespace()) {
                let kind = TileKind::from_glyph(glyph).ok_or_else(|| {
                    GameError::InvalidGrid(format!("unknown glyph '{glyph}' in row {y}"))
                })?;
                cells.push(catalog.tile(kind));
                width += 1;
            }
            if width != size {
                return Err(GameError::InvalidGrid(format!(
                    "row {y} has {width} cells, expected {size}"
                )));
            }
        }
        Ok(Self { size, cells })
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The center cell, where the player spawns.
    #[must_use]
    pub const fn center(&self) -> Position {
        Position::new(self.size / 2, self.size / 2)
    }

    /// Whether `pos` lies on the grid.
    #[must_use]
    pub const fn contains(&self, pos: Position) -> bool {
        pos.x < self.size && pos.y < self.size
    }

    /// Tile at `pos`.
    #[must_use]
    pub fn get(&self, pos: Position) -> Option<&TileType> {
        if self.contains(pos) {
            self.cells.get(pos.y * self.size + pos.x)
        } else {
            None
        }
    }

    /// Kind of the tile at `pos`.
    #[must_use]
    pub fn kind_at(&self, pos: Position) -> Option<TileKind> {
        self.get(pos).map(|t| t.kind)
    }

    /// Replace the tile at `pos`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: Position, tile: TileType) {
        if self.contains(pos) {
            let idx = pos.y * self.size + pos.x;
            self.cells[idx] = tile;
        }
    }

    /// Every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let size = self.size;
        (0..size).flat_map(move |y| (0..size).map(move |x| Position::new(x, y)))
    }

    /// Positions holding `kind`, in row-major order.
    #[must_use]
    pub fn find_all(&self, kind: TileKind) -> Vec<Position> {
        self.positions()
            .filter(|&p| self.kind_at(p) == Some(kind))
            .collect()
    }

    /// Number of cells holding `kind`.
    #[must_use]
    pub fn count(&self, kind: TileKind) -> usize {
        self.cells.iter().filter(|t| t.kind == kind).count()
    }

    /// Check the structural invariants a game can start from: a
    /// supported edge length, a full cell vector and exactly one player.
    /// Returns the player's position.
    pub fn validate(&self) -> Result<Position> {
        if !FIELD_SIZES.contains(&self.size) {
            return Err(GameError::InvalidGrid(format!(
                "edge length {} is not one of {FIELD_SIZES:?}",
                self.size
            )));
        }
        if self.cells.len() != self.size * self.size {
            return Err(GameError::InvalidGrid(format!(
                "{} cells for a {}x{} grid",
                self.cells.len(),
                self.size,
                self.size
            )));
        }
        match self.find_all(TileKind::Player).as_slice() {
            [player] => Ok(*player),
            found => Err(GameError::InvalidGrid(format!(
                "expected exactly one player, found {}",
                found.len()
            ))),
        }
    }

    /// Render as rows of glyphs, one line per row.
    #[must_use]
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(self.size * (self.size + 1));
        for y in 0..self.size {
            for x in 0..self.size {
                if let Some(kind) = self.kind_at(Position::new(x, y)) {
                    out.push(kind.glyph());
                }
            }
            out.push('\n');
        }
        out
    }
}
