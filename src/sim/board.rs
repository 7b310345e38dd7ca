//! Board model
//!
//! Cards are stored row-major. Card identity (`pair_id`) is fixed once the
//! board is built; only the face-up and matched flags change during play.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Board coordinate (column, row), zero-based from the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub col: usize,
    pub row: usize,
}

impl Position {
    pub const fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }
}

/// A single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub pair_id: u32,
    pub face_up: bool,
    pub matched: bool,
}

impl Card {
    fn hidden(pair_id: u32) -> Self {
        Self {
            pair_id,
            face_up: false,
            matched: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Card>,
}

impl Board {
    /// Build a shuffled board holding `pair_count` pairs.
    ///
    /// Fails when a dimension is zero, the cell count is odd, or it does not
    /// equal `2 * pair_count`.
    pub fn build<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        pair_count: usize,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        check_dimensions(width, height, pair_count)?;

        let mut ids: Vec<u32> = (0..pair_count as u32).flat_map(|id| [id, id]).collect();
        ids.shuffle(rng);

        Ok(Self {
            width,
            height,
            cells: ids.into_iter().map(Card::hidden).collect(),
        })
    }

    /// Build a board from an explicit row-major layout of pair ids.
    pub fn from_pair_ids(width: usize, height: usize, ids: &[u32]) -> Result<Self, GameError> {
        if ids.len() != width * height {
            return Err(GameError::configuration(format!(
                "{} pair ids given for a {}x{} board",
                ids.len(),
                width,
                height
            )));
        }
        let pair_count = ids.len() / 2;
        check_dimensions(width, height, pair_count)?;

        let mut seen = vec![0u8; pair_count];
        for &id in ids {
            let slot = seen.get_mut(id as usize).ok_or_else(|| {
                GameError::configuration(format!("pair id {id} out of range 0..{pair_count}"))
            })?;
            *slot += 1;
        }
        if let Some(id) = seen.iter().position(|&n| n != 2) {
            return Err(GameError::configuration(format!(
                "pair id {id} appears {} times",
                seen[id]
            )));
        }

        Ok(Self {
            width,
            height,
            cells: ids.iter().copied().map(Card::hidden).collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pair_count(&self) -> usize {
        self.cells.len() / 2
    }

    /// Row-major cell index of a position
    pub fn index_of(&self, pos: Position) -> Result<usize, GameError> {
        if pos.col >= self.width || pos.row >= self.height {
            return Err(GameError::Index {
                col: pos.col,
                row: pos.row,
                width: self.width,
                height: self.height,
            });
        }
        Ok(pos.row * self.width + pos.col)
    }

    pub fn card(&self, pos: Position) -> Result<&Card, GameError> {
        let idx = self.index_of(pos)?;
        Ok(&self.cells[idx])
    }

    pub fn flip(&mut self, pos: Position, face_up: bool) -> Result<(), GameError> {
        let idx = self.index_of(pos)?;
        self.cells[idx].face_up = face_up;
        Ok(())
    }

    /// Mark both cells matched. Pairing is the caller's responsibility; only
    /// bounds are checked, and neither cell changes if either is out of range.
    pub fn mark_matched(&mut self, a: Position, b: Position) -> Result<(), GameError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.cells[ia].matched = true;
        self.cells[ib].matched = true;
        Ok(())
    }

    pub fn all_matched(&self) -> bool {
        self.cells.iter().all(|c| c.matched)
    }

    pub fn matched_pairs(&self) -> usize {
        self.cells.iter().filter(|c| c.matched).count() / 2
    }

    /// All positions in row-major order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height)
            .flat_map(move |row| (0..self.width).map(move |col| Position { col, row }))
    }

    pub fn cells(&self) -> &[Card] {
        &self.cells
    }

    /// Render-safe view: the face identifier is only exposed for cells that
    /// are face up or matched.
    pub fn view(&self, faces: &[String]) -> BoardView {
        let cells = self
            .cells
            .iter()
            .map(|card| {
                let visible = card.face_up || card.matched;
                CellView {
                    face_up: card.face_up,
                    matched: card.matched,
                    face: visible
                        .then(|| faces.get(card.pair_id as usize).cloned())
                        .flatten(),
                }
            })
            .collect();
        BoardView {
            width: self.width,
            height: self.height,
            cells,
        }
    }
}

fn check_dimensions(width: usize, height: usize, pair_count: usize) -> Result<(), GameError> {
    if width == 0 || height == 0 {
        return Err(GameError::configuration(format!(
            "board dimensions must be positive, got {width}x{height}"
        )));
    }
    let cells = width * height;
    if cells % 2 != 0 {
        return Err(GameError::configuration(format!(
            "{width}x{height} board has an odd number of cells"
        )));
    }
    if pair_count == 0 {
        return Err(GameError::configuration("pair count must be positive"));
    }
    if cells != 2 * pair_count {
        return Err(GameError::configuration(format!(
            "{width}x{height} board cannot hold {pair_count} pairs"
        )));
    }
    Ok(())
}

/// What a renderer may see of one cell
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellView {
    pub face_up: bool,
    pub matched: bool,
    /// Card face identifier, `None` while the card is face down
    pub face: Option<String>,
}

/// What a renderer may see of the board
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoardView {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<CellView>,
}

impl BoardView {
    pub fn cell(&self, pos: Position) -> Option<&CellView> {
        if pos.col >= self.width || pos.row >= self.height {
            return None;
        }
        self.cells.get(pos.row * self.width + pos.col)
    }
}
