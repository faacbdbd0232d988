//! Step pattern grid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_VELOCITY: u8 = 127;
pub const MIN_VELOCITY: u8 = 1;
pub const MAX_VELOCITY: u8 = 127;

/// A single step of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub active: bool,
    pub velocity: u8, // 1-127, default 127
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            active: false,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

/// One pattern: `cells[track][step]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternGrid {
    cells: Vec<Vec<Cell>>,
}

impl PatternGrid {
    pub fn new(tracks: usize, steps: usize) -> Self {
        Self {
            cells: (0..tracks).map(|_| vec![Cell::default(); steps]).collect(),
        }
    }

    pub fn tracks(&self) -> usize {
        self.cells.len()
    }

    pub fn steps(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn cell(&self, track: usize, step: usize) -> Option<&Cell> {
        self.cells.get(track).and_then(|row| row.get(step))
    }

    pub fn is_active(&self, track: usize, step: usize) -> bool {
        self.cell(track, step).is_some_and(|c| c.active)
    }

    pub fn velocity(&self, track: usize, step: usize) -> Option<u8> {
        self.cell(track, step).map(|c| c.velocity)
    }

    /// Set a step's active flag. Returns `Some(changed)`, or `None` when the
    /// coordinates are outside the grid.
    pub fn set_active(&mut self, track: usize, step: usize, active: bool) -> Option<bool> {
        let cell = self.cells.get_mut(track)?.get_mut(step)?;
        let changed = cell.active != active;
        cell.active = active;
        Some(changed)
    }

    /// Set a step's velocity, clamped to 1-127. Same return contract as
    /// [`PatternGrid::set_active`].
    pub fn set_velocity(&mut self, track: usize, step: usize, velocity: u8) -> Option<bool> {
        let cell = self.cells.get_mut(track)?.get_mut(step)?;
        let velocity = velocity.clamp(MIN_VELOCITY, MAX_VELOCITY);
        let changed = cell.velocity != velocity;
        cell.velocity = velocity;
        Some(changed)
    }

    /// Active steps of one track, in step order.
    pub fn active_steps(&self, track: usize) -> Vec<usize> {
        self.cells
            .get(track)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, c)| c.active)
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn active_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.active).count()
    }
}

/// Decoded `pattern` push.
///
/// `steps` holds the tracks the push carried; tracks it left out are cleared
/// when the update replaces a grid. A `None` velocity keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternUpdate {
    pub index: Option<usize>,
    pub steps: BTreeMap<usize, Vec<bool>>,
    pub velocities: BTreeMap<usize, Vec<Option<u8>>>,
}
