use padlink_types::Layout;

use super::filters::FilterTarget;

/// What the surface is currently editing. Exactly one mode at a time;
/// entering one leaves the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    /// A sequencer cell, remembered with the pattern it was picked in.
    Cell {
        track: usize,
        step: usize,
        pattern: usize,
    },
    Track(usize),
    Pad(usize),
}

/// Mode-specific editor panel opened by a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editor {
    Velocity,
    Filter,
}

/// Velocities bound to the cell-mode preset keys.
pub const VELOCITY_PRESETS: [u8; 4] = [40, 70, 100, 127];

impl Selection {
    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Selection::Cell { .. })
    }

    pub fn editor(&self) -> Option<Editor> {
        match self {
            Selection::None => None,
            Selection::Cell { .. } => Some(Editor::Velocity),
            Selection::Track(_) | Selection::Pad(_) => Some(Editor::Filter),
        }
    }

    pub fn filter_target(&self) -> Option<FilterTarget> {
        match *self {
            Selection::Track(track) => Some(FilterTarget::Track(track)),
            Selection::Pad(pad) => Some(FilterTarget::Pad(pad)),
            _ => None,
        }
    }

    /// A cell selection goes stale once its pattern is no longer active or
    /// the layout no longer contains it. Track and pad selections go stale
    /// only when out of layout.
    pub fn is_stale(&self, layout: &Layout, active_pattern: usize) -> bool {
        match *self {
            Selection::None => false,
            Selection::Cell {
                track,
                step,
                pattern,
            } => pattern != active_pattern || !layout.has_track(track) || !layout.has_step(step),
            Selection::Track(track) => !layout.has_track(track),
            Selection::Pad(pad) => !layout.has_pad(pad),
        }
    }
}

/// `index + delta` wrapped into `0..len`.
pub fn wrap(index: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as isize;
    ((index as isize + delta).rem_euclid(len)) as usize
}
