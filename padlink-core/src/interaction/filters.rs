//! Numbered filter presets and the reapply gate.

use std::fmt;
use std::time::Duration;

use padlink_net::Command;
use padlink_types::TimerId;

use crate::context::{Ctx, TimerEvent};
use crate::error::ClientError;

/// Where a filter command is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterTarget {
    Track(usize),
    Pad(usize),
}

impl fmt::Display for FilterTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterTarget::Track(t) => write!(f, "Track {}", t + 1),
            FilterTarget::Pad(p) => write!(f, "Pad {}", p + 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterPreset {
    /// Device filter type; 0 clears.
    pub filter_type: u8,
    pub cutoff: f32,
    pub resonance: f32,
    pub gain: Option<f32>,
    pub name: &'static str,
}

const fn preset(
    filter_type: u8,
    cutoff: f32,
    resonance: f32,
    gain: Option<f32>,
    name: &'static str,
) -> FilterPreset {
    FilterPreset {
        filter_type,
        cutoff,
        resonance,
        gain,
        name,
    }
}

/// Presets bound to F1..F10. The last entry always clears.
pub const FILTER_PRESETS: [FilterPreset; 10] = [
    preset(1, 300.0, 5.0, None, "Low Pass 300Hz Q5"),
    preset(2, 3000.0, 5.0, None, "High Pass 3kHz Q5"),
    preset(3, 800.0, 8.0, None, "Band Pass 800Hz Q8"),
    preset(9, 500.0, 15.0, None, "Resonant 500Hz Q15"),
    preset(7, 200.0, 1.0, Some(10.0), "Low Shelf +10dB"),
    preset(8, 4000.0, 1.0, Some(10.0), "High Shelf +10dB"),
    preset(6, 1500.0, 5.0, Some(10.0), "Peaking 1.5kHz +10dB"),
    preset(4, 800.0, 10.0, None, "Notch 800Hz Q10"),
    preset(1, 150.0, 10.0, None, "Low Pass 150Hz Q10"),
    preset(0, 0.0, 0.0, None, "Clear Filter"),
];

impl FilterPreset {
    pub fn is_clear(&self) -> bool {
        self.filter_type == 0
    }

    pub fn command(&self, target: FilterTarget) -> Command {
        match (target, self.is_clear()) {
            (FilterTarget::Track(track), true) => Command::ClearTrackFilter { track },
            (FilterTarget::Pad(pad), true) => Command::ClearPadFilter { pad },
            (FilterTarget::Track(track), false) => Command::SetTrackFilter {
                track,
                filter_type: self.filter_type,
                cutoff: self.cutoff,
                resonance: self.resonance,
                gain: self.gain,
            },
            (FilterTarget::Pad(pad), false) => Command::SetPadFilter {
                pad,
                filter_type: self.filter_type,
                cutoff: self.cutoff,
                resonance: self.resonance,
                gain: self.gain,
            },
        }
    }
}

struct Window {
    target: FilterTarget,
    preset: usize,
    timer: TimerId,
}

/// Swallows re-application of the same preset on the same target while the
/// window is open. Each swallowed repeat pushes the window out again, so a
/// held key sends one command.
pub struct FilterGate {
    window: Duration,
    open: Option<Window>,
}

impl FilterGate {
    pub fn new(window: Duration) -> Self {
        Self { window, open: None }
    }

    /// Apply preset `index` (0-based) to `target`. Returns whether a command
    /// went out.
    pub fn apply(
        &mut self,
        ctx: &mut Ctx,
        target: FilterTarget,
        index: usize,
    ) -> Result<bool, ClientError> {
        let preset = FILTER_PRESETS
            .get(index)
            .ok_or(ClientError::rejected("filter preset", index))?;

        if let Some(open) = self.open.as_mut() {
            if open.target == target && open.preset == index && ctx.timers.is_pending(open.timer) {
                ctx.timers.cancel(open.timer);
                open.timer = ctx
                    .timers
                    .schedule(self.window, TimerEvent::FilterWindow { target });
                log::debug!("Swallowed repeat of filter preset {} on {}", index + 1, target);
                return Ok(false);
            }
        }
        if let Some(previous) = self.open.take() {
            ctx.timers.cancel(previous.timer);
        }

        if !ctx.sink.send(preset.command(target)) {
            return Err(ClientError::TransportUnavailable);
        }
        ctx.toast(format!("{}: {}", target, preset.name));
        let timer = ctx
            .timers
            .schedule(self.window, TimerEvent::FilterWindow { target });
        self.open = Some(Window {
            target,
            preset: index,
            timer,
        });
        Ok(true)
    }

    pub fn on_window_end(&mut self, target: FilterTarget) {
        if self.open.as_ref().is_some_and(|w| w.target == target) {
            self.open = None;
        }
    }

    pub fn reset(&mut self, ctx: &mut Ctx) {
        if let Some(open) = self.open.take() {
            ctx.timers.cancel(open.timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_preset_clears() {
        assert!(FILTER_PRESETS[9].is_clear());
        assert_eq!(
            FILTER_PRESETS[9].command(FilterTarget::Pad(3)),
            Command::ClearPadFilter { pad: 3 }
        );
        assert!(FILTER_PRESETS[..9].iter().all(|p| !p.is_clear()));
    }

    #[test]
    fn shelf_presets_carry_gain() {
        match FILTER_PRESETS[4].command(FilterTarget::Track(0)) {
            Command::SetTrackFilter {
                filter_type, gain, ..
            } => {
                assert_eq!(filter_type, 7);
                assert_eq!(gain, Some(10.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn target_display_is_one_based() {
        assert_eq!(FilterTarget::Track(0).to_string(), "Track 1");
        assert_eq!(FilterTarget::Pad(7).to_string(), "Pad 8");
    }
}
