//! Kit geometry: how many pads/tracks, steps and patterns the device exposes.

use serde::{Deserialize, Serialize};

/// Steps per track on every supported device.
pub const STEPS: usize = 16;

/// Default number of selectable patterns.
pub const DEFAULT_PATTERNS: usize = 6;

/// Sample families of the 8-pad build, in pad order.
pub const DEFAULT_FAMILIES: [&str; 8] = ["BD", "SD", "CH", "OH", "CP", "RS", "CL", "CY"];

/// Pad/track geometry. Pad `i` plays the sample family `families[i]` and is
/// driven by sequencer track `i`, so pad count and track count are the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub families: Vec<String>,
    pub steps: usize,
    pub patterns: usize,
}

impl Layout {
    pub fn new(families: Vec<String>, patterns: usize) -> Self {
        Self {
            families,
            steps: STEPS,
            patterns: patterns.max(1),
        }
    }

    pub fn tracks(&self) -> usize {
        self.families.len()
    }

    pub fn pads(&self) -> usize {
        self.families.len()
    }

    pub fn has_track(&self, track: usize) -> bool {
        track < self.tracks()
    }

    pub fn has_pad(&self, pad: usize) -> bool {
        pad < self.pads()
    }

    pub fn has_step(&self, step: usize) -> bool {
        step < self.steps
    }

    pub fn has_pattern(&self, index: usize) -> bool {
        index < self.patterns
    }

    pub fn family(&self, pad: usize) -> Option<&str> {
        self.families.get(pad).map(String::as_str)
    }

    pub fn pad_for_family(&self, family: &str) -> Option<usize> {
        self.families.iter().position(|f| f == family)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(
            DEFAULT_FAMILIES.iter().map(|f| f.to_string()).collect(),
            DEFAULT_PATTERNS,
        )
    }
}
