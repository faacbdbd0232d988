//! Mirror of the device-owned state.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPO: u16 = 120;
pub const MIN_TEMPO: u16 = 40;
pub const MAX_TEMPO: u16 = 300;
pub const DEFAULT_VOLUME: u8 = 75;
pub const MAX_VOLUME: u8 = 100;

/// Per-track loop flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub active: bool,
    pub paused: bool,
}

/// Sample bound to a pad, as reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSample {
    pub filename: String,
    pub size_bytes: u64,
    pub format: String,
    pub quality: String,
}

impl PadSample {
    pub fn size_kb(&self) -> u64 {
        self.size_bytes / 1024
    }

    /// Filename without directory or extension, as shown on the pad.
    pub fn display_name(&self) -> &str {
        let base = self.filename.rsplit('/').next().unwrap_or(&self.filename);
        match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub samples_loaded: u32,
    pub memory_used: u64,
    pub free_storage: u64,
}

/// Canonical device state. Every field is last-write-wins; pushes are merged
/// field by field, never replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub tempo: u16,
    pub sequencer_volume: u8,
    pub live_volume: u8,
    pub playing: bool,
    pub active_pattern: usize,
    pub muted: Vec<bool>,
    pub loops: Vec<LoopState>,
    pub pad_samples: Vec<Option<PadSample>>,
    pub telemetry: Telemetry,
}

impl DeviceState {
    pub fn new(tracks: usize) -> Self {
        Self {
            tempo: DEFAULT_TEMPO,
            sequencer_volume: DEFAULT_VOLUME,
            live_volume: DEFAULT_VOLUME,
            playing: false,
            active_pattern: 0,
            muted: vec![false; tracks],
            loops: vec![LoopState::default(); tracks],
            pad_samples: vec![None; tracks],
            telemetry: Telemetry::default(),
        }
    }

    pub fn is_muted(&self, track: usize) -> bool {
        self.muted.get(track).copied().unwrap_or(false)
    }

    pub fn loop_state(&self, track: usize) -> LoopState {
        self.loops.get(track).copied().unwrap_or_default()
    }

    pub fn pad_sample(&self, pad: usize) -> Option<&PadSample> {
        self.pad_samples.get(pad).and_then(Option::as_ref)
    }
}

/// One pad slot inside a `state` push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleSlot {
    pub pad: Option<usize>,
    pub loaded: Option<bool>,
    #[serde(alias = "filename")]
    pub name: Option<String>,
    pub size: Option<u64>,
    pub format: Option<String>,
    pub quality: Option<String>,
}

/// Partial device state carried by a `state` push. Absent fields leave the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatePatch {
    pub tempo: Option<f64>,
    pub sequencer_volume: Option<u8>,
    pub live_volume: Option<u8>,
    pub playing: Option<bool>,
    #[serde(rename = "pattern")]
    pub active_pattern: Option<usize>,
    pub step: Option<i64>,
    #[serde(deserialize_with = "flags")]
    pub track_muted: Option<Vec<bool>>,
    #[serde(deserialize_with = "flags")]
    pub loop_active: Option<Vec<bool>>,
    #[serde(deserialize_with = "flags")]
    pub loop_paused: Option<Vec<bool>>,
    pub samples: Option<Vec<SampleSlot>>,
    pub samples_loaded: Option<u32>,
    pub memory_used: Option<u64>,
    #[serde(rename = "psramFree")]
    pub free_storage: Option<u64>,
}

impl DeviceStatePatch {
    pub fn tempo(tempo: u16) -> Self {
        Self {
            tempo: Some(f64::from(tempo)),
            ..Self::default()
        }
    }

    pub fn playing(playing: bool) -> Self {
        Self {
            playing: Some(playing),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A device flag sent either as a JSON bool or as 0/1.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Number(f64),
}

impl Flag {
    pub fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Number(n) => n != 0.0,
        }
    }
}

fn flags<'de, D>(deserializer: D) -> Result<Option<Vec<bool>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<Vec<Flag>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|v| v.into_iter().map(Flag::is_set).collect()))
}
