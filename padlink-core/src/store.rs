//! Canonical mirror of the device state.
//!
//! Every mutation goes through one of the merge/set operations below and
//! returns the list of fields that actually changed. Callers turn that list
//! into notifications; an empty list means nothing needs redrawing.

use log::{debug, warn};

use padlink_types::{
    normalize_format, DeviceState, DeviceStatePatch, Layout, LoopState, PadSample, PatternGrid,
    PatternUpdate, SampleSlot, Telemetry, DEFAULT_QUALITY, MAX_TEMPO, MAX_VOLUME, MIN_TEMPO,
};

use crate::error::ClientError;

/// A single field-level change.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Tempo(u16),
    SequencerVolume(u8),
    LiveVolume(u8),
    Playing(bool),
    ActivePattern(usize),
    Mute { track: usize, muted: bool },
    Loop { track: usize, state: LoopState },
    PadSample { pad: usize },
    Telemetry(Telemetry),
    Cell { pattern: usize, track: usize, step: usize, active: bool },
    Velocity { pattern: usize, track: usize, step: usize, velocity: u8 },
    /// A whole pattern grid was replaced.
    Pattern { index: usize },
    /// Playhead moved. Only the two affected columns need redrawing.
    CurrentStep { previous: Option<usize>, current: usize },
}

/// Coarse grouping of changes, used by observers to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Transport,
    Mixer,
    Tracks,
    Pads,
    Telemetry,
    Grid,
    Playhead,
}

impl StoreChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            StoreChange::Tempo(_) | StoreChange::Playing(_) | StoreChange::ActivePattern(_) => {
                ChangeKind::Transport
            }
            StoreChange::SequencerVolume(_) | StoreChange::LiveVolume(_) => ChangeKind::Mixer,
            StoreChange::Mute { .. } | StoreChange::Loop { .. } => ChangeKind::Tracks,
            StoreChange::PadSample { .. } => ChangeKind::Pads,
            StoreChange::Telemetry(_) => ChangeKind::Telemetry,
            StoreChange::Cell { .. }
            | StoreChange::Velocity { .. }
            | StoreChange::Pattern { .. } => ChangeKind::Grid,
            StoreChange::CurrentStep { .. } => ChangeKind::Playhead,
        }
    }
}

pub struct StateStore {
    layout: Layout,
    device: DeviceState,
    patterns: Vec<PatternGrid>,
    current_step: Option<usize>,
}

impl StateStore {
    pub fn new(layout: Layout) -> Self {
        let patterns = (0..layout.patterns)
            .map(|_| PatternGrid::new(layout.tracks(), layout.steps))
            .collect();
        Self {
            device: DeviceState::new(layout.tracks()),
            patterns,
            current_step: None,
            layout,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn active_pattern(&self) -> usize {
        self.device.active_pattern
    }

    pub fn pattern(&self, index: usize) -> Option<&PatternGrid> {
        self.patterns.get(index)
    }

    pub fn active_grid(&self) -> Option<&PatternGrid> {
        self.patterns.get(self.device.active_pattern)
    }

    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    /// Filename of the sample loaded on the pad playing `family`.
    pub fn loaded_sample(&self, family: &str) -> Option<&str> {
        let pad = self.layout.pad_for_family(family)?;
        self.device.pad_sample(pad).map(|s| s.filename.as_str())
    }

    /// Merge a `state` push. Present fields overwrite, absent fields keep
    /// their value; entries outside the layout are ignored.
    pub fn merge_device_state(&mut self, patch: &DeviceStatePatch) -> Vec<StoreChange> {
        let mut changes = Vec::new();

        if let Some(tempo) = patch.tempo {
            if tempo.is_finite() {
                let tempo = tempo.round().clamp(f64::from(MIN_TEMPO), f64::from(MAX_TEMPO)) as u16;
                if self.device.tempo != tempo {
                    self.device.tempo = tempo;
                    changes.push(StoreChange::Tempo(tempo));
                }
            }
        }
        if let Some(volume) = patch.sequencer_volume {
            let volume = volume.min(MAX_VOLUME);
            if self.device.sequencer_volume != volume {
                self.device.sequencer_volume = volume;
                changes.push(StoreChange::SequencerVolume(volume));
            }
        }
        if let Some(volume) = patch.live_volume {
            let volume = volume.min(MAX_VOLUME);
            if self.device.live_volume != volume {
                self.device.live_volume = volume;
                changes.push(StoreChange::LiveVolume(volume));
            }
        }
        if let Some(playing) = patch.playing {
            if self.device.playing != playing {
                self.device.playing = playing;
                changes.push(StoreChange::Playing(playing));
            }
        }
        if let Some(index) = patch.active_pattern {
            if self.layout.has_pattern(index) {
                if self.device.active_pattern != index {
                    self.device.active_pattern = index;
                    changes.push(StoreChange::ActivePattern(index));
                }
            } else {
                warn!("Ignoring pattern index {} outside layout", index);
            }
        }
        if let Some(step) = patch.step {
            match self.set_current_step(step) {
                Ok(mut moved) => changes.append(&mut moved),
                Err(e) => debug!("Ignoring playhead in state push: {}", e),
            }
        }
        if let Some(muted) = &patch.track_muted {
            for (track, &m) in muted.iter().enumerate().take(self.layout.tracks()) {
                if self.device.muted[track] != m {
                    self.device.muted[track] = m;
                    changes.push(StoreChange::Mute { track, muted: m });
                }
            }
        }
        let tracks = self.layout.tracks();
        let mut touched = vec![false; tracks];
        if let Some(active) = &patch.loop_active {
            for (track, &a) in active.iter().enumerate().take(tracks) {
                if self.device.loops[track].active != a {
                    self.device.loops[track].active = a;
                    touched[track] = true;
                }
            }
        }
        if let Some(paused) = &patch.loop_paused {
            for (track, &p) in paused.iter().enumerate().take(tracks) {
                if self.device.loops[track].paused != p {
                    self.device.loops[track].paused = p;
                    touched[track] = true;
                }
            }
        }
        for (track, _) in touched.iter().enumerate().filter(|(_, t)| **t) {
            changes.push(StoreChange::Loop {
                track,
                state: self.device.loops[track],
            });
        }
        if let Some(slots) = &patch.samples {
            for slot in slots {
                let Some(pad) = slot.pad.filter(|p| self.layout.has_pad(*p)) else {
                    debug!("Ignoring sample slot without a valid pad: {:?}", slot.pad);
                    continue;
                };
                if self.replace_pad_sample(pad, pad_sample_from_slot(slot)) {
                    changes.push(StoreChange::PadSample { pad });
                }
            }
        }

        let mut telemetry = self.device.telemetry;
        if let Some(v) = patch.samples_loaded {
            telemetry.samples_loaded = v;
        }
        if let Some(v) = patch.memory_used {
            telemetry.memory_used = v;
        }
        if let Some(v) = patch.free_storage {
            telemetry.free_storage = v;
        }
        if telemetry != self.device.telemetry {
            self.device.telemetry = telemetry;
            changes.push(StoreChange::Telemetry(telemetry));
        }

        changes
    }

    /// Optimistic local update, merged exactly like a push. The next
    /// authoritative push overwrites whatever was predicted.
    pub fn predict(&mut self, patch: &DeviceStatePatch) -> Vec<StoreChange> {
        debug!("Predicting {:?}", patch);
        self.merge_device_state(patch)
    }

    /// Merge a `pattern` push. Without an index the push targets the active
    /// pattern. The step grid is replaced wholesale; velocities the push
    /// leaves out keep their value.
    pub fn merge_pattern(
        &mut self,
        update: &PatternUpdate,
    ) -> Result<Vec<StoreChange>, ClientError> {
        let index = update.index.unwrap_or(self.device.active_pattern);
        if !self.layout.has_pattern(index) {
            return Err(ClientError::rejected("pattern", index));
        }
        let mut changes = Vec::new();
        if update.index.is_some() && self.device.active_pattern != index {
            self.device.active_pattern = index;
            changes.push(StoreChange::ActivePattern(index));
        }

        let old = &self.patterns[index];
        let mut grid = old.clone();
        for track in 0..self.layout.tracks() {
            let row = update.steps.get(&track);
            for step in 0..self.layout.steps {
                let active = row.and_then(|r| r.get(step)).copied().unwrap_or(false);
                grid.set_active(track, step, active);
            }
            if let Some(velocities) = update.velocities.get(&track) {
                for (step, v) in velocities.iter().enumerate().take(self.layout.steps) {
                    if let Some(v) = v {
                        grid.set_velocity(track, step, *v);
                    }
                }
            }
        }
        if grid != *old {
            self.patterns[index] = grid;
            changes.push(StoreChange::Pattern { index });
        }
        Ok(changes)
    }

    /// Set one step of the active pattern.
    pub fn set_step(
        &mut self,
        track: usize,
        step: usize,
        active: bool,
    ) -> Result<Vec<StoreChange>, ClientError> {
        self.check_cell(track, step)?;
        let pattern = self.device.active_pattern;
        let changed = self.patterns[pattern].set_active(track, step, active).unwrap_or(false);
        Ok(if changed {
            vec![StoreChange::Cell { pattern, track, step, active }]
        } else {
            Vec::new()
        })
    }

    /// Set one step velocity of the active pattern, clamped to 1-127.
    pub fn set_velocity(
        &mut self,
        track: usize,
        step: usize,
        velocity: u8,
    ) -> Result<Vec<StoreChange>, ClientError> {
        self.check_cell(track, step)?;
        let pattern = self.device.active_pattern;
        let grid = &mut self.patterns[pattern];
        let changed = grid.set_velocity(track, step, velocity).unwrap_or(false);
        Ok(match grid.velocity(track, step) {
            Some(velocity) if changed => {
                vec![StoreChange::Velocity { pattern, track, step, velocity }]
            }
            _ => Vec::new(),
        })
    }

    /// Move the playhead. Reports only the previous and new column.
    pub fn set_current_step(&mut self, step: i64) -> Result<Vec<StoreChange>, ClientError> {
        let step = usize::try_from(step)
            .ok()
            .filter(|s| self.layout.has_step(*s))
            .ok_or(ClientError::Rejected { what: "step", index: step })?;
        if self.current_step == Some(step) {
            return Ok(Vec::new());
        }
        let previous = self.current_step.replace(step);
        Ok(vec![StoreChange::CurrentStep { previous, current: step }])
    }

    pub fn set_loop_state(
        &mut self,
        track: usize,
        active: bool,
        paused: bool,
    ) -> Result<Vec<StoreChange>, ClientError> {
        let slot = self
            .device
            .loops
            .get_mut(track)
            .ok_or(ClientError::rejected("track", track))?;
        let state = LoopState { active, paused };
        if *slot == state {
            return Ok(Vec::new());
        }
        *slot = state;
        Ok(vec![StoreChange::Loop { track, state }])
    }

    pub fn set_mute(&mut self, track: usize, muted: bool) -> Result<Vec<StoreChange>, ClientError> {
        let slot = self
            .device
            .muted
            .get_mut(track)
            .ok_or(ClientError::rejected("track", track))?;
        if *slot == muted {
            return Ok(Vec::new());
        }
        *slot = muted;
        Ok(vec![StoreChange::Mute { track, muted }])
    }

    pub fn set_pad_sample(
        &mut self,
        pad: usize,
        sample: Option<PadSample>,
    ) -> Result<Vec<StoreChange>, ClientError> {
        if !self.layout.has_pad(pad) {
            return Err(ClientError::rejected("pad", pad));
        }
        Ok(if self.replace_pad_sample(pad, sample) {
            vec![StoreChange::PadSample { pad }]
        } else {
            Vec::new()
        })
    }

    fn replace_pad_sample(&mut self, pad: usize, sample: Option<PadSample>) -> bool {
        let slot = &mut self.device.pad_samples[pad];
        if *slot == sample {
            return false;
        }
        *slot = sample;
        true
    }

    fn check_cell(&self, track: usize, step: usize) -> Result<(), ClientError> {
        if !self.layout.has_track(track) {
            return Err(ClientError::rejected("track", track));
        }
        if !self.layout.has_step(step) {
            return Err(ClientError::rejected("step", step));
        }
        Ok(())
    }
}

fn pad_sample_from_slot(slot: &SampleSlot) -> Option<PadSample> {
    match (slot.loaded, &slot.name) {
        (Some(true), Some(name)) if !name.is_empty() => Some(PadSample {
            filename: name.clone(),
            size_bytes: slot.size.unwrap_or(0),
            format: normalize_format(slot.format.as_deref(), name),
            quality: slot
                .quality
                .clone()
                .unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
        }),
        _ => None,
    }
}
