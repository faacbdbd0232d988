//! Local interaction state: pad triggers, selection, cell editing and
//! filter shortcuts.
//!
//! The controller never waits for the device. Edits are applied to the
//! store optimistically and the matching command goes out on the link; the
//! next authoritative push wins if the two disagree.

mod filters;
mod keys;
mod selection;
mod tremolo;

use std::time::Duration;

use log::debug;

use padlink_net::Command;
use padlink_types::{
    DeviceStatePatch, TimerId, MAX_TEMPO, MAX_VELOCITY, MAX_VOLUME, MIN_TEMPO, MIN_VELOCITY,
};

use crate::config::Timing;
use crate::context::{Ctx, TimerEvent};
use crate::error::ClientError;
use crate::notice::Notice;

pub use filters::{FilterGate, FilterPreset, FilterTarget, FILTER_PRESETS};
pub use keys::{KeyAction, KeyCode, KeyEvent, KeyMap, Modifiers};
pub use selection::{wrap, Editor, Selection, VELOCITY_PRESETS};
pub use tremolo::{keyboard_interval, PadTremolo, PadVisual, TRIGGER_VELOCITY};

/// A user gesture handed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    PadPress(usize),
    PadRelease(usize),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// Click on a sequencer cell: toggles it and selects it.
    StepClick { track: usize, step: usize },
    SelectCell { track: usize, step: usize },
    SelectTrack(usize),
    SelectPad(usize),
    ClearSelection,
    SetVelocity(u8),
    FilterPreset(usize),
    TogglePlay,
    SetPlaying(bool),
    SetTempo(u16),
    SetSequencerVolume(u8),
    SetLiveVolume(u8),
    SelectPattern(usize),
    ToggleMute(usize),
    ToggleLoop(usize),
    PauseLoop(usize),
}

pub struct InteractionController {
    tremolo: PadTremolo,
    selection: Selection,
    filters: FilterGate,
    keys: KeyMap,
    pattern_fetch: Option<TimerId>,
    pattern_fetch_delay: Duration,
    flashes: Vec<Option<TimerId>>,
    flash: Duration,
}

impl InteractionController {
    pub fn new(pads: usize, pad_keys: Vec<char>, timing: &Timing) -> Self {
        Self {
            tremolo: PadTremolo::new(pads, timing),
            selection: Selection::None,
            filters: FilterGate::new(timing.filter_window),
            keys: KeyMap::new(pad_keys),
            pattern_fetch: None,
            pattern_fetch_delay: timing.pattern_fetch,
            flashes: vec![None; pads],
            flash: timing.flash,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn pad_visual(&self, pad: usize) -> PadVisual {
        self.tremolo.visual(pad)
    }

    pub fn handle(&mut self, ctx: &mut Ctx, input: &Input) -> Result<(), ClientError> {
        match *input {
            Input::PadPress(pad) => self.press_pad(ctx, pad),
            Input::PadRelease(pad) => self.release_pad(ctx, pad),
            Input::KeyDown(event) => self.key_down(ctx, &event),
            Input::KeyUp(event) => self.key_up(ctx, &event),
            Input::StepClick { track, step } => self.step_click(ctx, track, step),
            Input::SelectCell { track, step } => self.select_cell(ctx, track, step),
            Input::SelectTrack(track) => self.select_track(ctx, track),
            Input::SelectPad(pad) => self.select_pad(ctx, pad),
            Input::ClearSelection => {
                self.clear_selection(ctx);
                Ok(())
            }
            Input::SetVelocity(velocity) => self.set_cell_velocity(ctx, velocity),
            Input::FilterPreset(index) => self.apply_filter(ctx, index),
            Input::TogglePlay => {
                let playing = !ctx.store.device().playing;
                self.set_playing(ctx, playing);
                Ok(())
            }
            Input::SetPlaying(playing) => {
                self.set_playing(ctx, playing);
                Ok(())
            }
            Input::SetTempo(value) => {
                self.set_tempo(ctx, i32::from(value));
                Ok(())
            }
            Input::SetSequencerVolume(value) => {
                self.set_sequencer_volume(ctx, i32::from(value));
                Ok(())
            }
            Input::SetLiveVolume(value) => {
                self.set_live_volume(ctx, i32::from(value));
                Ok(())
            }
            Input::SelectPattern(index) => self.select_pattern(ctx, index),
            Input::ToggleMute(track) => self.toggle_mute(ctx, track),
            Input::ToggleLoop(track) => {
                self.loop_command(ctx, track, Command::ToggleLoop { track })
            }
            Input::PauseLoop(track) => self.loop_command(ctx, track, Command::PauseLoop { track }),
        }
    }

    pub fn on_timer(&mut self, ctx: &mut Ctx, id: TimerId, event: &TimerEvent) {
        match event {
            TimerEvent::FilterWindow { target } => self.filters.on_window_end(*target),
            TimerEvent::FlashEnd { pad } => {
                if self.flashes.get(*pad) == Some(&Some(id)) {
                    self.flashes[*pad] = None;
                    ctx.notify(Notice::PadFlash { pad: *pad, lit: false });
                }
            }
            TimerEvent::PatternFetch => {
                if self.pattern_fetch == Some(id) {
                    self.pattern_fetch = None;
                    ctx.sink.send(Command::GetPattern);
                }
            }
            other if other.tremolo_pad().is_some() => self.tremolo.on_timer(ctx, other),
            _ => {}
        }
    }

    /// Drop a selection the store no longer supports, e.g. a cell picked in
    /// a pattern that is no longer active.
    pub fn revalidate(&mut self, ctx: &mut Ctx) {
        if self
            .selection
            .is_stale(ctx.store.layout(), ctx.store.active_pattern())
        {
            debug!("Dropping stale selection {:?}", self.selection);
            self.set_selection(ctx, Selection::None);
        }
    }

    /// Stop every running timer owned by the controller.
    pub fn shutdown(&mut self, ctx: &mut Ctx) {
        self.tremolo.stop_all(ctx);
        self.filters.reset(ctx);
        if let Some(id) = self.pattern_fetch.take() {
            ctx.timers.cancel(id);
        }
        for flash in self.flashes.iter_mut() {
            if let Some(id) = flash.take() {
                ctx.timers.cancel(id);
            }
        }
    }

    // --- pads ---

    pub fn press_pad(&mut self, ctx: &mut Ctx, pad: usize) -> Result<(), ClientError> {
        check_pad(ctx, pad)?;
        self.tremolo.press(ctx, pad);
        Ok(())
    }

    pub fn release_pad(&mut self, ctx: &mut Ctx, pad: usize) -> Result<(), ClientError> {
        check_pad(ctx, pad)?;
        self.tremolo.release(ctx, pad);
        Ok(())
    }

    /// The device reported a hit on `pad`. A hit while lit restarts the flash.
    pub fn flash_pad(&mut self, ctx: &mut Ctx, pad: i64) -> Result<(), ClientError> {
        let pad = usize::try_from(pad)
            .ok()
            .filter(|p| *p < self.flashes.len())
            .ok_or(ClientError::Rejected { what: "pad", index: pad })?;
        match self.flashes[pad].take() {
            Some(previous) => {
                ctx.timers.cancel(previous);
            }
            None => ctx.notify(Notice::PadFlash { pad, lit: true }),
        }
        self.flashes[pad] = Some(ctx.timers.schedule(self.flash, TimerEvent::FlashEnd { pad }));
        Ok(())
    }

    // --- keyboard ---

    fn key_down(&mut self, ctx: &mut Ctx, event: &KeyEvent) -> Result<(), ClientError> {
        let cell_mode = self.selection.is_cell();
        let Some(action) = self
            .keys
            .key_down(event, cell_mode, !self.selection.is_none())
        else {
            return Ok(());
        };
        match action {
            KeyAction::ClearSelection => self.clear_selection(ctx),
            KeyAction::VelocityPreset(i) => {
                let velocity = VELOCITY_PRESETS[i.min(VELOCITY_PRESETS.len() - 1)];
                return self.set_cell_velocity(ctx, velocity);
            }
            KeyAction::VelocityBy(delta) => return self.nudge_cell_velocity(ctx, delta),
            KeyAction::TogglePlay => {
                let playing = !ctx.store.device().playing;
                self.set_playing(ctx, playing);
            }
            KeyAction::NextPattern => return self.step_pattern(ctx, 1),
            KeyAction::PrevPattern => return self.step_pattern(ctx, -1),
            KeyAction::SelectPattern(index) => {
                if ctx.store.layout().has_pattern(index) {
                    return self.select_pattern(ctx, index);
                }
            }
            KeyAction::TempoBy(delta) => {
                let tempo = i32::from(ctx.store.device().tempo) + delta;
                self.set_tempo(ctx, tempo);
            }
            KeyAction::SequencerVolumeBy(delta) => {
                let volume = i32::from(ctx.store.device().sequencer_volume) + delta;
                self.set_sequencer_volume(ctx, volume);
            }
            KeyAction::LiveVolumeBy(delta) => {
                let volume = i32::from(ctx.store.device().live_volume) + delta;
                self.set_live_volume(ctx, volume);
            }
            KeyAction::StepBy(delta) => return self.navigate_cell(ctx, 0, delta),
            KeyAction::TrackBy(delta) => return self.navigate_cell(ctx, delta, 0),
            KeyAction::FilterPreset(index) => return self.apply_filter(ctx, index),
            KeyAction::PadDown(pad) => {
                check_pad(ctx, pad)?;
                self.tremolo.key_down(ctx, pad);
            }
            KeyAction::PadUp(pad) => {
                check_pad(ctx, pad)?;
                self.tremolo.key_up(ctx, pad);
            }
            KeyAction::ToggleMute(track) => {
                if !event.is_repeat {
                    return self.toggle_mute(ctx, track);
                }
            }
        }
        Ok(())
    }

    fn key_up(&mut self, ctx: &mut Ctx, event: &KeyEvent) -> Result<(), ClientError> {
        if let Some(KeyAction::PadUp(pad)) = self.keys.key_up(event) {
            check_pad(ctx, pad)?;
            self.tremolo.key_up(ctx, pad);
        }
        Ok(())
    }

    // --- selection ---

    pub fn select_cell(
        &mut self,
        ctx: &mut Ctx,
        track: usize,
        step: usize,
    ) -> Result<(), ClientError> {
        check_cell(ctx, track, step)?;
        let pattern = ctx.store.active_pattern();
        self.set_selection(ctx, Selection::Cell { track, step, pattern });
        Ok(())
    }

    pub fn select_track(&mut self, ctx: &mut Ctx, track: usize) -> Result<(), ClientError> {
        if !ctx.store.layout().has_track(track) {
            return Err(ClientError::rejected("track", track));
        }
        self.set_selection(ctx, Selection::Track(track));
        Ok(())
    }

    pub fn select_pad(&mut self, ctx: &mut Ctx, pad: usize) -> Result<(), ClientError> {
        check_pad(ctx, pad)?;
        self.set_selection(ctx, Selection::Pad(pad));
        Ok(())
    }

    pub fn clear_selection(&mut self, ctx: &mut Ctx) {
        self.set_selection(ctx, Selection::None);
    }

    fn set_selection(&mut self, ctx: &mut Ctx, selection: Selection) {
        if self.selection == selection {
            return;
        }
        self.selection = selection;
        ctx.notify(Notice::Selection(selection));
    }

    /// Coordinates of the selected cell, dropping it first if it went stale.
    fn selected_cell(&mut self, ctx: &mut Ctx) -> Result<(usize, usize), ClientError> {
        let Selection::Cell { track, step, .. } = self.selection else {
            return Err(ClientError::NothingSelected("cell"));
        };
        if self
            .selection
            .is_stale(ctx.store.layout(), ctx.store.active_pattern())
        {
            self.set_selection(ctx, Selection::None);
            return Err(ClientError::StaleSelection);
        }
        Ok((track, step))
    }

    /// Move the cell selection, wrapping steps and tracks independently.
    fn navigate_cell(
        &mut self,
        ctx: &mut Ctx,
        tracks: isize,
        steps: isize,
    ) -> Result<(), ClientError> {
        let (track, step) = self.selected_cell(ctx)?;
        let layout = ctx.store.layout();
        let track = wrap(track, tracks, layout.tracks());
        let step = wrap(step, steps, layout.steps);
        self.select_cell(ctx, track, step)
    }

    // --- sequencer ---

    /// Flip one cell locally and tell the device. There is no rollback; a
    /// later pattern push corrects any divergence.
    pub fn toggle_step(
        &mut self,
        ctx: &mut Ctx,
        track: usize,
        step: usize,
    ) -> Result<(), ClientError> {
        check_cell(ctx, track, step)?;
        let active = !ctx
            .store
            .active_grid()
            .is_some_and(|grid| grid.is_active(track, step));
        let changes = ctx.store.set_step(track, step, active)?;
        ctx.publish(changes);
        ctx.sink.send(Command::SetStep { track, step, active });
        Ok(())
    }

    fn step_click(&mut self, ctx: &mut Ctx, track: usize, step: usize) -> Result<(), ClientError> {
        self.toggle_step(ctx, track, step)?;
        self.select_cell(ctx, track, step)
    }

    pub fn set_cell_velocity(&mut self, ctx: &mut Ctx, velocity: u8) -> Result<(), ClientError> {
        let (track, step) = self.selected_cell(ctx)?;
        let velocity = velocity.clamp(MIN_VELOCITY, MAX_VELOCITY);
        let changes = ctx.store.set_velocity(track, step, velocity)?;
        ctx.publish(changes);
        ctx.sink.send(Command::SetStepVelocity { track, step, velocity });
        Ok(())
    }

    fn nudge_cell_velocity(&mut self, ctx: &mut Ctx, delta: i32) -> Result<(), ClientError> {
        let (track, step) = self.selected_cell(ctx)?;
        let current = ctx
            .store
            .active_grid()
            .and_then(|grid| grid.velocity(track, step))
            .unwrap_or(MAX_VELOCITY);
        let velocity = (i32::from(current) + delta)
            .clamp(i32::from(MIN_VELOCITY), i32::from(MAX_VELOCITY));
        self.set_cell_velocity(ctx, velocity as u8)
    }

    pub fn select_pattern(&mut self, ctx: &mut Ctx, index: usize) -> Result<(), ClientError> {
        if !ctx.store.layout().has_pattern(index) {
            return Err(ClientError::rejected("pattern", index));
        }
        let changes = ctx.store.predict(&DeviceStatePatch {
            active_pattern: Some(index),
            ..DeviceStatePatch::default()
        });
        ctx.publish(changes);
        ctx.sink.send(Command::SelectPattern { index });
        if let Some(previous) = self.pattern_fetch.take() {
            ctx.timers.cancel(previous);
        }
        self.pattern_fetch = Some(
            ctx.timers
                .schedule(self.pattern_fetch_delay, TimerEvent::PatternFetch),
        );
        self.revalidate(ctx);
        Ok(())
    }

    fn step_pattern(&mut self, ctx: &mut Ctx, delta: isize) -> Result<(), ClientError> {
        let index = wrap(ctx.store.active_pattern(), delta, ctx.store.layout().patterns);
        self.select_pattern(ctx, index)
    }

    // --- transport and mixer ---

    pub fn set_playing(&mut self, ctx: &mut Ctx, playing: bool) {
        let changes = ctx.store.predict(&DeviceStatePatch::playing(playing));
        ctx.publish(changes);
        ctx.sink.send(if playing { Command::Start } else { Command::Stop });
    }

    /// Set the tempo, clamped to the device range.
    pub fn set_tempo(&mut self, ctx: &mut Ctx, tempo: i32) {
        let value = tempo.clamp(i32::from(MIN_TEMPO), i32::from(MAX_TEMPO)) as u16;
        let changes = ctx.store.predict(&DeviceStatePatch::tempo(value));
        ctx.publish(changes);
        ctx.sink.send(Command::Tempo { value });
    }

    pub fn set_sequencer_volume(&mut self, ctx: &mut Ctx, volume: i32) {
        let value = clamp_volume(volume);
        let changes = ctx.store.predict(&DeviceStatePatch {
            sequencer_volume: Some(value),
            ..DeviceStatePatch::default()
        });
        ctx.publish(changes);
        ctx.sink.send(Command::SetSequencerVolume { value });
    }

    pub fn set_live_volume(&mut self, ctx: &mut Ctx, volume: i32) {
        let value = clamp_volume(volume);
        let changes = ctx.store.predict(&DeviceStatePatch {
            live_volume: Some(value),
            ..DeviceStatePatch::default()
        });
        ctx.publish(changes);
        ctx.sink.send(Command::SetLiveVolume { value });
    }

    pub fn toggle_mute(&mut self, ctx: &mut Ctx, track: usize) -> Result<(), ClientError> {
        let muted = !ctx.store.device().is_muted(track);
        let changes = ctx.store.set_mute(track, muted)?;
        ctx.publish(changes);
        ctx.sink.send(Command::Mute { track, value: muted });
        Ok(())
    }

    /// Loop state is device-owned; the reply arrives as a `loopState` push.
    fn loop_command(
        &mut self,
        ctx: &mut Ctx,
        track: usize,
        command: Command,
    ) -> Result<(), ClientError> {
        if !ctx.store.layout().has_track(track) {
            return Err(ClientError::rejected("track", track));
        }
        ctx.sink.send(command);
        Ok(())
    }

    // --- filters ---

    /// Apply filter preset `index` (0-based) to the selected track or pad.
    pub fn apply_filter(&mut self, ctx: &mut Ctx, index: usize) -> Result<(), ClientError> {
        let target = self
            .selection
            .filter_target()
            .ok_or(ClientError::NothingSelected("track or pad"))?;
        self.filters.apply(ctx, target, index).map(|_| ())
    }
}

fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, i32::from(MAX_VOLUME)) as u8
}

fn check_pad(ctx: &Ctx, pad: usize) -> Result<(), ClientError> {
    if ctx.store.layout().has_pad(pad) {
        Ok(())
    } else {
        Err(ClientError::rejected("pad", pad))
    }
}

fn check_cell(ctx: &Ctx, track: usize, step: usize) -> Result<(), ClientError> {
    let layout = ctx.store.layout();
    if !layout.has_track(track) {
        return Err(ClientError::rejected("track", track));
    }
    if !layout.has_step(step) {
        return Err(ClientError::rejected("step", step));
    }
    Ok(())
}
