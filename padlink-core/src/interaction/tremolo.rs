//! Per-pad trigger and tremolo sessions.
//!
//! Pointer: `Idle -> Pressed -> (arm expires) Tremolo -> Idle`. The press
//! fires one trigger; if the pad is still held when the arm timer expires it
//! retriggers on a fixed interval until released.
//!
//! Keyboard: fires immediately, then retriggers on an interval that shrinks
//! the longer the key is held. Key auto-repeat is ignored.
//!
//! A pad has at most one session. Starting either kind tears down whatever
//! was running on that pad first, and release always leaves no timers behind.

use std::time::Duration;

use padlink_types::TimerId;

use crate::config::Timing;
use crate::context::{Ctx, TimerEvent};
use crate::notice::Notice;

/// Velocity of pad triggers fired from the surface.
pub const TRIGGER_VELOCITY: u8 = 127;

const KEY_INTERVAL_START_MS: f64 = 220.0;
const KEY_INTERVAL_FLOOR_MS: f64 = 60.0;
const KEY_RAMP: f64 = 0.93;
const KEY_RAMP_STEP_MS: f64 = 200.0;

/// Retrigger interval of a keyboard tremolo that has been held for `elapsed`.
pub fn keyboard_interval(elapsed: Duration) -> Duration {
    let steps = elapsed.as_millis() as f64 / KEY_RAMP_STEP_MS;
    let ms = (KEY_INTERVAL_START_MS * KEY_RAMP.powf(steps))
        .round()
        .max(KEY_INTERVAL_FLOOR_MS);
    Duration::from_millis(ms as u64)
}

/// Visual flags of one pad.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PadVisual {
    pub pressed: bool,
    pub tremolo: bool,
    pub keyboard: bool,
    /// Short brightness pulse on each tremolo retrigger.
    pub pulse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Pressed { arm: TimerId },
    Tremolo { tick: TimerId },
    KeyTremolo { tick: TimerId, started: Duration },
}

#[derive(Debug, Clone, Copy)]
struct PadMachine {
    phase: Phase,
    pulse: Option<TimerId>,
    visual: PadVisual,
}

impl Default for PadMachine {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            pulse: None,
            visual: PadVisual::default(),
        }
    }
}

pub struct PadTremolo {
    pads: Vec<PadMachine>,
    arm: Duration,
    interval: Duration,
    pulse: Duration,
}

impl PadTremolo {
    pub fn new(pads: usize, timing: &Timing) -> Self {
        Self {
            pads: vec![PadMachine::default(); pads],
            arm: timing.tremolo_arm,
            interval: timing.tremolo_interval,
            pulse: timing.pulse,
        }
    }

    pub fn visual(&self, pad: usize) -> PadVisual {
        self.pads.get(pad).map(|m| m.visual).unwrap_or_default()
    }

    /// Pointer down. Caller has validated `pad`.
    pub fn press(&mut self, ctx: &mut Ctx, pad: usize) {
        self.stop(ctx, pad);
        ctx.sink.send_trigger(pad, TRIGGER_VELOCITY);
        let arm = ctx.timers.schedule(self.arm, TimerEvent::TremoloArm { pad });
        let machine = &mut self.pads[pad];
        machine.phase = Phase::Pressed { arm };
        machine.visual.pressed = true;
        let visual = machine.visual;
        ctx.notify(Notice::PadVisual { pad, visual });
    }

    /// Pointer up or leave. Idempotent.
    pub fn release(&mut self, ctx: &mut Ctx, pad: usize) {
        self.stop(ctx, pad);
    }

    /// Pad key down. Repeats while a keyboard session runs are ignored.
    pub fn key_down(&mut self, ctx: &mut Ctx, pad: usize) {
        if matches!(self.pads[pad].phase, Phase::KeyTremolo { .. }) {
            return;
        }
        self.stop(ctx, pad);
        let started = ctx.now();
        let tick = self.key_tick(ctx, pad, started);
        let machine = &mut self.pads[pad];
        machine.phase = Phase::KeyTremolo { tick, started };
        machine.visual.pressed = true;
        machine.visual.keyboard = true;
        let visual = machine.visual;
        ctx.notify(Notice::PadVisual { pad, visual });
    }

    /// Pad key up. Leaves a pointer session alone.
    pub fn key_up(&mut self, ctx: &mut Ctx, pad: usize) {
        if matches!(self.pads[pad].phase, Phase::KeyTremolo { .. }) {
            self.stop(ctx, pad);
        }
    }

    pub fn on_timer(&mut self, ctx: &mut Ctx, event: &TimerEvent) {
        match *event {
            TimerEvent::TremoloArm { pad } => {
                if !matches!(self.pads[pad].phase, Phase::Pressed { .. }) {
                    return;
                }
                let tick = ctx
                    .timers
                    .schedule(self.interval, TimerEvent::TremoloTick { pad });
                let machine = &mut self.pads[pad];
                machine.phase = Phase::Tremolo { tick };
                machine.visual.tremolo = true;
                let visual = machine.visual;
                ctx.notify(Notice::PadVisual { pad, visual });
            }
            TimerEvent::TremoloTick { pad } => {
                if !matches!(self.pads[pad].phase, Phase::Tremolo { .. }) {
                    return;
                }
                ctx.sink.send_trigger(pad, TRIGGER_VELOCITY);
                self.start_pulse(ctx, pad);
                let tick = ctx
                    .timers
                    .schedule(self.interval, TimerEvent::TremoloTick { pad });
                self.pads[pad].phase = Phase::Tremolo { tick };
            }
            TimerEvent::KeyTremoloTick { pad } => {
                let Phase::KeyTremolo { started, .. } = self.pads[pad].phase else {
                    return;
                };
                let tick = self.key_tick(ctx, pad, started);
                self.pads[pad].phase = Phase::KeyTremolo { tick, started };
            }
            TimerEvent::PulseEnd { pad } => {
                let machine = &mut self.pads[pad];
                machine.pulse = None;
                if machine.visual.pulse {
                    machine.visual.pulse = false;
                    let visual = machine.visual;
                    ctx.notify(Notice::PadVisual { pad, visual });
                }
            }
            _ => {}
        }
    }

    /// Tear down every pad's session.
    pub fn stop_all(&mut self, ctx: &mut Ctx) {
        for pad in 0..self.pads.len() {
            self.stop(ctx, pad);
        }
    }

    /// Fire one keyboard retrigger and schedule the next one.
    fn key_tick(&mut self, ctx: &mut Ctx, pad: usize, started: Duration) -> TimerId {
        ctx.sink.send_trigger(pad, TRIGGER_VELOCITY);
        self.start_pulse(ctx, pad);
        let elapsed = ctx.now().saturating_sub(started);
        ctx.timers.schedule(
            keyboard_interval(elapsed),
            TimerEvent::KeyTremoloTick { pad },
        )
    }

    fn start_pulse(&mut self, ctx: &mut Ctx, pad: usize) {
        let machine = &mut self.pads[pad];
        if let Some(old) = machine.pulse.take() {
            ctx.timers.cancel(old);
        }
        machine.pulse = Some(ctx.timers.schedule(self.pulse, TimerEvent::PulseEnd { pad }));
        if !machine.visual.pulse {
            machine.visual.pulse = true;
            let visual = machine.visual;
            ctx.notify(Notice::PadVisual { pad, visual });
        }
    }

    fn stop(&mut self, ctx: &mut Ctx, pad: usize) {
        let machine = &mut self.pads[pad];
        match machine.phase {
            Phase::Idle => {}
            Phase::Pressed { arm } => {
                ctx.timers.cancel(arm);
            }
            Phase::Tremolo { tick } | Phase::KeyTremolo { tick, .. } => {
                ctx.timers.cancel(tick);
            }
        }
        machine.phase = Phase::Idle;
        if let Some(pulse) = machine.pulse.take() {
            ctx.timers.cancel(pulse);
        }
        if machine.visual != PadVisual::default() {
            machine.visual = PadVisual::default();
            ctx.notify(Notice::PadVisual {
                pad,
                visual: PadVisual::default(),
            });
        }
    }
}
