//! Plain-text rendering of session notices.

use std::io::Write;

use padlink_core::{Notice, Observer, StateStore, StoreChange};

/// Prints notices worth a line. Playhead moves and pulse flicker are
/// skipped unless `verbose`.
pub struct Console<W: Write> {
    out: W,
    verbose: bool,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }
}

impl<W: Write> Observer for Console<W> {
    fn wants(&self, notice: &Notice) -> bool {
        self.verbose
            || !matches!(
                notice,
                Notice::Store(StoreChange::CurrentStep { .. })
                    | Notice::PadVisual { .. }
                    | Notice::PadFlash { .. }
            )
    }

    fn notify(&mut self, notice: &Notice, store: &StateStore) {
        if let Some(line) = describe(notice, store) {
            let _ = writeln!(self.out, "{}", line);
        }
    }
}

pub fn describe(notice: &Notice, store: &StateStore) -> Option<String> {
    let line = match notice {
        Notice::Store(change) => describe_change(change)?,
        Notice::PadVisual { pad, visual } => format!(
            "pad {}{}{}{}",
            pad + 1,
            if visual.pressed { " pressed" } else { " up" },
            if visual.tremolo || visual.keyboard { " tremolo" } else { "" },
            if visual.pulse { " *" } else { "" },
        ),
        Notice::PadFlash { pad, lit } => {
            format!("pad {} {}", pad + 1, if *lit { "hit" } else { "idle" })
        }
        Notice::Selection(selection) => match selection.editor() {
            Some(editor) => format!("selected: {:?}, {:?} editor open", selection, editor),
            None => "selection cleared".to_string(),
        },
        Notice::CatalogRendered(rows) => {
            let active = rows.iter().filter(|r| r.active).count();
            format!("library: {} samples shown, {} loaded", rows.len(), active)
        }
        Notice::SampleCounts { counts, total } => {
            let parts: Vec<String> = counts
                .iter()
                .map(|(family, n)| format!("{} {}", family, n))
                .collect();
            format!("{} samples on device ({})", total, parts.join(", "))
        }
        Notice::SampleSelector {
            pad,
            family,
            samples,
        } => {
            let current = store.device().pad_sample(*pad).map(|s| s.filename.as_str());
            let mut text = format!("{} samples for pad {}:", family, pad + 1);
            for sample in samples {
                let mark = if Some(sample.name.as_str()) == current { '*' } else { ' ' };
                text.push_str(&format!(
                    "\n {} {} ({:.1} KB, {})",
                    mark,
                    sample.name,
                    sample.size_kb(),
                    sample.format
                ));
            }
            text
        }
        Notice::NoSamples { family } => format!("no {} samples on device", family),
        Notice::FilterIndicator {
            target,
            active_filters,
        } => format!("{}: {} filter(s) active", target, active_filters),
        Notice::Connection { open: true } => "connected".to_string(),
        Notice::Connection { open: false } => "disconnected, retrying".to_string(),
        Notice::Toast(text) => text.clone(),
    };
    Some(line)
}

fn describe_change(change: &StoreChange) -> Option<String> {
    let line = match change {
        StoreChange::Tempo(bpm) => format!("tempo {}", bpm),
        StoreChange::SequencerVolume(v) => format!("sequencer volume {}", v),
        StoreChange::LiveVolume(v) => format!("live volume {}", v),
        StoreChange::Playing(true) => "playing".to_string(),
        StoreChange::Playing(false) => "stopped".to_string(),
        StoreChange::ActivePattern(i) => format!("pattern {}", i + 1),
        StoreChange::Mute { track, muted } => {
            format!("track {} {}", track + 1, if *muted { "muted" } else { "unmuted" })
        }
        StoreChange::Loop { track, state } => format!(
            "track {} loop {}{}",
            track + 1,
            if state.active { "on" } else { "off" },
            if state.paused { " (paused)" } else { "" }
        ),
        StoreChange::CurrentStep { current, .. } => format!("step {}", current + 1),
        StoreChange::Cell {
            track,
            step,
            active,
            ..
        } => format!(
            "track {} step {} {}",
            track + 1,
            step + 1,
            if *active { "on" } else { "off" }
        ),
        StoreChange::Velocity {
            track,
            step,
            velocity,
            ..
        } => format!("track {} step {} velocity {}", track + 1, step + 1, velocity),
        StoreChange::Pattern { index } => format!("pattern {} updated", index + 1),
        StoreChange::PadSample { .. } | StoreChange::Telemetry(_) => return None,
    };
    Some(line)
}

/// Multi-line summary for the `status` command.
pub fn status(store: &StateStore, connected: bool) -> String {
    let device = store.device();
    let mut text = format!(
        "{} | {} | tempo {} | seq vol {} | live vol {} | pattern {}",
        if connected { "online" } else { "offline" },
        if device.playing { "playing" } else { "stopped" },
        device.tempo,
        device.sequencer_volume,
        device.live_volume,
        device.active_pattern + 1
    );
    let layout = store.layout();
    for track in 0..layout.tracks() {
        let family = layout.family(track).unwrap_or("?");
        let row: String = (0..layout.steps)
            .map(|step| {
                let on = store.active_grid().is_some_and(|g| g.is_active(track, step));
                match (on, store.current_step() == Some(step)) {
                    (true, _) => 'x',
                    (false, true) => '|',
                    (false, false) => '.',
                }
            })
            .collect();
        let sample = device
            .pad_sample(track)
            .map(|s| s.display_name().to_string())
            .unwrap_or_default();
        text.push_str(&format!(
            "\n{:>2} {:<3} {} {}{}",
            track + 1,
            family,
            row,
            if device.is_muted(track) { "M " } else { "" },
            sample
        ));
    }
    text
}
