mod common;

use std::collections::HashSet;

use common::{ms, Harness};
use padlink_core::{
    ClientError, ControlSurface, Input, KeyCode, KeyEvent, Modifiers, Notice, PadVisual,
    Selection, StoreChange,
};
use padlink_net::LinkTimer;
use serde_json::json;

fn pattern_push(index: usize, active: &[(usize, usize)]) -> serde_json::Value {
    let mut push = json!({ "type": "pattern", "index": index });
    for track in 0..8 {
        let row: Vec<u8> = (0..16)
            .map(|step| u8::from(active.contains(&(track, step))))
            .collect();
        push[track.to_string()] = json!(row);
    }
    push
}

fn store_changes(notices: &[Notice]) -> Vec<StoreChange> {
    notices
        .iter()
        .filter_map(|n| match n {
            Notice::Store(change) => Some(change.clone()),
            _ => None,
        })
        .collect()
}

// --- sequencer ---

#[test]
fn pattern_push_overrides_optimistic_step() {
    let mut h = Harness::connected();
    h.session.handle(Input::StepClick { track: 0, step: 3 }).unwrap();

    let grid = h.session.store().active_grid().unwrap();
    assert!(grid.is_active(0, 3));
    let sent = h.wire.sent("setStep");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["track"], 0);
    assert_eq!(sent[0]["step"], 3);
    assert_eq!(sent[0]["active"], true);

    // The device never applied it.
    h.push(pattern_push(0, &[(1, 1)]));
    let grid = h.session.store().active_grid().unwrap();
    assert!(!grid.is_active(0, 3));
    assert!(grid.is_active(1, 1));
}

#[test]
fn step_click_selects_the_cell() {
    let mut h = Harness::connected();
    h.session.handle(Input::StepClick { track: 2, step: 7 }).unwrap();
    assert_eq!(
        h.session.selection(),
        Selection::Cell {
            track: 2,
            step: 7,
            pattern: 0
        }
    );
    h.session.handle(Input::StepClick { track: 2, step: 7 }).unwrap();
    assert!(!h.session.store().active_grid().unwrap().is_active(2, 7));
    assert_eq!(h.wire.sent("setStep").len(), 2);
}

#[test]
fn velocity_presets_edit_the_selected_cell() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectCell { track: 1, step: 4 }).unwrap();
    h.session.handle(Input::KeyDown(KeyEvent::char('z'))).unwrap();
    assert_eq!(h.session.store().active_grid().unwrap().velocity(1, 4), Some(40));
    let sent = h.wire.sent("setStepVelocity");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["velocity"], 40);

    h.session.handle(Input::KeyDown(KeyEvent::key(KeyCode::Up))).unwrap();
    assert_eq!(h.session.store().active_grid().unwrap().velocity(1, 4), Some(50));
}

#[test]
fn velocity_edit_without_cell_is_refused() {
    let mut h = Harness::connected();
    let err = h.session.handle(Input::SetVelocity(90)).unwrap_err();
    assert!(matches!(err, ClientError::NothingSelected(_)));
    assert!(h.wire.sent("setStepVelocity").is_empty());
}

#[test]
fn velocity_from_another_client_updates_the_grid() {
    let mut h = Harness::connected();
    h.push(json!({ "type": "stepVelocitySet", "track": 3, "step": 2, "velocity": 64 }));
    assert_eq!(h.session.store().active_grid().unwrap().velocity(3, 2), Some(64));
}

// --- device state ---

#[test]
fn identical_state_push_notifies_once() {
    let mut h = Harness::connected();
    let state = json!({
        "type": "state", "tempo": 128, "sequencerVolume": 60, "liveVolume": 80,
        "playing": true, "trackMuted": [0, 1, 0, 0, 0, 0, 0, 0]
    });
    h.push(state.clone());
    assert!(!store_changes(&h.recorder.take()).is_empty());
    h.push(state);
    assert!(store_changes(&h.recorder.take()).is_empty());
    // Every state push is followed by a pattern fetch.
    assert_eq!(h.wire.sent("getPattern").len(), 2);
}

#[test]
fn junk_frames_leave_the_store_alone() {
    let mut h = Harness::connected();
    h.wire.push_text("{\"type\": \"state\", \"tempo\":");
    h.wire.push_json(json!({ "type": "audioData", "spectrum": [1, 2, 3] }));
    h.wire.push_json(json!({ "type": "step", "step": "four" }));
    h.wire.push_json(json!({ "tempo": 90 }));
    h.push(json!({ "type": "step", "step": 2 }));

    assert_eq!(
        store_changes(&h.recorder.take()),
        vec![StoreChange::CurrentStep { previous: None, current: 2 }]
    );
    assert_eq!(h.session.store().device().tempo, 120);
    assert!(h.session.is_connected());
    assert!(h.wire.sent_cmds().is_empty());
}

#[test]
fn tempo_push_leaves_other_fields_alone() {
    let mut h = Harness::connected();
    h.push(json!({
        "type": "state", "sequencerVolume": 60, "liveVolume": 80,
        "trackMuted": [true, false], "loopActive": [false, true]
    }));
    h.recorder.take();
    h.push(json!({ "type": "state", "tempo": 120 }));

    let device = h.session.store().device();
    assert_eq!(device.sequencer_volume, 60);
    assert_eq!(device.live_volume, 80);
    assert!(device.is_muted(0));
    assert!(device.loop_state(1).active);
    // 120 is already the default tempo.
    assert!(store_changes(&h.recorder.take()).is_empty());
}

#[test]
fn playhead_reports_previous_column() {
    let mut h = Harness::connected();
    h.push(json!({ "type": "step", "step": 4 }));
    h.push(json!({ "type": "step", "step": 5 }));
    let changes = store_changes(&h.recorder.take());
    assert_eq!(
        changes,
        vec![
            StoreChange::CurrentStep { previous: None, current: 4 },
            StoreChange::CurrentStep { previous: Some(4), current: 5 },
        ]
    );
    h.push(json!({ "type": "step", "step": 99 }));
    assert_eq!(h.session.store().current_step(), Some(5));
}

#[test]
fn pad_push_flashes_for_a_while() {
    let mut h = Harness::connected();
    h.push(json!({ "type": "pad", "pad": 2 }));
    assert_eq!(h.recorder.take(), vec![Notice::PadFlash { pad: 2, lit: true }]);
    h.wait(599);
    assert!(h.recorder.take().is_empty());
    h.wait(1);
    assert_eq!(h.recorder.take(), vec![Notice::PadFlash { pad: 2, lit: false }]);
}

#[test]
fn transport_keys_predict_and_send() {
    let mut h = Harness::connected();
    h.session.handle(Input::KeyDown(KeyEvent::char(' '))).unwrap();
    assert!(h.session.store().device().playing);
    h.session.handle(Input::KeyDown(KeyEvent::char(']'))).unwrap();
    assert_eq!(h.session.store().device().tempo, 125);
    h.session.handle(Input::SetTempo(500)).unwrap();
    assert_eq!(h.session.store().device().tempo, 300);
    h.session.handle(Input::KeyDown(KeyEvent::char('a'))).unwrap();
    assert_eq!(h.session.store().device().sequencer_volume, 70);
    assert_eq!(
        h.wire.sent_cmds(),
        vec!["start", "tempo", "tempo", "setSequencerVolume"]
    );
    assert_eq!(h.wire.sent("tempo")[1]["value"], 300);
}

#[test]
fn pattern_keys_select_then_fetch() {
    let mut h = Harness::connected();
    h.session.handle(Input::KeyDown(KeyEvent::char('e'))).unwrap();
    assert_eq!(h.session.store().active_pattern(), 2);
    assert_eq!(h.wire.sent("selectPattern")[0]["index"], 2);
    h.wait(100);
    // A newer selection replaces the pending fetch.
    h.session.handle(Input::KeyDown(KeyEvent::char('b'))).unwrap();
    assert_eq!(h.session.store().active_pattern(), 1);
    h.wait(100);
    assert!(h.wire.sent("getPattern").is_empty());
    h.wait(50);
    assert_eq!(h.wire.sent("getPattern").len(), 1);
}

#[test]
fn shift_pad_key_toggles_mute() {
    let mut h = Harness::connected();
    let shifted = KeyEvent::new(KeyCode::Char('4'), Modifiers::shift());
    h.session.handle(Input::KeyDown(shifted)).unwrap();
    assert!(h.session.store().device().is_muted(3));
    let sent = h.wire.sent("mute");
    assert_eq!(sent[0]["track"], 3);
    assert_eq!(sent[0]["value"], true);
    assert!(h.wire.triggers().is_empty());
}

// --- pads ---

#[test]
fn pointer_tremolo_starts_after_arm_and_stops_on_release() {
    let mut h = Harness::connected();
    h.session.handle(Input::PadPress(0)).unwrap();
    assert_eq!(h.wire.triggers(), vec![vec![0x90, 0, 127]]);
    h.wait(299);
    assert_eq!(h.wire.triggers().len(), 1);
    h.wait(1);
    assert!(h.session.pad_visual(0).tremolo);
    h.wait(180);
    assert_eq!(h.wire.triggers().len(), 2);
    assert!(h.session.pad_visual(0).pulse);
    h.wait(180 * 3);
    assert_eq!(h.wire.triggers().len(), 5);

    h.session.handle(Input::PadRelease(0)).unwrap();
    assert_eq!(h.session.pad_visual(0), PadVisual::default());
    let pad_timers = h
        .session
        .timers()
        .count(|e| e.tremolo_pad() == Some(0));
    assert_eq!(pad_timers, 0);
    h.wait(2000);
    assert_eq!(h.wire.triggers().len(), 5);
}

#[test]
fn quick_tap_fires_once() {
    let mut h = Harness::connected();
    h.session.handle(Input::PadPress(5)).unwrap();
    h.wait(100);
    h.session.handle(Input::PadRelease(5)).unwrap();
    h.wait(1000);
    assert_eq!(h.wire.triggers(), vec![vec![0x90, 5, 127]]);
}

#[test]
fn tremolo_teardown_leaves_no_timers() {
    let mut h = Harness::connected();
    let steps: [(Input, u64); 8] = [
        (Input::PadPress(1), 10),
        (Input::PadPress(1), 400),
        (Input::KeyDown(KeyEvent::char('2')), 250),
        (Input::PadPress(1), 500),
        (Input::KeyUp(KeyEvent::char('2')), 30),
        (Input::KeyDown(KeyEvent::char('2')), 700),
        (Input::PadRelease(1), 0),
        (Input::PadRelease(1), 0),
    ];
    for (input, wait) in steps {
        h.session.handle(input).unwrap();
        h.wait(wait);
    }
    assert_eq!(h.session.timers().count(|e| e.tremolo_pad() == Some(1)), 0);
    let fired = h.wire.triggers().len();
    h.wait(5000);
    assert_eq!(h.wire.triggers().len(), fired);
}

#[test]
fn keyboard_tremolo_speeds_up_and_ignores_repeat() {
    let mut h = Harness::connected();
    h.session.handle(Input::KeyDown(KeyEvent::char('1'))).unwrap();
    assert_eq!(h.wire.triggers().len(), 1);
    assert!(h.session.pad_visual(0).keyboard);
    h.session
        .handle(Input::KeyDown(KeyEvent::char('1').repeat()))
        .unwrap();
    assert_eq!(h.wire.triggers().len(), 1);

    h.wait(220);
    assert_eq!(h.wire.triggers().len(), 2);
    // 220ms in, the interval has shrunk to 203ms.
    h.wait(202);
    assert_eq!(h.wire.triggers().len(), 2);
    h.wait(1);
    assert_eq!(h.wire.triggers().len(), 3);

    h.session.handle(Input::KeyUp(KeyEvent::char('1'))).unwrap();
    assert_eq!(h.session.timers().count(|e| e.tremolo_pad() == Some(0)), 0);
}

#[test]
fn pad_keys_are_ignored_in_cell_mode() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectCell { track: 0, step: 0 }).unwrap();
    h.session.handle(Input::KeyDown(KeyEvent::char('1'))).unwrap();
    assert!(h.wire.triggers().is_empty());
}

#[test]
fn triggers_are_dropped_while_disconnected() {
    let mut h = Harness::connected();
    h.wire.break_connection();
    h.wait(0);
    assert!(!h.session.is_connected());
    h.session.handle(Input::PadPress(0)).unwrap();
    h.session.handle(Input::PadRelease(0)).unwrap();
    assert!(h.wire.triggers().is_empty());
}

// --- selection ---

#[test]
fn selection_modes_are_exclusive() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectCell { track: 1, step: 1 }).unwrap();
    h.session.handle(Input::SelectTrack(4)).unwrap();
    assert_eq!(h.session.selection(), Selection::Track(4));
    h.session.handle(Input::SelectPad(2)).unwrap();
    assert_eq!(h.session.selection(), Selection::Pad(2));
    h.session.handle(Input::KeyDown(KeyEvent::key(KeyCode::Escape))).unwrap();
    assert_eq!(h.session.selection(), Selection::None);

    let selections: Vec<Selection> = h
        .recorder
        .take()
        .into_iter()
        .filter_map(|n| match n {
            Notice::Selection(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(selections.len(), 4);
    assert!(h.session.handle(Input::SelectTrack(8)).is_err());
}

#[test]
fn cell_navigation_wraps() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectCell { track: 0, step: 15 }).unwrap();
    h.session.handle(Input::KeyDown(KeyEvent::char('.'))).unwrap();
    assert_eq!(
        h.session.selection(),
        Selection::Cell { track: 0, step: 0, pattern: 0 }
    );
    h.session.handle(Input::KeyDown(KeyEvent::char(','))).unwrap();
    assert_eq!(
        h.session.selection(),
        Selection::Cell { track: 0, step: 15, pattern: 0 }
    );
    let up = KeyEvent::new(KeyCode::Char('-'), Modifiers::shift());
    h.session.handle(Input::KeyDown(up)).unwrap();
    assert_eq!(
        h.session.selection(),
        Selection::Cell { track: 7, step: 15, pattern: 0 }
    );
    let down = KeyEvent::new(KeyCode::Char('+'), Modifiers::shift());
    h.session.handle(Input::KeyDown(down)).unwrap();
    assert_eq!(
        h.session.selection(),
        Selection::Cell { track: 0, step: 15, pattern: 0 }
    );
    // Live volume keys do nothing in cell mode without shift.
    h.session.handle(Input::KeyDown(KeyEvent::char('-'))).unwrap();
    assert!(h.wire.sent("setLiveVolume").is_empty());
}

#[test]
fn cell_selection_drops_when_pattern_changes() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectCell { track: 3, step: 3 }).unwrap();
    h.push(json!({ "type": "state", "pattern": 4 }));
    assert_eq!(h.session.selection(), Selection::None);
    let err = h.session.handle(Input::SetVelocity(10)).unwrap_err();
    assert!(matches!(err, ClientError::NothingSelected(_)));
}

// --- filters ---

#[test]
fn held_filter_key_sends_once_per_window() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectTrack(2)).unwrap();
    for _ in 0..5 {
        h.session.handle(Input::KeyDown(KeyEvent::key(KeyCode::F(1)))).unwrap();
        h.wait(50);
    }
    let sent = h.wire.sent("setTrackFilter");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["track"], 2);
    assert_eq!(sent[0]["type"], 1);
    assert_eq!(sent[0]["cutoff"], 300.0);
    assert!(sent[0].get("gain").is_none());
    assert!(h
        .recorder
        .all()
        .contains(&Notice::Toast("Track 3: Low Pass 300Hz Q5".into())));

    h.wait(400);
    h.session.handle(Input::KeyDown(KeyEvent::key(KeyCode::F(1)))).unwrap();
    assert_eq!(h.wire.sent("setTrackFilter").len(), 2);
}

#[test]
fn different_preset_goes_out_immediately() {
    let mut h = Harness::connected();
    h.session.handle(Input::SelectPad(1)).unwrap();
    h.session.handle(Input::FilterPreset(4)).unwrap();
    h.session.handle(Input::FilterPreset(9)).unwrap();
    let cmds = h.wire.sent_cmds();
    assert_eq!(cmds, vec!["setPadFilter", "clearPadFilter"]);
    assert_eq!(h.wire.sent("setPadFilter")[0]["gain"], 10.0);
}

#[test]
fn filter_needs_track_or_pad() {
    let mut h = Harness::connected();
    let err = h.session.handle(Input::FilterPreset(0)).unwrap_err();
    assert!(matches!(err, ClientError::NothingSelected(_)));
    h.session.handle(Input::SelectTrack(0)).unwrap();
    assert!(h.session.handle(Input::FilterPreset(10)).is_err());
    assert!(h.wire.sent_cmds().is_empty());
}

#[test]
fn filter_acks_update_indicator() {
    let mut h = Harness::connected();
    h.push(json!({ "type": "padFilterSet", "pad": 3, "activeFilters": 2 }));
    assert!(h.recorder.take().iter().any(|n| matches!(
        n,
        Notice::FilterIndicator { active_filters: 2, .. }
    )));
}

// --- samples ---

#[test]
fn request_all_staggers_and_reschedules_remaining() {
    let mut h = Harness::connected();
    h.session.refresh_samples().unwrap();
    h.wait(0);
    assert_eq!(h.wire.sent("getSamples").len(), 1);
    h.wait(160);
    assert_eq!(h.wire.sent("getSamples").len(), 3);
    assert_eq!(h.session.catalog().batch_remaining(), 5);

    h.wait(40);
    h.session.refresh_samples().unwrap();
    h.wait(0);
    assert_eq!(h.wire.sent("getSamples").len(), 4);
    h.wait(79);
    assert_eq!(h.wire.sent("getSamples").len(), 4);
    h.wait(1);
    assert_eq!(h.wire.sent("getSamples").len(), 5);
    h.wait(1000);

    let families: Vec<String> = h
        .wire
        .sent("getSamples")
        .iter()
        .map(|v| v["family"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(families.len(), 8);
    assert_eq!(families.iter().collect::<HashSet<_>>().len(), 8);
    assert_eq!(h.session.catalog().batch_remaining(), 0);
}

#[test]
fn request_all_needs_an_open_link() {
    let mut h = Harness::connected();
    h.wire.break_connection();
    h.wait(0);
    assert!(matches!(
        h.session.refresh_samples(),
        Err(ClientError::TransportUnavailable)
    ));
}

#[test]
fn sample_list_opens_selector_sorted() {
    let mut h = Harness::connected();
    h.session.open_selector(1).unwrap();
    let sent = h.wire.sent("getSamples");
    assert_eq!(sent[0]["family"], "SD");
    assert_eq!(sent[0]["pad"], 1);
    // Already pending: no second request.
    h.session.open_selector(1).unwrap();
    assert_eq!(h.wire.sent("getSamples").len(), 1);

    h.push(json!({
        "type": "sampleList", "family": "SD", "pad": 1,
        "samples": [
            { "name": "snare_b.wav", "size": 2048, "rate": 44100 },
            { "name": "snare_a.raw", "size": 1024, "channels": 2 }
        ]
    }));
    let notices = h.recorder.take();
    let names: Vec<String> = notices
        .iter()
        .find_map(|n| match n {
            Notice::SampleSelector { pad: 1, samples, .. } => {
                Some(samples.iter().map(|s| s.name.clone()).collect())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(names, vec!["snare_a.raw", "snare_b.wav"]);
    assert_eq!(h.session.catalog().samples("SD")[0].format, "RAW");
    assert!(!h.session.catalog().is_pending("SD", h.now()));
}

#[test]
fn empty_listing_reports_no_samples() {
    let mut h = Harness::connected();
    h.session.open_selector(4).unwrap();
    h.push(json!({ "type": "sampleList", "family": "CP", "pad": 4, "samples": [] }));
    assert!(h
        .recorder
        .take()
        .contains(&Notice::NoSamples { family: "CP".into() }));
    assert!(h.session.catalog().samples("CP").is_empty());
}

#[test]
fn list_bursts_render_once() {
    let mut h = Harness::connected();
    for family in ["BD", "SD", "CH"] {
        h.push(json!({
            "type": "sampleList", "family": family,
            "samples": [{ "name": format!("{}1.wav", family.to_lowercase()) }]
        }));
        h.wait(30);
    }
    h.wait(60);
    let renders: Vec<Notice> = h
        .recorder
        .take()
        .into_iter()
        .filter(|n| matches!(n, Notice::CatalogRendered(_)))
        .collect();
    assert_eq!(renders.len(), 1);
    match &renders[0] {
        Notice::CatalogRendered(rows) => {
            let families: Vec<&str> = rows.iter().map(|r| r.entry.family.as_str()).collect();
            assert_eq!(families, vec!["BD", "CH", "SD"]);
        }
        _ => unreachable!(),
    }
}

#[test]
fn staggered_list_replies_render_once_when_quiet() {
    let mut h = Harness::connected();
    let families = ["BD", "SD", "CH", "OH", "CP", "RS", "CL", "CY"];
    let rendered = |h: &Harness| {
        h.recorder
            .all()
            .iter()
            .filter(|n| matches!(n, Notice::CatalogRendered(_)))
            .count()
    };
    for family in families {
        h.push(json!({
            "type": "sampleList", "family": family,
            "samples": [{ "name": format!("{}1.wav", family.to_lowercase()) }]
        }));
        h.wait(80);
    }
    // The burst spans 640ms, far past one redraw window.
    assert_eq!(rendered(&h), 0);

    h.wait(500);
    assert_eq!(rendered(&h), 1);
    let rows = h
        .recorder
        .all()
        .into_iter()
        .find_map(|n| match n {
            Notice::CatalogRendered(rows) => Some(rows),
            _ => None,
        })
        .unwrap();
    assert_eq!(rows.len(), families.len());
}

#[test]
fn active_flag_follows_live_pad_state() {
    let mut h = Harness::connected();
    h.push(json!({
        "type": "sampleList", "family": "BD",
        "samples": [{ "name": "kick1.wav" }, { "name": "kick2.wav" }]
    }));
    h.push(json!({
        "type": "state",
        "samples": [{ "pad": 0, "loaded": true, "filename": "kick2.wav", "size": 4096 }]
    }));
    h.wait(200);
    h.recorder.take();

    h.session.set_sample_filter(padlink_core::SampleFilter {
        active_only: true,
        ..Default::default()
    });
    let rows = h
        .recorder
        .take()
        .into_iter()
        .find_map(|n| match n {
            Notice::CatalogRendered(rows) => Some(rows),
            _ => None,
        })
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entry.name, "kick2.wav");
    assert!(rows[0].active);
}

#[test]
fn audition_triggers_after_load_confirmation() {
    let mut h = Harness::connected();
    h.session.audition("BD", "kick1.wav").unwrap();
    let load = h.wire.sent("loadSample");
    assert_eq!(load[0]["pad"], 0);
    assert_eq!(load[0]["filename"], "kick1.wav");

    h.wait(10);
    h.push(json!({ "type": "sampleLoaded", "pad": 0, "filename": "kick1.wav", "size": 2048 }));
    assert!(h
        .recorder
        .all()
        .contains(&Notice::Toast("Pad 1: kick1 loaded".into())));
    assert_eq!(h.session.pad_sample(0).unwrap().filename, "kick1.wav");
    h.wait(79);
    assert!(h.wire.triggers().is_empty());
    h.wait(1);
    assert_eq!(h.wire.triggers(), vec![vec![0x90, 0, 127]]);
    h.wait(1000);
    assert_eq!(h.wire.triggers().len(), 1);
}

#[test]
fn audition_falls_back_without_confirmation() {
    let mut h = Harness::connected();
    h.session.audition("CH", "hat.wav").unwrap();
    h.wait(349);
    assert!(h.wire.triggers().is_empty());
    h.wait(1);
    assert_eq!(h.wire.triggers(), vec![vec![0x90, 2, 127]]);
    assert!(h.session.audition("ZZ", "nope.wav").is_err());
}

// --- link ---

#[test]
fn nonzero_counts_cancel_inventory_retry() {
    let mut h = Harness::connected();
    assert!(h.session.link().has_timer(LinkTimer::InventoryRetry));
    h.push(json!({ "type": "sampleCounts", "BD": 12, "SD": "junk", "CH": -3 }));
    assert!(!h.session.link().has_timer(LinkTimer::InventoryRetry));
    let counts = h.recorder.take().into_iter().find_map(|n| match n {
        Notice::SampleCounts { total, counts } => Some((total, counts)),
        _ => None,
    });
    let (total, counts) = counts.unwrap();
    assert_eq!(total, 12);
    assert_eq!(counts[1], ("SD".to_string(), 0));
    h.wait(20_000);
    assert!(h.wire.sent("getSampleCounts").is_empty());
}

#[test]
fn zero_counts_keep_the_single_retry() {
    let mut h = Harness::connected();
    h.push(json!({ "type": "sampleCounts" }));
    h.wait(20_000);
    assert_eq!(h.wire.sent("getSampleCounts").len(), 1);
}

#[test]
fn disconnect_voids_pending_and_reconnects() {
    let mut h = Harness::connected();
    h.session.open_selector(0).unwrap();
    assert!(h.session.catalog().is_pending("BD", h.now()));
    h.wire.break_connection();
    h.wait(0);
    assert!(!h.session.catalog().is_pending("BD", h.now()));
    assert!(h.recorder.take().contains(&Notice::Connection { open: false }));

    h.wait(3000);
    assert!(h.session.is_connected());
    assert!(h.recorder.take().contains(&Notice::Connection { open: true }));
    h.wait(300);
    assert_eq!(h.wire.sent("init").len(), 1);
}

#[test]
fn shutdown_cancels_everything() {
    let mut h = Harness::connected();
    h.session.handle(Input::PadPress(0)).unwrap();
    h.session.handle(Input::KeyDown(KeyEvent::char('3'))).unwrap();
    h.session.refresh_samples().unwrap();
    h.session.handle(Input::SelectPattern(1)).unwrap();
    h.session.shutdown();
    assert!(h.session.timers().is_empty());
    assert!(!h.session.is_connected());
    h.wire.clear_sent();
    h.wait(10_000);
    assert!(h.wire.sent_cmds().is_empty());
    assert!(h.wire.triggers().is_empty());
    assert_eq!(h.session.now(), ms(12_000));
}
