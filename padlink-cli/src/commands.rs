//! Line commands typed at the console.
//!
//! Pads, tracks, steps and patterns are numbered from 1 here, matching what
//! the console prints; they are converted to 0-based indices on parse.

use padlink_core::{Input, KeyCode, KeyEvent, Modifiers, SampleFilter};

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Input(Input),
    /// Key down immediately followed by key up.
    Tap(KeyEvent),
    /// Pad press immediately followed by release.
    Hit(usize),
    OpenSelector(usize),
    CloseSelector,
    Choose { pad: usize, name: String },
    Audition { family: String, name: String },
    RefreshSamples,
    SampleFilter(SampleFilter),
    ShowSamples,
    Panel(PanelCommand),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    List,
    Toggle(String),
    Move(String, usize),
    Tab(String),
}

pub const HELP: &str = "\
play | stop | tempo N | seqvol N | livevol N | pattern N
step T S | cell T S | track T | pad P | clear | velocity V | filter N
hit P | hold P | release P | mute T | loop T | pauseloop T
key K | keydown K | keyup K     (K: a, shift+4, space, esc, up, f1 ...)
samples | list P | close | load P NAME | audition FAMILY NAME | refresh
filter-samples [family=F] [format=F] [rate=N] [channels=N] [active]
panels | panel toggle NAME | panel move NAME N | tab NAME
status | help | quit";

pub fn parse(line: &str) -> Result<Line, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = words.collect();

    let line = match verb {
        "play" => Line::Input(Input::SetPlaying(true)),
        "stop" => Line::Input(Input::SetPlaying(false)),
        "toggle" => Line::Input(Input::TogglePlay),
        "tempo" => Line::Input(Input::SetTempo(number(&args, 0, "tempo")?)),
        "seqvol" => Line::Input(Input::SetSequencerVolume(number(&args, 0, "volume")?)),
        "livevol" => Line::Input(Input::SetLiveVolume(number(&args, 0, "volume")?)),
        "pattern" => Line::Input(Input::SelectPattern(ordinal(&args, 0, "pattern")?)),
        "step" => Line::Input(Input::StepClick {
            track: ordinal(&args, 0, "track")?,
            step: ordinal(&args, 1, "step")?,
        }),
        "cell" => Line::Input(Input::SelectCell {
            track: ordinal(&args, 0, "track")?,
            step: ordinal(&args, 1, "step")?,
        }),
        "track" => Line::Input(Input::SelectTrack(ordinal(&args, 0, "track")?)),
        "pad" => Line::Input(Input::SelectPad(ordinal(&args, 0, "pad")?)),
        "clear" => Line::Input(Input::ClearSelection),
        "velocity" => Line::Input(Input::SetVelocity(number(&args, 0, "velocity")?)),
        "filter" => Line::Input(Input::FilterPreset(ordinal(&args, 0, "filter preset")?)),
        "hit" => Line::Hit(ordinal(&args, 0, "pad")?),
        "hold" => Line::Input(Input::PadPress(ordinal(&args, 0, "pad")?)),
        "release" => Line::Input(Input::PadRelease(ordinal(&args, 0, "pad")?)),
        "mute" => Line::Input(Input::ToggleMute(ordinal(&args, 0, "track")?)),
        "loop" => Line::Input(Input::ToggleLoop(ordinal(&args, 0, "track")?)),
        "pauseloop" => Line::Input(Input::PauseLoop(ordinal(&args, 0, "track")?)),
        "key" => Line::Tap(key(&args)?),
        "keydown" => Line::Input(Input::KeyDown(key(&args)?)),
        "keyup" => Line::Input(Input::KeyUp(key(&args)?)),
        "samples" => Line::ShowSamples,
        "list" => Line::OpenSelector(ordinal(&args, 0, "pad")?),
        "close" => Line::CloseSelector,
        "load" => Line::Choose {
            pad: ordinal(&args, 0, "pad")?,
            name: rest(&args, 1, "sample name")?,
        },
        "audition" => Line::Audition {
            family: word(&args, 0, "family")?.to_ascii_uppercase(),
            name: rest(&args, 1, "sample name")?,
        },
        "refresh" => Line::RefreshSamples,
        "filter-samples" => Line::SampleFilter(sample_filter(&args)?),
        "panels" => Line::Panel(PanelCommand::List),
        "panel" => match word(&args, 0, "panel action")? {
            "toggle" => Line::Panel(PanelCommand::Toggle(word(&args, 1, "panel")?.to_string())),
            "move" => Line::Panel(PanelCommand::Move(
                word(&args, 1, "panel")?.to_string(),
                ordinal(&args, 2, "position")?,
            )),
            other => return Err(format!("unknown panel action '{}'", other)),
        },
        "tab" => Line::Panel(PanelCommand::Tab(word(&args, 0, "tab")?.to_string())),
        "status" => Line::Status,
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => return Err(format!("unknown command '{}', try help", other)),
    };
    Ok(line)
}

fn word<'a>(args: &[&'a str], i: usize, what: &str) -> Result<&'a str, String> {
    args.get(i).copied().ok_or_else(|| format!("missing {}", what))
}

fn rest(args: &[&str], from: usize, what: &str) -> Result<String, String> {
    if args.len() <= from {
        return Err(format!("missing {}", what));
    }
    Ok(args[from..].join(" "))
}

fn number<T: std::str::FromStr>(args: &[&str], i: usize, what: &str) -> Result<T, String> {
    let raw = word(args, i, what)?;
    raw.parse().map_err(|_| format!("bad {} '{}'", what, raw))
}

/// 1-based number from the console as a 0-based index.
fn ordinal(args: &[&str], i: usize, what: &str) -> Result<usize, String> {
    let n: usize = number(args, i, what)?;
    n.checked_sub(1)
        .ok_or_else(|| format!("{} numbers start at 1", what))
}

/// Parse `shift+4`, `space`, `esc`, `f3`, or a single character.
fn key(args: &[&str]) -> Result<KeyEvent, String> {
    let spec = word(args, 0, "key")?.to_ascii_lowercase();
    let mut modifiers = Modifiers::none();
    let mut name = spec.as_str();
    while let Some((prefix, tail)) = name.split_once('+').filter(|(_, t)| !t.is_empty()) {
        match prefix {
            "shift" => modifiers.shift = true,
            "ctrl" => modifiers.ctrl = true,
            "alt" => modifiers.alt = true,
            _ => break,
        }
        name = tail;
    }
    let code = match name {
        "space" => KeyCode::Char(' '),
        "esc" | "escape" => KeyCode::Escape,
        "enter" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backspace" => KeyCode::Backspace,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        f if f.len() > 1 && f.starts_with('f') => {
            let n: u8 = f[1..].parse().map_err(|_| format!("unknown key '{}'", spec))?;
            KeyCode::F(n)
        }
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(format!("unknown key '{}'", spec)),
            }
        }
    };
    Ok(KeyEvent::new(code, modifiers))
}

fn sample_filter(args: &[&str]) -> Result<SampleFilter, String> {
    let mut filter = SampleFilter::default();
    for arg in args {
        if *arg == "active" {
            filter.active_only = true;
            continue;
        }
        let Some((field, value)) = arg.split_once('=') else {
            return Err(format!("expected field=value, got '{}'", arg));
        };
        match field {
            "family" => filter.family = Some(value.to_ascii_uppercase()),
            "format" => filter.format = Some(value.to_string()),
            "rate" => {
                filter.rate = Some(value.parse().map_err(|_| format!("bad rate '{}'", value))?)
            }
            "channels" => {
                filter.channels =
                    Some(value.parse().map_err(|_| format!("bad channels '{}'", value))?)
            }
            other => return Err(format!("unknown filter field '{}'", other)),
        }
    }
    Ok(filter)
}
