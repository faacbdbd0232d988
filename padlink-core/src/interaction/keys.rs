//! Keyboard shortcuts of the control surface.

/// Key codes for keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

/// Modifier key state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const fn none() -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: false,
        }
    }

    pub const fn shift() -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: true,
        }
    }
}

/// A key going down or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub modifiers: Modifiers,
    /// Auto-repeat from a held key.
    pub is_repeat: bool,
}

impl KeyEvent {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            key,
            modifiers,
            is_repeat: false,
        }
    }

    pub fn key(key: KeyCode) -> Self {
        Self::new(key, Modifiers::none())
    }

    pub fn char(c: char) -> Self {
        Self::key(KeyCode::Char(c))
    }

    pub fn repeat(mut self) -> Self {
        self.is_repeat = true;
        self
    }

    fn lower_char(&self) -> Option<char> {
        match self.key {
            KeyCode::Char(c) => Some(c.to_ascii_lowercase()),
            _ => None,
        }
    }
}

/// What a key resolves to, before the controller checks it against state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    ClearSelection,
    VelocityPreset(usize),
    VelocityBy(i32),
    TogglePlay,
    NextPattern,
    PrevPattern,
    SelectPattern(usize),
    TempoBy(i32),
    SequencerVolumeBy(i32),
    LiveVolumeBy(i32),
    StepBy(isize),
    TrackBy(isize),
    FilterPreset(usize),
    PadDown(usize),
    PadUp(usize),
    ToggleMute(usize),
}

const PATTERN_KEYS: [char; 6] = ['q', 'w', 'e', 'r', 't', 'y'];
const VELOCITY_KEYS: [char; 4] = ['z', 'x', 'c', 'v'];
const TEMPO_STEP: i32 = 5;
const VOLUME_STEP: i32 = 5;
const VELOCITY_STEP: i32 = 10;

/// Resolves keys to actions given the current selection mode.
#[derive(Debug, Clone)]
pub struct KeyMap {
    pad_keys: Vec<char>,
}

impl KeyMap {
    pub fn new(pad_keys: Vec<char>) -> Self {
        Self { pad_keys }
    }

    pub fn pad_for_key(&self, c: char) -> Option<usize> {
        let c = c.to_ascii_lowercase();
        self.pad_keys.iter().position(|k| *k == c)
    }

    /// Key down. `cell_mode` is true while a sequencer cell is selected;
    /// `selected` is true while anything is.
    pub fn key_down(&self, event: &KeyEvent, cell_mode: bool, selected: bool) -> Option<KeyAction> {
        let mods = event.modifiers;
        if mods.ctrl || mods.alt {
            return None;
        }
        match event.key {
            KeyCode::Escape if selected => return Some(KeyAction::ClearSelection),
            KeyCode::F(n @ 1..=10) => return Some(KeyAction::FilterPreset(n as usize - 1)),
            KeyCode::Char(' ') => return Some(KeyAction::TogglePlay),
            KeyCode::Up | KeyCode::Down if cell_mode => {
                let step = if mods.shift { 1 } else { VELOCITY_STEP };
                let delta = if event.key == KeyCode::Up { step } else { -step };
                return Some(KeyAction::VelocityBy(delta));
            }
            KeyCode::Char(_) => {}
            _ => return None,
        }
        let c = event.lower_char()?;

        if cell_mode {
            if let Some(i) = VELOCITY_KEYS.iter().position(|k| *k == c) {
                return Some(KeyAction::VelocityPreset(i));
            }
        } else {
            if let Some(i) = PATTERN_KEYS.iter().position(|k| *k == c) {
                return Some(KeyAction::SelectPattern(i));
            }
            match c {
                'n' => return Some(KeyAction::NextPattern),
                'b' => return Some(KeyAction::PrevPattern),
                'a' => return Some(KeyAction::SequencerVolumeBy(-VOLUME_STEP)),
                's' => return Some(KeyAction::SequencerVolumeBy(VOLUME_STEP)),
                _ => {}
            }
        }

        match c {
            '[' => return Some(KeyAction::TempoBy(-TEMPO_STEP)),
            ']' => return Some(KeyAction::TempoBy(TEMPO_STEP)),
            '-' | '_' if cell_mode => {
                return mods.shift.then_some(KeyAction::TrackBy(-1));
            }
            '+' | '=' if cell_mode => {
                return mods.shift.then_some(KeyAction::TrackBy(1));
            }
            '-' | '_' => return Some(KeyAction::LiveVolumeBy(-VOLUME_STEP)),
            '+' | '=' => return Some(KeyAction::LiveVolumeBy(VOLUME_STEP)),
            ',' | '<' if cell_mode => return Some(KeyAction::StepBy(-1)),
            '.' | '>' if cell_mode => return Some(KeyAction::StepBy(1)),
            _ => {}
        }

        if cell_mode {
            return None;
        }
        let pad = self.pad_for_key(c)?;
        Some(if mods.shift {
            KeyAction::ToggleMute(pad)
        } else {
            KeyAction::PadDown(pad)
        })
    }

    /// Key up. Only pad keys care.
    pub fn key_up(&self, event: &KeyEvent) -> Option<KeyAction> {
        self.pad_for_key(event.lower_char()?).map(KeyAction::PadUp)
    }
}
