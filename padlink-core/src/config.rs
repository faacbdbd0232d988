use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use padlink_net::LinkTiming;
use padlink_types::Layout;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    device: DeviceConfig,
    #[serde(default)]
    kit: KitConfig,
    #[serde(default)]
    timing: TimingConfig,
}

#[derive(Deserialize, Default)]
struct DeviceConfig {
    url: Option<String>,
}

#[derive(Deserialize, Default)]
struct KitConfig {
    families: Option<Vec<String>>,
    pad_keys: Option<Vec<String>>,
    patterns: Option<usize>,
}

#[derive(Deserialize, Default)]
struct TimingConfig {
    reconnect: Option<u64>,
    init_delay: Option<u64>,
    inventory_delay: Option<u64>,
    inventory_retry: Option<u64>,
    tremolo_arm: Option<u64>,
    tremolo_interval: Option<u64>,
    pulse: Option<u64>,
    flash: Option<u64>,
    request_stagger: Option<u64>,
    render_debounce: Option<u64>,
    filter_window: Option<u64>,
    pattern_fetch: Option<u64>,
    pending_expiry: Option<u64>,
    audition_fallback: Option<u64>,
    audition_trigger: Option<u64>,
}

/// Delays used by the interaction and catalog state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub tremolo_arm: Duration,
    pub tremolo_interval: Duration,
    pub pulse: Duration,
    pub flash: Duration,
    pub request_stagger: Duration,
    pub render_debounce: Duration,
    pub filter_window: Duration,
    pub pattern_fetch: Duration,
    pub pending_expiry: Duration,
    pub audition_fallback: Duration,
    pub audition_trigger: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tremolo_arm: Duration::from_millis(300),
            tremolo_interval: Duration::from_millis(180),
            pulse: Duration::from_millis(60),
            flash: Duration::from_millis(600),
            request_stagger: Duration::from_millis(80),
            render_debounce: Duration::from_millis(120),
            filter_window: Duration::from_millis(300),
            pattern_fetch: Duration::from_millis(150),
            pending_expiry: Duration::from_millis(5000),
            audition_fallback: Duration::from_millis(350),
            audition_trigger: Duration::from_millis(80),
        }
    }
}

pub struct Config {
    device: DeviceConfig,
    kit: KitConfig,
    timing: TimingConfig,
}

impl Config {
    /// Embedded defaults overlaid with `~/.config/padlink/config.toml`.
    pub fn load() -> Self {
        match user_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::embedded(),
        }
    }

    /// Embedded defaults overlaid with the file at `path`. A file that cannot
    /// be read or parsed is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::embedded();
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => config.merge(user),
                Err(e) => log::warn!(
                    target: "config",
                    "ignoring malformed config {}: {}",
                    path.display(),
                    e
                ),
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
        config
    }

    fn embedded() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            device: base.device,
            kit: base.kit,
            timing: base.timing,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        if user.device.url.is_some() {
            self.device.url = user.device.url;
        }
        merge_kit(&mut self.kit, user.kit);
        merge_timing(&mut self.timing, user.timing);
    }

    pub fn url(&self) -> &str {
        self.device.url.as_deref().unwrap_or("ws://192.168.4.1/ws")
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.device.url = Some(url.into());
    }

    pub fn layout(&self) -> Layout {
        let fallback = Layout::default();
        let families = self
            .kit
            .families
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or(fallback.families);
        Layout::new(families, self.kit.patterns.unwrap_or(fallback.patterns))
    }

    /// Keys bound to pads, in pad order. Entries that are not a single
    /// character are skipped.
    pub fn pad_keys(&self) -> Vec<char> {
        self.kit
            .pad_keys
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|k| {
                let mut chars = k.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c.to_ascii_lowercase()),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn link_timing(&self) -> LinkTiming {
        let fallback = LinkTiming::default();
        let t = &self.timing;
        LinkTiming {
            reconnect: ms_or(t.reconnect, fallback.reconnect),
            init: ms_or(t.init_delay, fallback.init),
            inventory: ms_or(t.inventory_delay, fallback.inventory),
            inventory_retry: ms_or(t.inventory_retry, fallback.inventory_retry),
        }
    }

    pub fn timing(&self) -> Timing {
        let fallback = Timing::default();
        let t = &self.timing;
        Timing {
            tremolo_arm: ms_or(t.tremolo_arm, fallback.tremolo_arm),
            tremolo_interval: ms_or(t.tremolo_interval, fallback.tremolo_interval),
            pulse: ms_or(t.pulse, fallback.pulse),
            flash: ms_or(t.flash, fallback.flash),
            request_stagger: ms_or(t.request_stagger, fallback.request_stagger),
            render_debounce: ms_or(t.render_debounce, fallback.render_debounce),
            filter_window: ms_or(t.filter_window, fallback.filter_window),
            pattern_fetch: ms_or(t.pattern_fetch, fallback.pattern_fetch),
            pending_expiry: ms_or(t.pending_expiry, fallback.pending_expiry),
            audition_fallback: ms_or(t.audition_fallback, fallback.audition_fallback),
            audition_trigger: ms_or(t.audition_trigger, fallback.audition_trigger),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

fn ms_or(value: Option<u64>, fallback: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(fallback)
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("padlink"))
}

fn user_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

fn merge_kit(base: &mut KitConfig, user: KitConfig) {
    if user.families.is_some() {
        base.families = user.families;
    }
    if user.pad_keys.is_some() {
        base.pad_keys = user.pad_keys;
    }
    if user.patterns.is_some() {
        base.patterns = user.patterns;
    }
}

fn merge_timing(base: &mut TimingConfig, user: TimingConfig) {
    macro_rules! take {
        ($($field:ident),*) => {
            $(if user.$field.is_some() {
                base.$field = user.$field;
            })*
        };
    }
    take!(
        reconnect,
        init_delay,
        inventory_delay,
        inventory_retry,
        tremolo_arm,
        tremolo_interval,
        pulse,
        flash,
        request_stagger,
        render_debounce,
        filter_window,
        pattern_fetch,
        pending_expiry,
        audition_fallback,
        audition_trigger
    );
}
