//! Client-local UI preferences persisted between runs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Panels of the control surface, in their default order.
pub const PANELS: [&str; 5] = ["pads", "sequencer", "transport", "samples", "visualizer"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPrefs {
    pub panel_order: Vec<String>,
    pub hidden_panels: Vec<String>,
    pub current_tab: Option<String>,
}

impl UiPrefs {
    /// Defaults built from the sections that currently exist.
    pub fn for_sections(sections: &[&str]) -> Self {
        Self {
            panel_order: sections.iter().map(|s| s.to_string()).collect(),
            hidden_panels: Vec::new(),
            current_tab: sections.first().map(|s| s.to_string()),
        }
    }

    /// Drop saved sections that no longer exist and append new ones.
    pub fn reconcile(&mut self, sections: &[&str]) {
        self.panel_order.retain(|p| sections.contains(&p.as_str()));
        self.panel_order.dedup();
        for section in sections {
            if !self.panel_order.iter().any(|p| p == section) {
                self.panel_order.push(section.to_string());
            }
        }
        self.hidden_panels.retain(|p| sections.contains(&p.as_str()));
        if let Some(tab) = &self.current_tab {
            if !sections.contains(&tab.as_str()) {
                self.current_tab = sections.first().map(|s| s.to_string());
            }
        }
    }

    pub fn is_visible(&self, panel: &str) -> bool {
        !self.hidden_panels.iter().any(|p| p == panel)
    }

    /// Flip a panel's visibility. Returns the new visibility, or `None` for
    /// an unknown panel.
    pub fn toggle_panel(&mut self, panel: &str) -> Option<bool> {
        if !self.panel_order.iter().any(|p| p == panel) {
            return None;
        }
        if let Some(pos) = self.hidden_panels.iter().position(|p| p == panel) {
            self.hidden_panels.remove(pos);
            Some(true)
        } else {
            self.hidden_panels.push(panel.to_string());
            Some(false)
        }
    }

    /// Move a panel to `index` in the order, clamped to the end.
    pub fn move_panel(&mut self, panel: &str, index: usize) -> bool {
        let Some(pos) = self.panel_order.iter().position(|p| p == panel) else {
            return false;
        };
        let name = self.panel_order.remove(pos);
        let index = index.min(self.panel_order.len());
        self.panel_order.insert(index, name);
        true
    }

    pub fn select_tab(&mut self, tab: &str) -> bool {
        if !self.panel_order.iter().any(|p| p == tab) {
            return false;
        }
        self.current_tab = Some(tab.to_string());
        true
    }

    /// Load from `path`, reconciled against `sections`. A missing or
    /// unreadable file yields the defaults.
    pub fn load(path: &Path, sections: &[&str]) -> Self {
        let loaded = fs::read_to_string(path)
            .ok()
            .and_then(|json| match serde_json::from_str::<UiPrefs>(&json) {
                Ok(prefs) => Some(prefs),
                Err(e) => {
                    log::warn!("ignoring malformed prefs {}: {}", path.display(), e);
                    None
                }
            });
        match loaded {
            Some(mut prefs) => {
                prefs.reconcile(sections);
                prefs
            }
            None => Self::for_sections(sections),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

/// Default location of the prefs file.
pub fn prefs_path() -> Option<PathBuf> {
    crate::config::config_dir().map(|d| d.join("prefs.json"))
}
