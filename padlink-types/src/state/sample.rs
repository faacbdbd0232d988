//! Sample library entries as listed by the device.

use serde::{Deserialize, Serialize};

/// Quality string shown for pads whose push carries none.
pub const DEFAULT_QUALITY: &str = "44.1kHz • 16-bit mono";

/// One sample of a family listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub family: String,
    pub name: String,
    pub size: u64,
    pub format: String,
    /// Sample rate in Hz, 0 when unknown.
    pub rate: u32,
    pub channels: u8,
    pub bits: u8,
}

impl SampleEntry {
    pub fn size_kb(&self) -> f64 {
        self.size as f64 / 1024.0
    }

    pub fn is_stereo(&self) -> bool {
        self.channels == 2
    }
}

/// Guess the container format from a filename extension.
pub fn infer_format(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".wav") {
        "WAV".to_string()
    } else if lower.ends_with(".raw") {
        "RAW".to_string()
    } else {
        "RAW/WAV".to_string()
    }
}

/// Normalize a device-reported format, falling back to the extension.
pub fn normalize_format(reported: Option<&str>, name: &str) -> String {
    match reported {
        Some(f) if !f.is_empty() => f.to_ascii_uppercase(),
        _ => infer_format(name),
    }
}
