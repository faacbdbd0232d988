//! Wire protocol types for talking to the device.
//!
//! Outbound commands are `cmd`-tagged JSON objects; inbound device messages
//! are `type`-tagged. Anything the client does not understand decodes to
//! [`DeviceMessage::Unknown`] and is ignored by the caller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use padlink_types::{normalize_format, DeviceStatePatch, PatternUpdate, SampleEntry};

/// Commands sent from the client to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    Init,
    GetSampleCounts,
    GetSamples {
        family: String,
        pad: usize,
    },
    LoadSample {
        family: String,
        filename: String,
        pad: usize,
    },
    SetStep {
        track: usize,
        step: usize,
        active: bool,
    },
    SetStepVelocity {
        track: usize,
        step: usize,
        velocity: u8,
    },
    Start,
    Stop,
    Tempo {
        value: u16,
    },
    SetSequencerVolume {
        value: u8,
    },
    SetLiveVolume {
        value: u8,
    },
    SelectPattern {
        index: usize,
    },
    GetPattern,
    Mute {
        track: usize,
        value: bool,
    },
    ToggleLoop {
        track: usize,
    },
    PauseLoop {
        track: usize,
    },
    SetTrackFilter {
        track: usize,
        #[serde(rename = "type")]
        filter_type: u8,
        cutoff: f32,
        resonance: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gain: Option<f32>,
    },
    ClearTrackFilter {
        track: usize,
    },
    SetPadFilter {
        pad: usize,
        #[serde(rename = "type")]
        filter_type: u8,
        cutoff: f32,
        resonance: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gain: Option<f32>,
    },
    ClearPadFilter {
        pad: usize,
    },
}

impl Command {
    /// The `cmd` tag, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::GetSampleCounts => "getSampleCounts",
            Command::GetSamples { .. } => "getSamples",
            Command::LoadSample { .. } => "loadSample",
            Command::SetStep { .. } => "setStep",
            Command::SetStepVelocity { .. } => "setStepVelocity",
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Tempo { .. } => "tempo",
            Command::SetSequencerVolume { .. } => "setSequencerVolume",
            Command::SetLiveVolume { .. } => "setLiveVolume",
            Command::SelectPattern { .. } => "selectPattern",
            Command::GetPattern => "getPattern",
            Command::Mute { .. } => "mute",
            Command::ToggleLoop { .. } => "toggleLoop",
            Command::PauseLoop { .. } => "pauseLoop",
            Command::SetTrackFilter { .. } => "setTrackFilter",
            Command::ClearTrackFilter { .. } => "clearTrackFilter",
            Command::SetPadFilter { .. } => "setPadFilter",
            Command::ClearPadFilter { .. } => "clearPadFilter",
        }
    }
}

/// Messages pushed by the device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeviceMessage {
    State(DeviceStatePatch),
    Step {
        step: i64,
    },
    Pad {
        pad: i64,
    },
    Pattern(PatternPush),
    LoopState {
        track: i64,
        #[serde(default)]
        active: bool,
        #[serde(default)]
        paused: bool,
    },
    SampleCounts(SampleCounts),
    SampleList {
        family: String,
        #[serde(default)]
        pad: Option<i64>,
        #[serde(default)]
        samples: Vec<RawSample>,
    },
    SampleLoaded {
        pad: i64,
        filename: String,
        #[serde(default)]
        size: Option<u64>,
        #[serde(default)]
        format: Option<String>,
    },
    StepVelocitySet {
        track: i64,
        step: i64,
        velocity: i64,
    },
    #[serde(rename_all = "camelCase")]
    TrackFilterSet {
        track: i64,
        #[serde(default)]
        active_filters: u32,
    },
    #[serde(rename_all = "camelCase")]
    TrackFilterCleared {
        track: i64,
        #[serde(default)]
        active_filters: u32,
    },
    #[serde(rename_all = "camelCase")]
    PadFilterSet {
        pad: i64,
        #[serde(default)]
        active_filters: u32,
    },
    #[serde(rename_all = "camelCase")]
    PadFilterCleared {
        pad: i64,
        #[serde(default)]
        active_filters: u32,
    },
    #[serde(other)]
    Unknown,
}

/// Body of a `pattern` push: `index`, optional `velocities`, and one entry
/// per track keyed by the track number.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PatternPush {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub velocities: Option<Value>,
    #[serde(flatten)]
    pub tracks: HashMap<String, Value>,
}

impl PatternPush {
    /// Convert into a typed update. Non-numeric keys are skipped; cells that
    /// are neither bool nor number count as inactive.
    pub fn into_update(self) -> PatternUpdate {
        let mut steps = BTreeMap::new();
        for (key, row) in &self.tracks {
            let Ok(track) = key.parse::<usize>() else {
                continue;
            };
            let Some(cells) = row.as_array() else {
                continue;
            };
            steps.insert(track, cells.iter().map(flag_value).collect());
        }

        let mut velocities = BTreeMap::new();
        match &self.velocities {
            Some(Value::Object(map)) => {
                for (key, row) in map {
                    if let (Ok(track), Some(cells)) = (key.parse::<usize>(), row.as_array()) {
                        velocities.insert(track, cells.iter().map(velocity_value).collect());
                    }
                }
            }
            Some(Value::Array(rows)) => {
                for (track, row) in rows.iter().enumerate() {
                    if let Some(cells) = row.as_array() {
                        velocities.insert(track, cells.iter().map(velocity_value).collect());
                    }
                }
            }
            _ => {}
        }

        PatternUpdate {
            index: self.index,
            steps,
            velocities,
        }
    }
}

fn flag_value(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn velocity_value(v: &Value) -> Option<u8> {
    let raw = v.as_f64()?;
    if !(1.0..=127.0).contains(&raw) {
        return None;
    }
    Some(raw.round() as u8)
}

/// Body of a `sampleCounts` push: family name to file count.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SampleCounts {
    #[serde(flatten)]
    pub counts: HashMap<String, Value>,
}

impl SampleCounts {
    /// Count for one family. Missing or non-numeric entries count as zero.
    pub fn count(&self, family: &str) -> u32 {
        self.counts
            .get(family)
            .and_then(Value::as_f64)
            .filter(|n| *n > 0.0)
            .map_or(0, |n| n as u32)
    }
}

/// One entry of a `sampleList` push, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawSample {
    pub name: String,
    pub size: u64,
    pub format: Option<String>,
    pub rate: Option<u32>,
    pub channels: Option<u8>,
    pub bits: Option<u8>,
}

impl RawSample {
    pub fn into_entry(self, family: &str) -> SampleEntry {
        SampleEntry {
            family: family.to_string(),
            format: normalize_format(self.format.as_deref(), &self.name),
            name: self.name,
            size: self.size,
            rate: self.rate.unwrap_or(0),
            channels: self.channels.filter(|c| *c > 0).unwrap_or(1),
            bits: self.bits.filter(|b| *b > 0).unwrap_or(16),
        }
    }
}

/// Why an inbound text frame could not be turned into a [`DeviceMessage`].
#[derive(Debug)]
pub enum DecodeError {
    /// Not JSON at all.
    Syntax(serde_json::Error),
    /// JSON, but not an object with a string `type`.
    MissingType,
    /// Known `type` whose fields do not match.
    Shape {
        kind: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Syntax(e) => write!(f, "invalid JSON: {}", e),
            DecodeError::MissingType => write!(f, "message has no type tag"),
            DecodeError::Shape { kind, source } => {
                write!(f, "malformed {} message: {}", kind, source)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Syntax(e) => Some(e),
            DecodeError::MissingType => None,
            DecodeError::Shape { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Syntax(e)
    }
}

/// Decode one inbound text frame.
pub fn decode_message(text: &str) -> Result<DeviceMessage, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        _ => return Err(DecodeError::MissingType),
    };
    serde_json::from_value(value).map_err(|source| DecodeError::Shape { kind, source })
}

/// Encode a command as its JSON text.
pub fn encode_command(command: &Command) -> Result<String, serde_json::Error> {
    serde_json::to_string(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tags_are_camel_case() {
        let json = encode_command(&Command::GetSampleCounts).unwrap();
        assert_eq!(json, r#"{"cmd":"getSampleCounts"}"#);

        let json = encode_command(&Command::SetStep {
            track: 2,
            step: 15,
            active: true,
        })
        .unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["cmd"], "setStep");
        assert_eq!(v["track"], 2);
        assert_eq!(v["active"], true);
    }

    #[test]
    fn filter_gain_is_omitted_when_unset() {
        let json = encode_command(&Command::SetTrackFilter {
            track: 0,
            filter_type: 1,
            cutoff: 300.0,
            resonance: 5.0,
            gain: None,
        })
        .unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["type"], 1);
        assert!(v.get("gain").is_none());
        assert!(v.get("filter_type").is_none());
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = decode_message(r#"{"type":"audioData","spectrum":[1,2,3]}"#).unwrap();
        assert_eq!(msg, DeviceMessage::Unknown);
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(matches!(
            decode_message(r#"{"step":3}"#),
            Err(DecodeError::MissingType)
        ));
        assert!(matches!(decode_message("not json"), Err(DecodeError::Syntax(_))));
    }

    #[test]
    fn pattern_push_accepts_bools_and_numbers() {
        let msg = decode_message(
            r#"{"type":"pattern","index":1,"0":[true,false],"1":[0,1],"t":5,
                "velocities":{"0":[100,null,0]}}"#,
        )
        .unwrap();
        let DeviceMessage::Pattern(push) = msg else {
            panic!("expected pattern");
        };
        let update = push.into_update();
        assert_eq!(update.index, Some(1));
        assert_eq!(update.steps[&0], vec![true, false]);
        assert_eq!(update.steps[&1], vec![false, true]);
        assert_eq!(update.steps.len(), 2);
        assert_eq!(update.velocities[&0], vec![Some(100), None, None]);
    }

    #[test]
    fn velocities_as_nested_arrays() {
        let push = PatternPush {
            velocities: Some(serde_json::json!([[90], [], [127]])),
            ..PatternPush::default()
        };
        let update = push.into_update();
        assert_eq!(update.velocities[&0], vec![Some(90)]);
        assert_eq!(update.velocities[&2], vec![Some(127)]);
    }

    #[test]
    fn sample_counts_sanitize() {
        let msg = decode_message(r#"{"type":"sampleCounts","BD":4,"SD":"x","CH":-2}"#).unwrap();
        let DeviceMessage::SampleCounts(counts) = msg else {
            panic!("expected sampleCounts");
        };
        assert_eq!(counts.count("BD"), 4);
        assert_eq!(counts.count("SD"), 0);
        assert_eq!(counts.count("CH"), 0);
        assert_eq!(counts.count("CY"), 0);
    }

    #[test]
    fn raw_sample_defaults() {
        let entry = RawSample {
            name: "kick.raw".into(),
            size: 2048,
            ..RawSample::default()
        }
        .into_entry("BD");
        assert_eq!(entry.format, "RAW");
        assert_eq!(entry.channels, 1);
        assert_eq!(entry.bits, 16);
        assert_eq!(entry.rate, 0);
    }

    #[test]
    fn malformed_known_type_reports_kind() {
        let err = decode_message(r#"{"type":"step","step":"x"}"#).unwrap_err();
        assert!(err.to_string().contains("step"));
    }
}
