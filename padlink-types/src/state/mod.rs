pub mod device;
pub mod pattern;
pub mod sample;

pub use device::{
    DeviceState, DeviceStatePatch, Flag, LoopState, PadSample, SampleSlot, Telemetry,
    DEFAULT_TEMPO, DEFAULT_VOLUME, MAX_TEMPO, MAX_VOLUME, MIN_TEMPO,
};
pub use pattern::{Cell, PatternGrid, PatternUpdate, DEFAULT_VELOCITY, MAX_VELOCITY, MIN_VELOCITY};
pub use sample::{infer_format, normalize_format, SampleEntry, DEFAULT_QUALITY};
