//! Frame-level encoding for the device socket.
//!
//! Structured commands travel as text frames carrying JSON. Pad triggers use
//! a fixed 3-byte binary frame: `[0x90, pad, velocity]`.

use crate::protocol::{decode_message, encode_command, Command, DecodeError, DeviceMessage};

/// Status byte of the binary trigger frame.
pub const TRIGGER_STATUS: u8 = 0x90;

/// One WebSocket data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }
}

/// Encode a command as a text frame.
pub fn command_frame(command: &Command) -> Result<Frame, serde_json::Error> {
    encode_command(command).map(Frame::Text)
}

/// Encode the binary trigger frame. Velocity is clamped to 0-127.
pub fn trigger_frame(pad: u8, velocity: u8) -> Frame {
    Frame::Binary(vec![TRIGGER_STATUS, pad, velocity.min(127)])
}

/// Decode an inbound frame. Binary frames carry nothing for the client and
/// yield `None`.
pub fn decode_frame(frame: &Frame) -> Option<Result<DeviceMessage, DecodeError>> {
    frame.as_text().map(decode_message)
}
