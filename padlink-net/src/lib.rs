//! Device link for the padlink control client.
//!
//! This crate owns the WebSocket connection to the device: the wire
//! protocol, frame encoding and the reconnecting link lifecycle.

pub mod framing;
pub mod link;
pub mod protocol;
pub mod ws;

pub use framing::{Frame, TRIGGER_STATUS};
pub use link::{
    CommandSink, Connection, Connector, LinkEvent, LinkState, LinkTimer, LinkTiming,
    TransportLink,
};
pub use protocol::{Command, DecodeError, DeviceMessage, PatternPush, RawSample, SampleCounts};
pub use ws::{WsConnection, WsConnector};
