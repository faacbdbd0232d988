//! Client-side error taxonomy. None of these are fatal.

use std::fmt;

#[derive(Debug)]
pub enum ClientError {
    /// The link is not open; the command was dropped.
    TransportUnavailable,
    /// An inbound message could not be decoded.
    Malformed(String),
    /// An inbound message had a type the client does not handle.
    UnknownType,
    /// An index was outside the current layout.
    Rejected { what: &'static str, index: i64 },
    /// A sample family that no pad of the kit plays.
    UnknownFamily(String),
    /// A cell edit targeted a pattern or coordinates that are no longer valid.
    StaleSelection,
    /// The action needs a selection of a kind that is not current.
    NothingSelected(&'static str),
}

impl ClientError {
    pub fn rejected(what: &'static str, index: impl TryInto<i64>) -> Self {
        ClientError::Rejected {
            what,
            index: index.try_into().unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::TransportUnavailable => write!(f, "not connected to the device"),
            ClientError::Malformed(msg) => write!(f, "malformed message: {}", msg),
            ClientError::UnknownType => write!(f, "unknown message type"),
            ClientError::Rejected { what, index } => {
                write!(f, "{} {} is out of range", what, index)
            }
            ClientError::UnknownFamily(family) => write!(f, "no pad plays family {}", family),
            ClientError::StaleSelection => write!(f, "selection is no longer valid"),
            ClientError::NothingSelected(what) => write!(f, "select a {} first", what),
        }
    }
}

impl std::error::Error for ClientError {}
