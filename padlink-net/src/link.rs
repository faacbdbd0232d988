//! Connection lifecycle for the device link.
//!
//! `TransportLink` owns at most one connection. It reconnects after a fixed
//! delay whenever the connection drops, sends the initial handshake requests
//! after opening, and never queues commands while disconnected.

use std::io;
use std::time::Duration;

use log::{debug, info, warn};

use padlink_types::TimerQueue;

use crate::framing::{command_frame, decode_frame, trigger_frame, Frame};
use crate::protocol::{Command, DeviceMessage};

/// An established socket.
pub trait Connection {
    fn send(&mut self, frame: Frame) -> io::Result<()>;

    /// Next inbound frame, `Ok(None)` when nothing is waiting. An error means
    /// the connection is gone.
    fn recv(&mut self) -> io::Result<Option<Frame>>;

    fn close(&mut self);
}

/// Starts connection attempts and reports their outcome.
pub trait Connector {
    /// Begin an attempt. Errors here mean the attempt could not even start.
    fn connect(&mut self, url: &str) -> io::Result<()>;

    /// Outcome of the attempt in flight, `None` while it is still running.
    fn poll_connect(&mut self) -> Option<io::Result<Box<dyn Connection>>>;
}

/// Outbound side of the link as seen by the rest of the client.
pub trait CommandSink {
    /// Send a structured command. Returns false when it was dropped.
    fn send(&mut self, command: Command) -> bool;

    /// Send the binary pad trigger. Returns false when it was dropped.
    fn send_trigger(&mut self, pad: usize, velocity: u8) -> bool;

    fn is_open(&self) -> bool;
}

/// Delays governing the link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    pub reconnect: Duration,
    pub init: Duration,
    pub inventory: Duration,
    pub inventory_retry: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            reconnect: Duration::from_millis(3000),
            init: Duration::from_millis(300),
            inventory: Duration::from_millis(1500),
            inventory_retry: Duration::from_millis(8000),
        }
    }
}

/// Timers owned by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTimer {
    Reconnect,
    Init,
    Inventory,
    InventoryRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Open,
    Closed,
    Shutdown,
}

/// What happened on the link since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Opened,
    Closed,
    Message(DeviceMessage),
    /// A text frame that did not decode; the reason is kept for logging.
    Malformed(String),
}

pub struct TransportLink {
    url: String,
    connector: Box<dyn Connector>,
    conn: Option<Box<dyn Connection>>,
    state: LinkState,
    timing: LinkTiming,
    timers: TimerQueue<LinkTimer>,
    inventory_total: u64,
    backlog: Vec<LinkEvent>,
    attempts: u64,
}

impl TransportLink {
    pub fn new(url: impl Into<String>, connector: Box<dyn Connector>, timing: LinkTiming) -> Self {
        Self {
            url: url.into(),
            connector,
            conn: None,
            state: LinkState::Idle,
            timing,
            timers: TimerQueue::new(),
            inventory_total: 0,
            backlog: Vec::new(),
            attempts: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn has_timer(&self, kind: LinkTimer) -> bool {
        self.timers.count(|t| *t == kind) > 0
    }

    /// Open the connection. Does nothing if one is open or in flight.
    pub fn connect(&mut self, now: Duration) {
        self.timers.advance(now);
        match self.state {
            LinkState::Idle | LinkState::Closed => self.start_attempt(),
            LinkState::Connecting | LinkState::Open | LinkState::Shutdown => {}
        }
    }

    /// Last aggregate sample count reported by the device. A nonzero total
    /// cancels the pending inventory retry.
    pub fn note_inventory(&mut self, total: u64) {
        self.inventory_total = total;
        if total > 0 && self.timers.cancel_where(|t| *t == LinkTimer::InventoryRetry) > 0 {
            debug!("Inventory arrived, retry cancelled");
        }
    }

    /// Drive the link up to `now`: fire due timers, finish a pending
    /// connection attempt and drain inbound frames.
    pub fn poll(&mut self, now: Duration) -> Vec<LinkEvent> {
        while let Some((_, timer)) = self.timers.pop_due(now) {
            self.fire(timer);
        }
        self.timers.advance(now);

        if self.state == LinkState::Connecting {
            match self.connector.poll_connect() {
                Some(Ok(conn)) => {
                    info!("Connected to {}", self.url);
                    self.conn = Some(conn);
                    self.state = LinkState::Open;
                    self.backlog.push(LinkEvent::Opened);
                    self.timers.schedule(self.timing.init, LinkTimer::Init);
                    self.timers.schedule(self.timing.inventory, LinkTimer::Inventory);
                }
                Some(Err(e)) => {
                    warn!("Connection to {} failed: {}", self.url, e);
                    self.state = LinkState::Closed;
                    self.schedule_reconnect();
                }
                None => {}
            }
        }

        while self.state == LinkState::Open {
            let Some(conn) = self.conn.as_mut() else {
                break;
            };
            match conn.recv() {
                Ok(Some(frame)) => match decode_frame(&frame) {
                    Some(Ok(msg)) => self.backlog.push(LinkEvent::Message(msg)),
                    Some(Err(e)) => self.backlog.push(LinkEvent::Malformed(e.to_string())),
                    None => debug!("Ignoring binary frame"),
                },
                Ok(None) => break,
                Err(e) => self.lose_connection(&e),
            }
        }

        std::mem::take(&mut self.backlog)
    }

    /// Tear the connection down for good. No reconnection follows.
    pub fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.timers.clear();
        self.backlog.clear();
        self.state = LinkState::Shutdown;
        info!("Link to {} closed", self.url);
    }

    fn start_attempt(&mut self) {
        self.attempts += 1;
        debug!("Connecting to {} (attempt {})", self.url, self.attempts);
        match self.connector.connect(&self.url) {
            Ok(()) => self.state = LinkState::Connecting,
            Err(e) => {
                warn!("Could not start connection to {}: {}", self.url, e);
                self.state = LinkState::Closed;
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.state == LinkState::Shutdown || self.has_timer(LinkTimer::Reconnect) {
            return;
        }
        self.timers.schedule(self.timing.reconnect, LinkTimer::Reconnect);
    }

    fn fire(&mut self, timer: LinkTimer) {
        match timer {
            LinkTimer::Reconnect => {
                if matches!(self.state, LinkState::Idle | LinkState::Closed) {
                    self.start_attempt();
                }
            }
            LinkTimer::Init => {
                self.send(Command::Init);
            }
            LinkTimer::Inventory => {
                self.send(Command::GetSampleCounts);
                self.timers
                    .schedule(self.timing.inventory_retry, LinkTimer::InventoryRetry);
            }
            LinkTimer::InventoryRetry => {
                if self.inventory_total == 0 {
                    info!("No sample counts yet, asking once more");
                    self.send(Command::GetSampleCounts);
                }
            }
        }
    }

    fn lose_connection(&mut self, cause: &io::Error) {
        info!("Connection to {} lost: {}", self.url, cause);
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.state = LinkState::Closed;
        self.timers.cancel_where(|t| {
            matches!(
                t,
                LinkTimer::Init | LinkTimer::Inventory | LinkTimer::InventoryRetry
            )
        });
        self.backlog.push(LinkEvent::Closed);
        self.schedule_reconnect();
    }

    fn transmit(&mut self, frame: Frame, what: &str) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            debug!("Dropping {} while disconnected", what);
            return false;
        };
        match conn.send(frame) {
            Ok(()) => true,
            Err(e) => {
                self.lose_connection(&e);
                false
            }
        }
    }
}

impl CommandSink for TransportLink {
    fn send(&mut self, command: Command) -> bool {
        if self.state != LinkState::Open {
            debug!("Dropping {} while disconnected", command.name());
            return false;
        }
        match command_frame(&command) {
            Ok(frame) => self.transmit(frame, command.name()),
            Err(e) => {
                warn!("Could not encode {}: {}", command.name(), e);
                false
            }
        }
    }

    fn send_trigger(&mut self, pad: usize, velocity: u8) -> bool {
        if self.state != LinkState::Open {
            debug!("Dropping trigger for pad {} while disconnected", pad);
            return false;
        }
        let Ok(pad_byte) = u8::try_from(pad) else {
            warn!("Pad {} does not fit a trigger frame", pad);
            return false;
        };
        self.transmit(trigger_frame(pad_byte, velocity), "trigger")
    }

    fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }
}
