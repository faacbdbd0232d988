#![allow(dead_code)]
//! Test harness for padlink-core integration tests: a scripted wire and an
//! observer that records every notice.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use padlink_core::{Config, Notice, Observer, Session, StateStore};
use padlink_net::{Connection, Connector, Frame};
use serde_json::Value;

#[derive(Default)]
pub struct WireState {
    pub pending: bool,
    pub refuse: bool,
    pub broken: bool,
    pub sent: Vec<Frame>,
    pub inbound: VecDeque<Frame>,
}

/// Device side of a mocked connection.
#[derive(Clone, Default)]
pub struct MockWire(pub Rc<RefCell<WireState>>);

impl MockWire {
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(MockConnector(self.clone()))
    }

    pub fn push_json(&self, value: Value) {
        self.0
            .borrow_mut()
            .inbound
            .push_back(Frame::Text(value.to_string()));
    }

    pub fn push_text(&self, text: &str) {
        self.0
            .borrow_mut()
            .inbound
            .push_back(Frame::Text(text.to_string()));
    }

    pub fn break_connection(&self) {
        self.0.borrow_mut().broken = true;
    }

    pub fn sent_json(&self) -> Vec<Value> {
        self.0
            .borrow()
            .sent
            .iter()
            .filter_map(|f| f.as_text().and_then(|t| serde_json::from_str(t).ok()))
            .collect()
    }

    pub fn sent_cmds(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .filter_map(|v| v["cmd"].as_str().map(str::to_string))
            .collect()
    }

    /// Sent commands with the given `cmd` tag.
    pub fn sent(&self, cmd: &str) -> Vec<Value> {
        self.sent_json()
            .into_iter()
            .filter(|v| v["cmd"] == cmd)
            .collect()
    }

    pub fn triggers(&self) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .sent
            .iter()
            .filter_map(|f| match f {
                Frame::Binary(b) => Some(b.clone()),
                Frame::Text(_) => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.0.borrow_mut().sent.clear();
    }
}

struct MockConnector(MockWire);

impl Connector for MockConnector {
    fn connect(&mut self, _url: &str) -> io::Result<()> {
        self.0 .0.borrow_mut().pending = true;
        Ok(())
    }

    fn poll_connect(&mut self) -> Option<io::Result<Box<dyn Connection>>> {
        let mut wire = self.0 .0.borrow_mut();
        if !std::mem::take(&mut wire.pending) {
            return None;
        }
        if wire.refuse {
            return Some(Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")));
        }
        wire.broken = false;
        Some(Ok(Box::new(MockConnection(self.0.clone()))))
    }
}

struct MockConnection(MockWire);

impl Connection for MockConnection {
    fn send(&mut self, frame: Frame) -> io::Result<()> {
        let mut wire = self.0 .0.borrow_mut();
        if wire.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"));
        }
        wire.sent.push(frame);
        Ok(())
    }

    fn recv(&mut self) -> io::Result<Option<Frame>> {
        let mut wire = self.0 .0.borrow_mut();
        if wire.broken {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        }
        Ok(wire.inbound.pop_front())
    }

    fn close(&mut self) {}
}

/// Records every delivered notice.
#[derive(Clone, Default)]
pub struct Recorder(pub Rc<RefCell<Vec<Notice>>>);

impl Recorder {
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn all(&self) -> Vec<Notice> {
        self.0.borrow().clone()
    }
}

impl Observer for Recorder {
    fn notify(&mut self, notice: &Notice, _store: &StateStore) {
        self.0.borrow_mut().push(notice.clone());
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub struct Harness {
    pub session: Session,
    pub wire: MockWire,
    pub recorder: Recorder,
}

impl Harness {
    /// Session with the default config whose link is open and past the
    /// init and inventory requests. The clock stands at 2s, sent frames and
    /// notices are cleared.
    pub fn connected() -> Self {
        let wire = MockWire::default();
        let recorder = Recorder::default();
        let mut session = Session::new(&Config::default(), wire.connector());
        session.add_observer(Box::new(recorder.clone()));
        session.start(Duration::ZERO);
        session.advance(Duration::ZERO);
        session.advance(ms(2000));
        wire.clear_sent();
        recorder.take();
        Self {
            session,
            wire,
            recorder,
        }
    }

    pub fn now(&self) -> Duration {
        self.session.now()
    }

    /// Advance the clock by `delta`.
    pub fn wait(&mut self, delta: u64) {
        let now = self.session.now() + ms(delta);
        self.session.advance(now);
    }

    /// Queue a device push and let the session read it.
    pub fn push(&mut self, value: Value) {
        self.wire.push_json(value);
        self.wait(0);
    }
}
