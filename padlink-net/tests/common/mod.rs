#![allow(dead_code)]
//! Test harness utilities for padlink-net integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use padlink_net::{Connection, Connector, Frame};
use serde_json::Value;
use tungstenite::{Message, WebSocket};

/// Shared state behind a [`MockConnector`] and its connections.
#[derive(Default)]
pub struct WireState {
    pub attempts: usize,
    pub refuse: bool,
    pub pending: bool,
    pub open: bool,
    pub sent: Vec<Frame>,
    pub inbound: VecDeque<Frame>,
    pub broken: bool,
}

#[derive(Clone, Default)]
pub struct MockWire(pub Rc<RefCell<WireState>>);

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(MockConnector(self.clone()))
    }

    pub fn attempts(&self) -> usize {
        self.0.borrow().attempts
    }

    pub fn refuse(&self, refuse: bool) {
        self.0.borrow_mut().refuse = refuse;
    }

    /// Drop the current connection; the next recv or send fails.
    pub fn break_connection(&self) {
        self.0.borrow_mut().broken = true;
    }

    pub fn push_text(&self, text: &str) {
        self.0
            .borrow_mut()
            .inbound
            .push_back(Frame::Text(text.to_string()));
    }

    pub fn push_json(&self, value: Value) {
        self.push_text(&value.to_string());
    }

    /// Text frames sent so far, parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.0
            .borrow()
            .sent
            .iter()
            .filter_map(|f| f.as_text().and_then(|t| serde_json::from_str(t).ok()))
            .collect()
    }

    /// `cmd` tags of sent text frames, in order.
    pub fn sent_cmds(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .filter_map(|v| v["cmd"].as_str().map(str::to_string))
            .collect()
    }

    pub fn sent_binary(&self) -> Vec<Vec<u8>> {
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

pub struct MockConnector(MockWire);

impl Connector for MockConnector {
    fn connect(&mut self, _url: &str) -> io::Result<()> {
        let mut wire = self.0 .0.borrow_mut();
        wire.attempts += 1;
        wire.pending = true;
        Ok(())
    }

    fn poll_connect(&mut self) -> Option<io::Result<Box<dyn Connection>>> {
        let mut wire = self.0 .0.borrow_mut();
        if !wire.pending {
            return None;
        }
        wire.pending = false;
        if wire.refuse {
            return Some(Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "refused",
            )));
        }
        wire.open = true;
        wire.broken = false;
        Some(Ok(Box::new(MockConnection(self.0.clone()))))
    }
}

pub struct MockConnection(MockWire);

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
            wire.open = false;
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        }
        Ok(wire.inbound.pop_front())
    }

    fn close(&mut self) {
        self.0 .0.borrow_mut().open = false;
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// A one-client WebSocket server standing in for the device. The handler
/// runs on its own thread with a blocking socket.
pub struct FakeDevice {
    pub url: String,
    handle: JoinHandle<()>,
}

impl FakeDevice {
    pub fn spawn<F>(handler: F) -> Self
    where
        F: FnOnce(WebSocket<TcpStream>) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let socket = tungstenite::accept(stream).unwrap();
            handler(socket);
        });
        Self {
            url: format!("ws://{}/ws", addr),
            handle,
        }
    }

    pub fn join(self) {
        self.handle.join().unwrap();
    }
}

/// Read the next text message from the client as JSON.
pub fn read_json(socket: &mut WebSocket<TcpStream>) -> Value {
    loop {
        match socket.read().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Binary(bytes) => panic!("unexpected binary frame {:?}", bytes),
            _ => continue,
        }
    }
}

/// Read the next binary message from the client.
pub fn read_binary(socket: &mut WebSocket<TcpStream>) -> Vec<u8> {
    loop {
        match socket.read().unwrap() {
            Message::Binary(bytes) => return bytes,
            Message::Text(text) => panic!("unexpected text frame {}", text),
            _ => continue,
        }
    }
}

/// Poll `f` every 5 ms until it returns `Some`, or panic after `timeout`.
pub fn wait_for<T>(timeout: Duration, mut f: impl FnMut() -> Option<T>) -> T {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(v) = f() {
            return v;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out after {:?}", timeout);
}
