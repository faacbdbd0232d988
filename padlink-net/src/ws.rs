//! WebSocket connector backed by `tungstenite`.
//!
//! The handshake blocks, so it runs on a short-lived thread and hands the
//! socket back over a channel. Once established the socket is switched to
//! non-blocking mode and polled from the event loop.

use std::io;
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, info};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::framing::Frame;
use crate::link::{Connection, Connector};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Production [`Connector`] for `ws://` endpoints.
#[derive(Default)]
pub struct WsConnector {
    pending: Option<Receiver<io::Result<WsConnection>>>,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connector for WsConnector {
    fn connect(&mut self, url: &str) -> io::Result<()> {
        let (tx, rx) = mpsc::channel();
        let url = url.to_string();
        thread::Builder::new()
            .name("padlink-connect".into())
            .spawn(move || {
                // Receiver gone means the link was dropped mid-handshake.
                let _ = tx.send(handshake(&url));
            })?;
        self.pending = Some(rx);
        Ok(())
    }

    fn poll_connect(&mut self) -> Option<io::Result<Box<dyn Connection>>> {
        let rx = self.pending.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                self.pending = None;
                Some(result.map(|conn| Box::new(conn) as Box<dyn Connection>))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                Some(Err(io::Error::new(
                    io::ErrorKind::Other,
                    "connect thread exited without a result",
                )))
            }
        }
    }
}

fn handshake(url: &str) -> io::Result<WsConnection> {
    let (mut socket, response) = tungstenite::connect(url).map_err(into_io)?;
    debug!("Handshake with {} answered {}", url, response.status());
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
    }
    Ok(WsConnection { socket })
}

/// An open, non-blocking WebSocket.
pub struct WsConnection {
    socket: Socket,
}

impl Connection for WsConnection {
    fn send(&mut self, frame: Frame) -> io::Result<()> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        // A full socket buffer keeps the frame queued inside tungstenite; it
        // goes out on the next flush.
        match self.socket.send(msg) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(into_io(e)),
        }
    }

    fn recv(&mut self) -> io::Result<Option<Frame>> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => return Ok(Some(Frame::Binary(bytes))),
                Ok(Message::Close(_)) => {
                    info!("Device closed the socket");
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "closed by peer",
                    ));
                }
                // Pings are answered by tungstenite on the next write/flush.
                Ok(_) => continue,
                Err(tungstenite::Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    return match self.socket.flush() {
                        Ok(()) => Ok(None),
                        Err(tungstenite::Error::Io(e))
                            if e.kind() == io::ErrorKind::WouldBlock =>
                        {
                            Ok(None)
                        }
                        Err(e) => Err(into_io(e)),
                    };
                }
                Err(e) => return Err(into_io(e)),
            }
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

fn into_io(e: tungstenite::Error) -> io::Error {
    match e {
        tungstenite::Error::Io(e) => e,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            io::Error::new(io::ErrorKind::ConnectionAborted, e.to_string())
        }
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}
