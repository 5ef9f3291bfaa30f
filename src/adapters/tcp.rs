//! TCP listener adapter.
//!
//! Implements [`Listener`] and [`Transport`] over `std::net`. ESP-IDF
//! ships a std-compatible socket layer on top of lwIP, so the same code
//! serves both the device and host-side simulation.
//!
//! ## Connection model
//!
//! 1. [`TcpListenerAdapter::bind`] opens a non-blocking listener.
//! 2. `accept()` returns `Ok(None)` while nobody is waiting.
//! 3. Accepted streams are non-blocking too: `read()` returns `Ok(0)`
//!    when no data is available and [`TransportError::Closed`] once the
//!    peer has shut down its side.
//! 4. `close()` shuts the stream down in both directions.

use std::io::{ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};

use log::{debug, info, warn};

use crate::app::ports::{Listener, Transport};
use crate::error::TransportError;

/// Non-blocking TCP listener bound to every local interface.
pub struct TcpListenerAdapter {
    listener: TcpListener,
}

impl TcpListenerAdapter {
    /// Bind `0.0.0.0:port`. Port 0 picks an ephemeral port (tests).
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
    }

    pub fn bind_addr(addr: SocketAddrV4) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).map_err(|e| {
            warn!("TCP: bind {} failed: {}", addr, e);
            TransportError::Bind
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|_| TransportError::Bind)?;
        info!("TCP: listening on {}", addr);
        Ok(Self { listener })
    }

    /// The bound address, including the port picked for port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(|_| TransportError::Io)
    }
}

impl Listener for TcpListenerAdapter {
    type Conn = TcpConnection;

    fn accept(&mut self) -> Result<Option<TcpConnection>, TransportError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream
                    .set_nonblocking(true)
                    .map_err(|_| TransportError::Io)?;
                let _ = stream.set_nodelay(true);
                debug!("TCP: client {} connected", peer);
                Ok(Some(TcpConnection {
                    stream: Some(stream),
                }))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!("TCP: accept failed: {}", e);
                Err(TransportError::Io)
            }
        }
    }
}

/// One accepted client stream.
pub struct TcpConnection {
    stream: Option<TcpStream>,
}

impl TcpConnection {
    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if is_reset(e.kind()) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        match stream.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) if is_reset(e.kind()) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        let stream = self.stream()?;
        match stream.flush() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(()),
            Err(_) => Err(TransportError::Io),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_reset(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}
