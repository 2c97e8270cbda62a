//! Transport collaborators.
//!
//! The processor only needs a non-blocking way to pick up a pending client
//! and a byte-oriented connection. [`TcpTransport`] implements both on top
//! of `std::net` sockets in non-blocking mode.

use mbtcp_common::{SlaveError, SlaveResult};
use std::cell::Cell;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A single client connection.
pub trait Connection {
    /// Check whether the peer is still connected.
    ///
    /// Must report a hang-up even when no read has observed it yet.
    fn is_connected(&self) -> bool;

    /// Check whether at least one byte can be read without blocking.
    fn has_available(&mut self) -> bool;

    /// Read one byte, or `None` if nothing is available.
    fn read_byte(&mut self) -> Option<u8>;

    /// Write a complete response, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the write fails.
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize>;

    /// Close the connection.
    fn close(&mut self);

    /// Drain currently available bytes into `buf`, stopping when `buf` is full.
    ///
    /// Returns the number of bytes read.
    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() && self.has_available() {
            match self.read_byte() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }
}

/// Source of incoming client connections.
pub trait Transport {
    /// Connection type produced by this transport.
    type Conn: Connection;

    /// Accept a pending connection, if one is waiting.
    ///
    /// Must not block.
    fn accept_pending(&mut self) -> Option<Self::Conn>;
}

/// Non-blocking TCP listener.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    write_timeout: Duration,
}

impl TcpTransport {
    /// Bind a listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`SlaveError::Transport`] if the address cannot be bound or
    /// the socket cannot be switched to non-blocking mode.
    pub fn bind(addr: SocketAddr, write_timeout: Duration) -> SlaveResult<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| SlaveError::Transport(format!("Failed to bind {addr}: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| SlaveError::Transport(format!("Failed to set non-blocking: {e}")))?;

        info!(%addr, "Modbus TCP listener bound");
        Ok(Self {
            listener,
            write_timeout,
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> SlaveResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    fn configure(&self, stream: &TcpStream) -> std::io::Result<()> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.write_timeout))
    }
}

impl Transport for TcpTransport {
    type Conn = TcpConnection;

    fn accept_pending(&mut self) -> Option<TcpConnection> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = self.configure(&stream) {
                    warn!(%peer, error = %e, "Failed to configure client socket, dropping it");
                    let _ = stream.shutdown(Shutdown::Both);
                    return None;
                }
                debug!(%peer, "Incoming connection");
                Some(TcpConnection::new(stream, peer))
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                None
            }
        }
    }
}

/// A client socket in non-blocking mode.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer: SocketAddr,
    connected: Cell<bool>,
}

impl TcpConnection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            connected: Cell::new(true),
        }
    }

    /// Remote address of the client.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn mark_disconnected(&self, why: &str) {
        if self.connected.replace(false) {
            debug!(peer = %self.peer, why, "Client disconnected");
        }
    }

    /// Peek one byte without consuming it.
    ///
    /// Returns whether data is waiting; a hang-up or hard error marks the
    /// connection as gone.
    fn peek_pending(&self) -> bool {
        if !self.connected.get() {
            return false;
        }
        let mut byte = [0u8; 1];
        match self.stream.peek(&mut byte) {
            Ok(0) => {
                self.mark_disconnected("end of stream");
                false
            }
            Ok(_) => true,
            Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                false
            }
            Err(e) => {
                trace!(error = %e, "Peek failed");
                self.mark_disconnected("peek error");
                false
            }
        }
    }

    /// Decide what a blocking write reports once non-blocking mode has
    /// been restored.
    ///
    /// A transmitted response is reported as sent even if the socket could
    /// not be switched back; the connection is retired instead, since it
    /// would block the poll loop on the next read.
    fn settle_write(
        &self,
        len: usize,
        written: std::io::Result<()>,
        restored: std::io::Result<()>,
    ) -> std::io::Result<usize> {
        if let Err(e) = restored {
            warn!(peer = %self.peer, error = %e, "Failed to restore non-blocking mode");
            self.mark_disconnected("socket mode error");
        }
        match written {
            Ok(()) => Ok(len),
            Err(e) => {
                self.mark_disconnected("write error");
                Err(e)
            }
        }
    }
}

impl Connection for TcpConnection {
    fn is_connected(&self) -> bool {
        // Data or WouldBlock both mean the peer is still there.
        self.peek_pending();
        self.connected.get()
    }

    fn has_available(&mut self) -> bool {
        self.peek_pending()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read_available(&mut byte) == 1).then_some(byte[0])
    }

    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        // Responses go out whole; block for at most the write timeout.
        if let Err(e) = self.stream.set_nonblocking(false) {
            self.mark_disconnected("socket mode error");
            return Err(e);
        }
        let written = self.stream.write_all(bytes);
        let restored = self.stream.set_nonblocking(true);
        self.settle_write(bytes.len(), written, restored)
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        self.mark_disconnected("closed locally");
    }

    fn read_available(&mut self, buf: &mut [u8]) -> usize {
        let mut count = 0;
        while count < buf.len() && self.connected.get() {
            match self.stream.read(&mut buf[count..]) {
                Ok(0) => self.mark_disconnected("end of stream"),
                Ok(n) => count += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    trace!(error = %e, "Read failed");
                    self.mark_disconnected("read error");
                }
            }
        }
        count
    }
}
