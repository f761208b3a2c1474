//! Byte transports the bot can drive.
//!
//! The bot never opens sockets itself: it talks to a [`Transport`], which the
//! host application picks. [`TcpTransport`] covers plain TCP; anything that
//! adds TLS on top (or a serial modem, or an in-memory mock) only has to
//! implement the same six operations.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A duplex byte stream with Arduino-`Client`-like semantics.
///
/// Implementations are allowed to be unreliable: `connected()` may turn false
/// at any time, and `available()` only reports what can be read right now
/// without blocking.
pub trait Transport {
    /// Open a connection to `host:port`, replacing any previous one.
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    fn connected(&self) -> bool;

    /// Close the connection. Closing an already closed transport is a no-op.
    fn stop(&mut self);

    /// Number of bytes that can be read without blocking.
    fn available(&mut self) -> usize;

    /// Read into `buf`, blocking at most for the transport's read timeout.
    ///
    /// Returns `Ok(0)` when the peer closed the connection.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    #[inline]
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        (**self).connect(host, port)
    }

    #[inline]
    fn connected(&self) -> bool {
        (**self).connected()
    }

    #[inline]
    fn stop(&mut self) {
        (**self).stop()
    }

    #[inline]
    fn available(&mut self) -> usize {
        (**self).available()
    }

    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_all(buf)
    }
}

const PEEK_SIZE: usize = 4096;

/// [`Transport`] over a plain `TcpStream`.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        TcpTransport {
            stream: None,
            connect_timeout,
            read_timeout,
        }
    }

    fn drop_stream(&mut self) {
        if let Some(s) = self.stream.take() {
            let _ = s.shutdown(Shutdown::Both);
        }
    }

    fn peek_available(stream: &TcpStream) -> io::Result<usize> {
        let mut buf = [0u8; PEEK_SIZE];
        stream.set_nonblocking(true)?;
        let peeked = stream.peek(&mut buf);
        stream.set_nonblocking(false)?;
        peeked
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        TcpTransport::new(Duration::from_secs(5), Duration::from_secs(1))
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.drop_stream();

        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    stream.set_nodelay(true)?;
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address found for {host}:{port}"),
            )
        }))
    }

    #[inline]
    fn connected(&self) -> bool {
        self.stream.is_some()
    }

    #[inline]
    fn stop(&mut self) {
        self.drop_stream();
    }

    fn available(&mut self) -> usize {
        let result = match self.stream {
            Some(ref s) => Self::peek_available(s),
            None => return 0,
        };

        match result {
            Ok(0) => {
                // orderly shutdown by the peer
                self.drop_stream();
                0
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => 0,
            Err(_) => {
                self.drop_stream();
                0
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = match self.stream {
            Some(ref mut s) => s.read(buf),
            None => return Ok(0),
        };

        match result {
            Ok(0) => {
                self.drop_stream();
                Ok(0)
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::BrokenPipe
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionReset
                ) =>
            {
                self.drop_stream();
                Err(e)
            }
            other => other,
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let result = match self.stream {
            Some(ref mut s) => s.write_all(buf).and_then(|_| s.flush()),
            None => return Err(io::Error::from(io::ErrorKind::NotConnected)),
        };

        if result.is_err() {
            self.drop_stream();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_unconnected() {
        let mut t = TcpTransport::default();
        assert!(!t.connected());
        assert_eq!(t.available(), 0);
        assert_eq!(t.read(&mut [0u8; 8]).unwrap(), 0);
        assert_eq!(
            t.write_all(b"x").unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        t.stop();
        assert!(!t.connected());
    }

    #[test]
    fn test_available_and_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut t = TcpTransport::default();
        t.connect("127.0.0.1", port).unwrap();
        assert!(t.connected());

        let (mut peer, _) = listener.accept().unwrap();
        peer.write_all(b"hello").unwrap();
        peer.flush().unwrap();

        let mut waited = 0;
        while t.available() < 5 && waited < 100 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert_eq!(t.available(), 5);

        let mut buf = [0u8; 16];
        let n = t.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        drop(peer);
        let mut waited = 0;
        while t.connected() && waited < 100 {
            t.available();
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert!(!t.connected());
    }
}
