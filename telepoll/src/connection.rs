//! Connect and reconnect decisions for the single bot connection.

use tracing::{debug, info, warn};

use crate::stream::Transport;

#[derive(Debug)]
pub struct ConnectionManager<T> {
    transport: T,
    host: String,
    port: u16,
    last_connect_at: Option<u64>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, host: String, port: u16) -> Self {
        ConnectionManager {
            transport,
            host,
            port,
            last_connect_at: None,
        }
    }

    /// Connect unless already connected. Returns whether the transport is
    /// connected afterwards.
    pub fn ensure_connected(&mut self, now: u64) -> bool {
        if self.transport.connected() {
            return true;
        }

        match self.transport.connect(&self.host, self.port) {
            Ok(()) => {
                match self.last_connect_at {
                    Some(t) => info!(
                        "connected to {}:{} ({}s since last connection)",
                        self.host,
                        self.port,
                        now.saturating_sub(t) / 1000
                    ),
                    None => info!("connected to {}:{}", self.host, self.port),
                }
                self.last_connect_at = Some(now);
            }
            Err(e) => warn!("unable to connect to {}:{}: {}", self.host, self.port, e),
        }

        self.transport.connected()
    }

    pub fn close(&mut self) {
        if self.transport.connected() {
            debug!("closing connection to {}:{}", self.host, self.port);
        }
        self.transport.stop();
    }

    pub fn connected(&self) -> bool {
        self.transport.connected()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn last_connect_at(&self) -> Option<u64> {
        self.last_connect_at
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
