//! Sans-IO core of the bot protocol.
//!
//! This module holds the parts of the client that do not touch the network:
//!
//! - [`protocol`]: HTTP request framing, header scanning and reply decoding
//! - [`scheduler`]: the poll scheduler, cursor and watchdog state machine
//! - [`types`]: the values passed between them
//!
//! [`Bot`](crate::Bot) wires them to a [`Transport`](crate::Transport) and a
//! [`Clock`](crate::Clock). Driving them directly looks like this:
//!
//! ```
//! use std::time::Duration;
//! use telepoll::sansio::{protocol, PollScheduler};
//!
//! let mut scheduler = PollScheduler::new(Duration::from_millis(500), 0);
//!
//! if let Some(request) = scheduler.poll(0) {
//!     let body = serde_json::to_value(&request)?;
//!     let transmit = protocol::serialize_request("api.telegram.org", "123:abc", "getUpdates", &body)?;
//!     scheduler.begin_request();
//!     // socket.write_all(&transmit.payload)?;
//!     # let _ = transmit;
//! }
//!
//! // later, once bytes arrived:
//! let inbound = b"HTTP/1.1 200 OK\r\n\r\n{\"ok\":true,\"result\":[]}";
//! scheduler.on_reply(20);
//! let reply = protocol::parse_reply(protocol::body(inbound))?;
//! assert_eq!(reply["ok"], true);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod protocol;
pub mod scheduler;
pub mod types;

pub use self::protocol::{parse_message, parse_reply, serialize_request, Multipart};
pub use self::scheduler::PollScheduler;
pub use self::types::{GetUpdates, ParseResult, Transmit};
