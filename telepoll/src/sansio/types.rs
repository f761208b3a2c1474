//! Core types for the sans-io bot protocol.

use serde_derive::Serialize;

/// Update kinds the bot asks the server for.
pub const ALLOWED_UPDATES: &str = "message,callback_query,inline_query";

/// Bytes to be written to the transport.
///
/// The protocol functions produce `Transmit` values; the caller is responsible
/// for actually sending them.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmit {
    pub payload: Vec<u8>,
}

impl Transmit {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }
}

/// Result of scanning inbound bytes for the end of the HTTP headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParseResult {
    /// Headers are complete; the body starts at `body_offset`.
    Complete { body_offset: usize },
    /// The blank line separating headers from body has not arrived yet.
    Incomplete,
}

/// Parameters of a short-poll `getUpdates` call.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GetUpdates {
    pub limit: u8,
    pub timeout: u32,
    pub allowed_updates: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl GetUpdates {
    /// One update, no server-side wait, offset only when a cursor exists.
    pub fn short_poll(last_update_id: u32) -> Self {
        GetUpdates {
            limit: 1,
            timeout: 0,
            allowed_updates: ALLOWED_UPDATES,
            offset: if last_update_id != 0 {
                Some(last_update_id)
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_poll_without_cursor() {
        let v = serde_json::to_value(GetUpdates::short_poll(0)).unwrap();
        assert_eq!(
            v,
            json!({
                "limit": 1,
                "timeout": 0,
                "allowed_updates": "message,callback_query,inline_query"
            })
        );
    }

    #[test]
    fn test_short_poll_with_cursor() {
        let v = serde_json::to_value(GetUpdates::short_poll(101)).unwrap();
        assert_eq!(v["offset"], 101);
        assert_eq!(v["limit"], 1);
    }
}
