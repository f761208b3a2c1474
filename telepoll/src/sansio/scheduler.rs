//! Poll scheduler state machine.
//!
//! Decides when a `getUpdates` request may be issued and tracks the single
//! outstanding request, the update cursor and the stall watchdog. It contains
//! no I/O and reads no clock: every decision takes `now` in milliseconds.

use std::time::Duration;

use super::types::GetUpdates;

/// The connection is presumed dead after this many poll intervals without
/// any reply.
pub const WATCHDOG_FACTOR: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct PollScheduler {
    min_update_interval_ms: u64,
    /// `None` until the first poll attempt, so the first call polls at once.
    last_update_at: Option<u64>,
    last_message_at: u64,
    waiting_reply: bool,
    last_update_id: u32,
}

impl PollScheduler {
    pub fn new(min_update_interval: Duration, now: u64) -> Self {
        PollScheduler {
            min_update_interval_ms: min_update_interval.as_millis() as u64,
            last_update_at: None,
            last_message_at: now,
            waiting_reply: false,
            last_update_id: 0,
        }
    }

    pub fn set_min_update_interval(&mut self, interval: Duration) {
        self.min_update_interval_ms = interval.as_millis() as u64;
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }

    /// True when no reply arrived for `WATCHDOG_FACTOR` poll intervals.
    pub fn watchdog_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.last_message_at)
            > WATCHDOG_FACTOR.saturating_mul(self.min_update_interval_ms)
    }

    /// Called on every poll cycle.
    ///
    /// Once the minimum interval has passed the attempt is recorded, and a
    /// request is returned if nothing is outstanding. The caller must follow
    /// up with [`begin_request`](Self::begin_request) when it actually sends.
    pub fn poll(&mut self, now: u64) -> Option<GetUpdates> {
        let due = match self.last_update_at {
            None => true,
            Some(t) => now.saturating_sub(t) > self.min_update_interval_ms,
        };
        if !due {
            return None;
        }

        self.last_update_at = Some(now);

        if self.waiting_reply {
            return None;
        }
        Some(GetUpdates::short_poll(self.last_update_id))
    }

    /// A request is about to be written.
    pub fn begin_request(&mut self) {
        self.waiting_reply = true;
    }

    /// The request could not be written; nothing is outstanding.
    pub fn abort_request(&mut self) {
        self.waiting_reply = false;
    }

    /// A reply (complete, empty or garbage) was drained from the transport.
    pub fn on_reply(&mut self, now: u64) {
        self.waiting_reply = false;
        self.last_message_at = now;
    }

    /// Traffic went out without a reply being due, e.g. one block of an upload.
    pub fn touch(&mut self, now: u64) {
        self.last_message_at = now;
    }

    /// The connection was torn down; whatever was outstanding is forgotten.
    pub fn on_reset(&mut self, now: u64) {
        self.waiting_reply = false;
        self.last_message_at = now;
    }

    /// Record that `update_id` has been consumed.
    ///
    /// The cursor never moves backwards.
    pub fn acknowledge(&mut self, update_id: u32) {
        self.last_update_id = self.last_update_id.max(update_id.saturating_add(1));
    }

    pub fn waiting_reply(&self) -> bool {
        self.waiting_reply
    }

    pub fn last_update_id(&self) -> u32 {
        self.last_update_id
    }

    pub fn last_message_at(&self) -> u64 {
        self.last_message_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> PollScheduler {
        PollScheduler::new(Duration::from_millis(500), 0)
    }

    #[test]
    fn test_first_poll_is_immediate() {
        let mut s = scheduler();
        let req = s.poll(0).unwrap();
        assert_eq!(req.offset, None);
        assert_eq!(req.limit, 1);
        assert_eq!(req.timeout, 0);
    }

    #[test]
    fn test_interval_throttles() {
        let mut s = scheduler();
        assert!(s.poll(0).is_some());
        assert!(s.poll(100).is_none());
        assert!(s.poll(500).is_none());
        assert!(s.poll(501).is_some());
    }

    #[test]
    fn test_no_poll_while_waiting() {
        let mut s = scheduler();
        assert!(s.poll(0).is_some());
        s.begin_request();

        assert!(s.poll(600).is_none());
        assert!(s.poll(1200).is_none());
        assert!(s.waiting_reply());

        s.on_reply(1300);
        assert!(!s.waiting_reply());
        // the skipped attempt at 1200 still counts for the interval
        assert!(s.poll(1300).is_none());
        assert!(s.poll(1701).is_some());
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut s = scheduler();
        s.acknowledge(100);
        assert_eq!(s.last_update_id(), 101);
        s.acknowledge(105);
        assert_eq!(s.last_update_id(), 106);
        s.acknowledge(50);
        assert_eq!(s.last_update_id(), 106);
        s.acknowledge(u32::MAX);
        assert_eq!(s.last_update_id(), u32::MAX);

        let mut s = scheduler();
        s.acknowledge(100);
        assert_eq!(s.poll(0).unwrap().offset, Some(101));
    }

    #[test]
    fn test_watchdog() {
        let mut s = scheduler();
        assert!(!s.watchdog_expired(5000));
        assert!(s.watchdog_expired(5001));

        s.on_reply(4000);
        assert!(!s.watchdog_expired(9000));
        assert!(s.watchdog_expired(9001));

        s.touch(9001);
        assert!(!s.watchdog_expired(9001));
    }

    #[test]
    fn test_abort_keeps_watchdog_running() {
        let mut s = scheduler();
        s.poll(0);
        s.begin_request();
        s.abort_request();
        assert!(!s.waiting_reply());
        assert_eq!(s.last_message_at(), 0);
        assert!(s.watchdog_expired(5001));
    }

    #[test]
    fn test_reset_clears_outstanding_request() {
        let mut s = scheduler();
        s.poll(0);
        s.begin_request();
        s.on_reset(6000);
        assert!(!s.waiting_reply());
        assert_eq!(s.last_message_at(), 6000);
        assert!(s.poll(6000).is_some());
    }
}
