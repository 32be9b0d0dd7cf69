//! Pluggable sink for booking lifecycle events.
//!
//! Every stage transition of a booking is reported as a
//! `(booking id, stage description)` pair. The sink is the only side
//! channel besides the final result, so tests and the harness can watch
//! the lifecycle without touching the core's state.

use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::BookingId;

/// Receiver of booking lifecycle events.
pub trait EventSink: Send + Sync {
    /// Record one stage transition for the given booking.
    fn record(&self, booking: BookingId, stage: &str);
}

/// Default sink: discards everything.
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _booking: BookingId, _stage: &str) {}
}

/// Stdout sink used when event logging is enabled.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn record(&self, booking: BookingId, stage: &str) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let current = thread::current();
        let thread_name = current.name().unwrap_or("unnamed");
        println!("[{ts}ms][{thread_name}] booking {booking}: {stage}");
    }
}
