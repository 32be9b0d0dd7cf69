//! One booking: the ordered lifecycle of a single ride.
//!
//! A booking is created when a region admits a passenger and runs later on
//! one of the region's workers. Its only collaborators are the driver pool
//! and the event sink; it never sees the dispatch that spawned it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::driver_pool::{AcquireResult, DriverPool};
use crate::error::BookingError;
use crate::events::EventSink;
use crate::types::{BookingId, Passenger};

/// Stage descriptions emitted to the event sink, in lifecycle order.
pub mod stage {
    /// Booking admitted by a region.
    pub const CREATED: &str = "created booking";
    /// Blocked on the driver pool.
    pub const AWAITING_DRIVER: &str = "awaiting driver";
    /// A driver was obtained from the pool.
    pub const DRIVER_ASSIGNED: &str = "driver assigned";
    /// Pickup done, passenger on board.
    pub const PASSENGER_PICKED_UP: &str = "passenger picked up";
    /// Arrived at the destination.
    pub const TRIP_COMPLETED: &str = "trip completed";
    /// Driver back in the pool, result produced.
    pub const COMPLETE: &str = "driver released, booking complete";
    /// Result produced but the pool refused the driver back.
    pub const COMPLETE_RETURN_REJECTED: &str = "driver return rejected, booking complete";
    /// The driver wait was cancelled; no result.
    pub const CANCELLED: &str = "driver wait cancelled, booking abandoned";
}

/// Race-free generator of unique, strictly increasing booking ids.
///
/// Owned by a dispatch instance and shared into its regions, so isolated
/// dispatches in tests never observe each other's ids.
pub struct BookingIds {
    next: AtomicU64,
}

impl BookingIds {
    /// Start counting from 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Mint the next id.
    pub fn next_id(&self) -> BookingId {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for BookingIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot produced exactly once per completed booking.
#[derive(Debug, Clone)]
pub struct BookingResult {
    /// Id of the booking this result belongs to.
    pub id: BookingId,
    /// The passenger who rode.
    pub passenger: Arc<Passenger>,
    /// Name of the driver who served the ride.
    pub driver: String,
    /// Total elapsed time from creation to arrival.
    pub duration: Duration,
}

/// A single ride request, from creation to completion.
pub struct Booking {
    id: BookingId,
    passenger: Arc<Passenger>,
    requested_at: Instant,
}

impl Booking {
    /// Create a booking for the passenger, stamping the creation instant.
    pub fn new(id: BookingId, passenger: Passenger) -> Self {
        Self {
            id,
            passenger: Arc::new(passenger),
            requested_at: Instant::now(),
        }
    }

    /// The booking's unique id.
    pub fn id(&self) -> BookingId {
        self.id
    }

    /// Execute the ride lifecycle on the calling thread.
    ///
    /// Blocks once on the pool and once per delay stage. If the driver
    /// wait is cancelled the booking terminates without a passenger ever
    /// being picked up, and there is no driver to return.
    pub fn run(self, pool: &DriverPool, sink: &dyn EventSink) -> Result<BookingResult, BookingError> {
        sink.record(self.id, stage::AWAITING_DRIVER);
        let mut driver = match pool.acquire() {
            AcquireResult::Acquired(driver) => driver,
            AcquireResult::Cancelled | AcquireResult::TimedOut => {
                sink.record(self.id, stage::CANCELLED);
                return Err(BookingError::Cancelled);
            }
        };
        sink.record(self.id, stage::DRIVER_ASSIGNED);

        driver.pick_up(Arc::clone(&self.passenger));
        sink.record(self.id, stage::PASSENGER_PICKED_UP);

        driver.drive_to_destination();
        let duration = self.requested_at.elapsed();
        sink.record(self.id, stage::TRIP_COMPLETED);

        driver.drop_off();
        let driver_name = driver.name.clone();
        if pool.release(driver) {
            sink.record(self.id, stage::COMPLETE);
        } else {
            // Pool logged the capacity warning; surface it on the sink too.
            sink.record(self.id, stage::COMPLETE_RETURN_REJECTED);
        }

        Ok(BookingResult {
            id: self.id,
            passenger: self.passenger,
            driver: driver_name,
            duration,
        })
    }
}
