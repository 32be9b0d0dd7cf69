//! Passenger and driver value objects shared across the system.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

/// Unique identifier for a booking, assigned at creation time.
pub type BookingId = u64;

/// A passenger waiting for a ride.
///
/// Immutable once created; the booking task only reads it. The travel
/// delay is re-rolled on every call, bounded by `max_travel_ms`.
#[derive(Debug, PartialEq, Eq)]
pub struct Passenger {
    /// Display name used in events and results.
    pub name: String,
    /// Upper bound (inclusive, milliseconds) on the simulated travel time.
    pub max_travel_ms: u64,
}

impl Passenger {
    /// Construct a passenger with the given travel-delay bound.
    pub fn new(name: impl Into<String>, max_travel_ms: u64) -> Self {
        Self {
            name: name.into(),
            max_travel_ms,
        }
    }

    /// A fresh random travel time in `0..=max_travel_ms` milliseconds.
    pub fn travel_time(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(0..=self.max_travel_ms);
        Duration::from_millis(ms)
    }
}

/// A driver that cycles between idle-in-pool and assigned-to-a-booking.
///
/// The current passenger is held only mid-booking: set by [`pick_up`],
/// cleared by [`drop_off`] before the driver goes back to the pool.
///
/// [`pick_up`]: Driver::pick_up
/// [`drop_off`]: Driver::drop_off
#[derive(Debug)]
pub struct Driver {
    /// Display name used in events and results.
    pub name: String,
    /// Upper bound (inclusive, milliseconds) on the simulated pickup time.
    pub max_pickup_ms: u64,
    passenger: Option<Arc<Passenger>>,
}

impl Driver {
    /// Construct an idle driver with the given pickup-delay bound.
    pub fn new(name: impl Into<String>, max_pickup_ms: u64) -> Self {
        Self {
            name: name.into(),
            max_pickup_ms,
            passenger: None,
        }
    }

    /// Take the passenger on board, blocking for the pickup delay.
    pub fn pick_up(&mut self, passenger: Arc<Passenger>) {
        self.passenger = Some(passenger);
        let ms = rand::thread_rng().gen_range(0..=self.max_pickup_ms);
        thread::sleep(Duration::from_millis(ms));
    }

    /// Drive to the destination, blocking for the passenger's travel time.
    pub fn drive_to_destination(&self) {
        debug_assert!(self.passenger.is_some(), "drive without a passenger");
        if let Some(passenger) = &self.passenger {
            thread::sleep(passenger.travel_time());
        }
    }

    /// Let the passenger out, clearing the mid-booking reference.
    pub fn drop_off(&mut self) -> Option<Arc<Passenger>> {
        self.passenger.take()
    }

    /// The passenger currently on board, if the driver is mid-booking.
    pub fn current_passenger(&self) -> Option<&Arc<Passenger>> {
        self.passenger.as_ref()
    }
}
