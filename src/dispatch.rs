//! Top-level coordinator: region routing, shared driver custody, and
//! aggregate bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::booking::BookingIds;
use crate::driver_pool::{AcquireResult, DriverPool};
use crate::error::{ConfigError, SubmitError};
use crate::events::{ConsoleSink, EventSink, NoopSink};
use crate::region::{BookingHandle, Region};
use crate::types::{Driver, Passenger};

/// Generous floor on how many idle drivers the shared pool can hold.
pub const MAX_IDLE_DRIVERS: usize = 999;

/// The dispatch service: a fixed set of regions sharing one driver pool.
///
/// Constructed once with the full region table; regions are only ever
/// removed from service by shutting them down.
pub struct Dispatch {
    regions: HashMap<String, Region>,
    pool: Arc<DriverPool>,
}

impl Dispatch {
    /// Build a dispatch from a region-name -> concurrency-cap table.
    ///
    /// `log_events` routes booking lifecycle events to stdout; otherwise
    /// they are discarded.
    pub fn new(regions: HashMap<String, usize>, log_events: bool) -> Result<Self, ConfigError> {
        let sink: Arc<dyn EventSink> = if log_events {
            Arc::new(ConsoleSink)
        } else {
            Arc::new(NoopSink)
        };
        Self::with_sink(regions, sink)
    }

    /// As [`new`], with a caller-supplied event sink.
    ///
    /// [`new`]: Dispatch::new
    pub fn with_sink(
        regions: HashMap<String, usize>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        if regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }
        if let Some((region, _)) = regions.iter().find(|(_, cap)| **cap == 0) {
            return Err(ConfigError::InvalidCap {
                region: region.clone(),
            });
        }

        // Pool capacity must exceed the sum of all region caps so that a
        // legitimate driver return is never rejected.
        let total_cap: usize = regions.values().sum();
        let pool = Arc::new(DriverPool::new(MAX_IDLE_DRIVERS.max(total_cap + 1)));
        let ids = Arc::new(BookingIds::new());

        let regions = regions
            .into_iter()
            .map(|(name, cap)| {
                let region = Region::new(
                    name.clone(),
                    cap,
                    Arc::clone(&pool),
                    Arc::clone(&sink),
                    Arc::clone(&ids),
                );
                (name, region)
            })
            .collect();

        Ok(Self { regions, pool })
    }

    /// Book a passenger into the named region.
    pub fn book_passenger(
        &self,
        passenger: Passenger,
        region: &str,
    ) -> Result<BookingHandle, SubmitError> {
        match self.regions.get(region) {
            Some(region) => region.submit(passenger),
            None => Err(SubmitError::UnknownRegion(region.to_string())),
        }
    }

    /// Add a driver to the shared pool; false if the pool is at capacity.
    pub fn add_driver(&self, driver: Driver) -> bool {
        self.pool.release(driver)
    }

    /// Take a driver from the shared pool, blocking until one is free.
    ///
    /// The removal and the awaiting-gauge decrement are one atomic step
    /// with respect to [`bookings_awaiting_driver`].
    ///
    /// [`bookings_awaiting_driver`]: Dispatch::bookings_awaiting_driver
    pub fn acquire_driver(&self) -> AcquireResult {
        self.pool.acquire()
    }

    /// Live count of bookings created but not yet matched to a driver,
    /// across all regions.
    pub fn bookings_awaiting_driver(&self) -> usize {
        self.pool.awaiting()
    }

    /// Drivers currently idle in the shared pool.
    pub fn idle_drivers(&self) -> usize {
        self.pool.idle_count()
    }

    /// Tell every region to stop accepting bookings. Work already
    /// admitted keeps running; callers observe drain through their
    /// booking handles.
    pub fn shutdown(&self) {
        for region in self.regions.values() {
            region.shutdown();
        }
    }

    /// [`shutdown`], then cancel every booking still waiting for a
    /// driver. Bookings that already hold a driver finish undisturbed.
    ///
    /// [`shutdown`]: Dispatch::shutdown
    pub fn shutdown_now(&self) {
        self.shutdown();
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BookingError;
    use crate::events::test_support::RecordingSink;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn table(entries: &[(&str, usize)]) -> HashMap<String, usize> {
        entries
            .iter()
            .map(|(name, cap)| (name.to_string(), *cap))
            .collect()
    }

    #[test]
    fn construction_rejects_bad_region_tables() {
        assert_eq!(
            Dispatch::new(HashMap::new(), false).err(),
            Some(ConfigError::NoRegions)
        );
        assert_eq!(
            Dispatch::new(table(&[("north", 0)]), false).err(),
            Some(ConfigError::InvalidCap {
                region: "north".to_string()
            })
        );
    }

    #[test]
    fn unknown_region_is_rejected_without_side_effects() {
        let dispatch = Dispatch::new(table(&[("north", 2)]), false).expect("valid config");
        let rejected = dispatch.book_passenger(Passenger::new("alex", 0), "atlantis");
        assert_eq!(
            rejected.map(|h| h.id()),
            Err(SubmitError::UnknownRegion("atlantis".to_string()))
        );
        assert_eq!(dispatch.bookings_awaiting_driver(), 0);
    }

    #[test]
    fn awaiting_gauge_counts_created_minus_assigned() {
        let dispatch = Dispatch::new(table(&[("north", 2)]), false).expect("valid config");

        // No drivers yet: both bookings sit awaiting.
        let first = dispatch
            .book_passenger(Passenger::new("p0", 0), "north")
            .expect("accepted");
        let second = dispatch
            .book_passenger(Passenger::new("p1", 0), "north")
            .expect("accepted");
        assert_eq!(dispatch.bookings_awaiting_driver(), 2);

        assert!(dispatch.add_driver(Driver::new("a", 0)));
        assert!(dispatch.add_driver(Driver::new("b", 0)));

        first
            .wait_timeout(WAIT)
            .expect("outcome in time")
            .expect("completed");
        second
            .wait_timeout(WAIT)
            .expect("outcome in time")
            .expect("completed");
        assert_eq!(dispatch.bookings_awaiting_driver(), 0);
        assert_eq!(dispatch.idle_drivers(), 2);
    }

    #[test]
    fn booking_ids_increase_across_regions() {
        let dispatch =
            Dispatch::new(table(&[("north", 1), ("south", 1)]), false).expect("valid config");
        assert!(dispatch.add_driver(Driver::new("a", 0)));

        let mut previous = 0;
        for region in ["north", "south", "north"] {
            let handle = dispatch
                .book_passenger(Passenger::new("alex", 0), region)
                .expect("accepted");
            assert!(handle.id() > previous);
            previous = handle.id();
            handle
                .wait_timeout(WAIT)
                .expect("outcome in time")
                .expect("completed");
        }
    }

    #[test]
    fn lifecycle_events_reach_an_injected_sink() {
        let sink = Arc::new(RecordingSink::new());
        let dispatch = Dispatch::with_sink(table(&[("north", 1)]), Arc::clone(&sink) as _)
            .expect("valid config");
        assert!(dispatch.add_driver(Driver::new("barbara", 0)));

        let handle = dispatch
            .book_passenger(Passenger::new("alex", 0), "north")
            .expect("accepted");
        let id = handle.id();
        handle
            .wait_timeout(WAIT)
            .expect("outcome in time")
            .expect("completed");

        assert_eq!(
            sink.stages_for(id),
            vec![
                "created booking",
                "awaiting driver",
                "driver assigned",
                "passenger picked up",
                "trip completed",
                "driver released, booking complete",
            ]
        );
    }

    #[test]
    fn shutdown_propagates_to_every_region() {
        let dispatch =
            Dispatch::new(table(&[("north", 1), ("south", 1)]), false).expect("valid config");
        dispatch.shutdown();
        dispatch.shutdown();

        for region in ["north", "south"] {
            let rejected = dispatch.book_passenger(Passenger::new("late", 0), region);
            assert_eq!(
                rejected.map(|h| h.id()),
                Err(SubmitError::RegionShutDown(region.to_string()))
            );
        }
        assert_eq!(dispatch.bookings_awaiting_driver(), 0);
    }

    #[test]
    fn shutdown_now_cancels_driverless_bookings() {
        let dispatch = Dispatch::new(table(&[("north", 2)]), false).expect("valid config");
        let first = dispatch
            .book_passenger(Passenger::new("p0", 0), "north")
            .expect("accepted");
        let second = dispatch
            .book_passenger(Passenger::new("p1", 0), "north")
            .expect("accepted");

        dispatch.shutdown_now();
        for handle in [first, second] {
            assert_eq!(
                handle
                    .wait_timeout(WAIT)
                    .expect("outcome in time")
                    .unwrap_err(),
                BookingError::Cancelled
            );
        }
        assert_eq!(dispatch.bookings_awaiting_driver(), 0);
    }
}
