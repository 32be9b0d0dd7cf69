//! Shared pool of idle drivers with blocking, cancellable acquisition.
//!
//! One mutex guards the idle set, the closed bit, and the awaiting-driver
//! gauge, so "driver handed out" and "gauge decremented" are a single
//! atomic step for any concurrent reader. A successful release notifies a
//! waiter; closing the pool notifies all of them.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::types::Driver;

/// Outcome of a blocking acquisition attempt.
#[derive(Debug)]
pub enum AcquireResult {
    /// A driver was removed from the idle set and is now owned by the caller.
    Acquired(Driver),
    /// The pool was closed before a driver became available.
    Cancelled,
    /// The deadline passed before a driver became available.
    TimedOut,
}

struct PoolState {
    idle: VecDeque<Driver>,
    closed: bool,
    awaiting: usize,
}

impl PoolState {
    /// A waiter registered via `note_waiter` stops waiting, with or
    /// without a driver. Acquires with no registered waiter leave the
    /// gauge at zero; it never goes negative.
    fn settle_waiter(&mut self) {
        self.awaiting = self.awaiting.saturating_sub(1);
    }
}

/// Thread-safe bounded collection of idle drivers.
pub struct DriverPool {
    inner: Mutex<PoolState>,
    available: Condvar,
    capacity: usize,
}

impl DriverPool {
    /// Create an empty pool that holds at most `capacity` idle drivers.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolState {
                idle: VecDeque::new(),
                closed: false,
                awaiting: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Block until a driver is available, then remove and return it.
    ///
    /// Returns [`AcquireResult::Cancelled`] if the pool is closed while
    /// the idle set is empty; a cancelled acquire removes nothing.
    pub fn acquire(&self) -> AcquireResult {
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        loop {
            if let Some(driver) = state.idle.pop_front() {
                state.settle_waiter();
                return AcquireResult::Acquired(driver);
            }
            if state.closed {
                state.settle_waiter();
                return AcquireResult::Cancelled;
            }
            state = self.available.wait(state).expect("condvar wait failed");
        }
    }

    /// As [`acquire`], but give up once `timeout` has elapsed.
    ///
    /// [`acquire`]: DriverPool::acquire
    pub fn acquire_timeout(&self, timeout: Duration) -> AcquireResult {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        loop {
            if let Some(driver) = state.idle.pop_front() {
                state.settle_waiter();
                return AcquireResult::Acquired(driver);
            }
            if state.closed {
                state.settle_waiter();
                return AcquireResult::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                state.settle_waiter();
                return AcquireResult::TimedOut;
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .expect("condvar wait failed");
            state = guard;
        }
    }

    /// Return a driver to the idle set.
    ///
    /// Fails (and warns) when the pool already holds `capacity` idle
    /// drivers; the hard cap rejects rather than blocks. Every successful
    /// release wakes a blocked acquire if one is waiting.
    pub fn release(&self, driver: Driver) -> bool {
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        if state.idle.len() >= self.capacity {
            eprintln!(
                "[POOL] release rejected, pool at capacity: driver={} capacity={}",
                driver.name, self.capacity
            );
            return false;
        }
        state.idle.push_back(driver);
        self.available.notify_one();
        true
    }

    /// Cancel every blocked and future empty-handed acquire. Idempotent.
    ///
    /// Drivers still in the idle set remain acquirable; close only stops
    /// the waiting.
    pub fn close(&self) {
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        state.closed = true;
        self.available.notify_all();
    }

    /// Register a booking that will acquire a driver.
    pub fn note_waiter(&self) {
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        state.awaiting += 1;
    }

    /// Undo a `note_waiter` whose booking was never admitted.
    pub(crate) fn forget_waiter(&self) {
        let mut state = self.inner.lock().expect("driver pool mutex poisoned");
        state.settle_waiter();
    }

    /// Number of bookings currently awaiting a driver.
    pub fn awaiting(&self) -> usize {
        let state = self.inner.lock().expect("driver pool mutex poisoned");
        state.awaiting
    }

    /// Number of drivers currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        let state = self.inner.lock().expect("driver pool mutex poisoned");
        state.idle.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn driver(name: &str) -> Driver {
        Driver::new(name, 0)
    }

    #[test]
    fn drivers_are_acquired_once() {
        let pool = Arc::new(DriverPool::new(8));
        for name in ["a", "b", "c", "d"] {
            assert!(pool.release(driver(name)));
        }

        let contenders = 4;
        let barrier = Arc::new(Barrier::new(contenders));
        let (tx, rx) = mpsc::channel();

        let mut handles = Vec::new();
        for _ in 0..contenders {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            pool.note_waiter();
            handles.push(thread::spawn(move || {
                barrier.wait();
                match pool.acquire() {
                    AcquireResult::Acquired(driver) => {
                        tx.send(driver.name).expect("send driver name");
                    }
                    other => panic!("expected a driver, got {other:?}"),
                }
            }));
        }

        let mut seen = HashSet::new();
        for _ in 0..contenders {
            let name = rx
                .recv_timeout(Duration::from_secs(1))
                .expect("receive driver name");
            // Each driver must be handed out exactly once.
            assert!(seen.insert(name));
        }

        for handle in handles {
            handle.join().expect("acquirer thread panicked");
        }
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.awaiting(), 0);
    }

    #[test]
    fn acquire_wakes_on_release() {
        let pool = Arc::new(DriverPool::new(4));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();

        pool.note_waiter();
        let pool_clone = Arc::clone(&pool);
        let handle = thread::spawn(move || {
            ready_tx.send(()).expect("send ready");
            match pool_clone.acquire() {
                AcquireResult::Acquired(driver) => {
                    tx.send(driver.name).expect("send driver name");
                }
                other => panic!("expected a driver, got {other:?}"),
            }
        });

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        // Releasing after the acquirer blocks should wake it.
        assert!(pool.release(driver("barbara")));

        let name = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("receive driver name");
        assert_eq!(name, "barbara");
        handle.join().expect("acquirer thread panicked");
        assert_eq!(pool.awaiting(), 0);
    }

    #[test]
    fn blocked_acquirers_each_get_unique_driver() {
        let pool = Arc::new(DriverPool::new(8));
        let contenders = 4;
        let barrier = Arc::new(Barrier::new(contenders));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let mut handles = Vec::new();
        for _ in 0..contenders {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            let ready_tx = ready_tx.clone();
            let done_tx = done_tx.clone();
            pool.note_waiter();
            handles.push(thread::spawn(move || {
                barrier.wait();
                ready_tx.send(()).expect("ready");
                match pool.acquire() {
                    AcquireResult::Acquired(driver) => {
                        done_tx.send(driver.name).expect("done");
                    }
                    other => panic!("expected a driver, got {other:?}"),
                }
            }));
        }

        for _ in 0..contenders {
            ready_rx
                .recv_timeout(Duration::from_secs(1))
                .expect("ready recv");
        }

        // Provide exactly one driver per blocked acquirer.
        for i in 0..contenders {
            assert!(pool.release(driver(&format!("driver-{i}"))));
        }

        let mut seen = HashSet::new();
        for _ in 0..contenders {
            let name = done_rx
                .recv_timeout(Duration::from_secs(1))
                .expect("done recv");
            assert!(seen.insert(name));
        }

        for handle in handles {
            handle.join().expect("acquirer thread panicked");
        }
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn close_cancels_empty_handed_waiters_and_keeps_idle_set_intact() {
        let pool = Arc::new(DriverPool::new(4));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let pool = Arc::clone(&pool);
            let ready_tx = ready_tx.clone();
            let done_tx = done_tx.clone();
            pool.note_waiter();
            handles.push(thread::spawn(move || {
                ready_tx.send(()).expect("ready");
                let cancelled = matches!(pool.acquire(), AcquireResult::Cancelled);
                done_tx.send(cancelled).expect("done");
            }));
        }

        for _ in 0..2 {
            ready_rx
                .recv_timeout(Duration::from_secs(1))
                .expect("ready recv");
        }
        pool.close();

        for _ in 0..2 {
            assert!(
                done_rx
                    .recv_timeout(Duration::from_secs(1))
                    .expect("done recv")
            );
        }
        for handle in handles {
            handle.join().expect("waiter thread panicked");
        }

        // Cancellation removed nothing; a late release still lands.
        assert!(pool.release(driver("late")));
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.awaiting(), 0);
    }

    #[test]
    fn acquire_drains_idle_set_even_after_close() {
        let pool = DriverPool::new(4);
        assert!(pool.release(driver("stayer")));
        pool.close();
        pool.close();

        pool.note_waiter();
        match pool.acquire() {
            AcquireResult::Acquired(d) => assert_eq!(d.name, "stayer"),
            other => panic!("expected a driver, got {other:?}"),
        }
        pool.note_waiter();
        assert!(matches!(pool.acquire(), AcquireResult::Cancelled));
    }

    #[test]
    fn release_fails_at_capacity() {
        let pool = DriverPool::new(1);
        assert!(pool.release(driver("first")));
        assert!(!pool.release(driver("second")));
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn acquire_timeout_reports_timed_out() {
        let pool = DriverPool::new(1);
        pool.note_waiter();
        let start = Instant::now();
        assert!(matches!(
            pool.acquire_timeout(Duration::from_millis(30)),
            AcquireResult::TimedOut
        ));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(pool.awaiting(), 0);
    }

    #[test]
    fn gauge_follows_waiter_lifecycle() {
        let pool = DriverPool::new(4);
        pool.note_waiter();
        pool.note_waiter();
        assert_eq!(pool.awaiting(), 2);

        pool.forget_waiter();
        assert_eq!(pool.awaiting(), 1);

        assert!(pool.release(driver("a")));
        assert!(matches!(pool.acquire(), AcquireResult::Acquired(_)));
        assert_eq!(pool.awaiting(), 0);
    }
}
