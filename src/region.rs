//! A region: admission control and bounded parallelism for one named zone.
//!
//! Each region owns a closed-aware admission queue and a fixed set of
//! worker threads, one per concurrency slot. Accepted bookings beyond the
//! cap queue up; shutdown closes the queue exactly once and lets admitted
//! work drain.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::booking::{Booking, BookingIds, BookingResult, stage};
use crate::driver_pool::DriverPool;
use crate::error::{BookingError, SubmitError};
use crate::events::EventSink;
use crate::types::{BookingId, Passenger};

/// What a booking ultimately reports through its handle.
pub type BookingOutcome = Result<BookingResult, BookingError>;

struct QueuedBooking {
    booking: Booking,
    result_tx: Sender<BookingOutcome>,
}

struct QueueState {
    queue: VecDeque<QueuedBooking>,
    closed: bool,
}

/// Synchronized FIFO admission queue; the closed bit is the region's
/// accepting flag and flips open -> closed exactly once.
struct WorkQueue {
    inner: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    fn new() -> Self {
        Self {
            inner: Mutex::new(QueueState {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue an admitted booking; hands it back if the queue is closed.
    fn push(&self, item: QueuedBooking) -> Result<(), QueuedBooking> {
        let mut guard = self.inner.lock().expect("work queue mutex poisoned");
        if guard.closed {
            return Err(item);
        }
        guard.queue.push_back(item);
        self.available.notify_one();
        Ok(())
    }

    /// Block until a booking is available or the queue is closed and
    /// fully drained.
    fn pop_blocking_or_closed(&self) -> Option<QueuedBooking> {
        let mut guard = self.inner.lock().expect("work queue mutex poisoned");
        loop {
            if let Some(item) = guard.queue.pop_front() {
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Close the queue and wake every blocked worker. Idempotent.
    fn close(&self) {
        let mut guard = self.inner.lock().expect("work queue mutex poisoned");
        guard.closed = true;
        self.available.notify_all();
    }

    fn is_closed(&self) -> bool {
        let guard = self.inner.lock().expect("work queue mutex poisoned");
        guard.closed
    }
}

/// Caller-side handle that eventually yields the booking's outcome.
pub struct BookingHandle {
    id: BookingId,
    result_rx: Receiver<BookingOutcome>,
}

impl BookingHandle {
    /// Id of the booking this handle tracks.
    pub fn id(&self) -> BookingId {
        self.id
    }

    /// Block until the booking reports its outcome.
    pub fn wait(self) -> BookingOutcome {
        self.result_rx
            .recv()
            .unwrap_or(Err(BookingError::Abandoned))
    }

    /// Block for at most `timeout`; `None` means still in flight.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BookingOutcome> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(BookingError::Abandoned)),
        }
    }
}

/// One independently-capped zone of the dispatch system.
pub struct Region {
    name: String,
    cap: usize,
    queue: Arc<WorkQueue>,
    // Worker handles are kept so the threads stay accounted for; shutdown
    // drains without joining.
    _workers: Vec<JoinHandle<()>>,
    pool: Arc<DriverPool>,
    sink: Arc<dyn EventSink>,
    ids: Arc<BookingIds>,
}

impl Region {
    /// Create a region and spawn its `cap` workers.
    pub(crate) fn new(
        name: impl Into<String>,
        cap: usize,
        pool: Arc<DriverPool>,
        sink: Arc<dyn EventSink>,
        ids: Arc<BookingIds>,
    ) -> Self {
        let name = name.into();
        debug_assert!(cap > 0, "region cap must be > 0");
        let queue = Arc::new(WorkQueue::new());

        let mut workers = Vec::with_capacity(cap);
        for i in 0..cap {
            let queue = Arc::clone(&queue);
            let pool = Arc::clone(&pool);
            let sink = Arc::clone(&sink);
            let worker = thread::Builder::new()
                .name(format!("{name}-worker-{i}"))
                .spawn(move || {
                    while let Some(item) = queue.pop_blocking_or_closed() {
                        let outcome = item.booking.run(&pool, sink.as_ref());
                        // The caller may have dropped its handle already.
                        let _ = item.result_tx.send(outcome);
                    }
                })
                .expect("failed to spawn region worker");
            workers.push(worker);
        }

        Self {
            name,
            cap,
            queue,
            _workers: workers,
            pool,
            sink,
            ids,
        }
    }

    /// The region's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of simultaneously running bookings.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Whether new bookings are still admitted.
    pub fn is_accepting(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Admit a booking for the passenger, or reject it if the region has
    /// shut down. Admission queues the booking; it commences once a
    /// worker slot frees up, and completes once a driver has also been
    /// obtained.
    pub fn submit(&self, passenger: Passenger) -> Result<BookingHandle, SubmitError> {
        if self.queue.is_closed() {
            eprintln!(
                "[REGION] {} rejected booking for {}: region is shut down",
                self.name, passenger.name
            );
            return Err(SubmitError::RegionShutDown(self.name.clone()));
        }

        let booking = Booking::new(self.ids.next_id(), passenger);
        let id = booking.id();
        let (result_tx, result_rx) = mpsc::channel();

        self.pool.note_waiter();
        self.sink.record(id, stage::CREATED);
        match self.queue.push(QueuedBooking { booking, result_tx }) {
            Ok(()) => Ok(BookingHandle { id, result_rx }),
            Err(_) => {
                // Admission lost the race against a concurrent shutdown.
                self.pool.forget_waiter();
                eprintln!(
                    "[REGION] {} rejected booking {id}: region is shut down",
                    self.name
                );
                Err(SubmitError::RegionShutDown(self.name.clone()))
            }
        }
    }

    /// Stop accepting new bookings; admitted work (queued included) still
    /// runs to completion. Idempotent, never cancels in-flight rides.
    pub fn shutdown(&self) {
        self.queue.close();
    }
}
