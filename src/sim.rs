//! Demo, benchmark, and stress-test runners layered on the dispatch API.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::booking::stage;
use crate::dispatch::Dispatch;
use crate::events::{ConsoleSink, EventSink};
use crate::region::BookingHandle;
use crate::types::{BookingId, Driver, Passenger};

// Demo timing knobs (small for quick CLI feedback).
const DEMO_DELAY_MS: u64 = 100;
// Upper bound on how long a single demo/bench booking may take.
const RESULT_WAIT: Duration = Duration::from_secs(60);

/// Best-effort CPU user/system time snapshot (seconds) on Unix platforms.
#[cfg(unix)]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    use libc::{RUSAGE_SELF, getrusage, rusage};
    // All-zero is a valid initial rusage.
    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    let user = usage.ru_utime.tv_sec as f64 + (usage.ru_utime.tv_usec as f64 / 1_000_000.0);
    let sys = usage.ru_stime.tv_sec as f64 + (usage.ru_stime.tv_usec as f64 / 1_000_000.0);
    Some((user, sys))
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times_seconds() -> Option<(f64, f64)> {
    None
}

/// Event sink that meters ride concurrency while forwarding to an
/// optional inner sink.
///
/// "Driver assigned" opens a ride, either completion stage closes it; the
/// high-water mark exposes driver exclusivity violations (more rides open
/// than drivers exist) without touching the core's state.
struct MeteringSink {
    inner: Option<Arc<dyn EventSink>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MeteringSink {
    fn new(inner: Option<Arc<dyn EventSink>>) -> Self {
        Self {
            inner,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    fn ride_opened(&self) {
        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let mut prev = self.max_active.load(Ordering::SeqCst);
        while current > prev {
            match self.max_active.compare_exchange(
                prev,
                current,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(next) => prev = next,
            }
        }
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl EventSink for MeteringSink {
    fn record(&self, booking: BookingId, description: &str) {
        match description {
            stage::DRIVER_ASSIGNED => self.ride_opened(),
            stage::COMPLETE | stage::COMPLETE_RETURN_REJECTED => {
                let prev = self.active.fetch_sub(1, Ordering::SeqCst);
                debug_assert!(prev > 0, "ride closed that never opened");
            }
            _ => {}
        }
        if let Some(inner) = &self.inner {
            inner.record(booking, description);
        }
    }
}

/// Wait out a batch of handles, splitting completed from cancelled and
/// accumulating trip durations.
fn collect_outcomes(handles: Vec<BookingHandle>) -> (usize, usize, Duration) {
    let mut completed = 0usize;
    let mut cancelled = 0usize;
    let mut total_trip = Duration::ZERO;
    for handle in handles {
        match handle.wait_timeout(RESULT_WAIT) {
            Some(Ok(result)) => {
                completed += 1;
                total_trip += result.duration;
            }
            Some(Err(_)) => cancelled += 1,
            None => {
                eprintln!("# warning,booking_still_in_flight,{}", handle.id());
            }
        }
    }
    (completed, cancelled, total_trip)
}

/// Run the default demo: two regions, two drivers, six passengers, and a
/// rejected late booking after shutdown.
pub fn run_demo() {
    let mut table = HashMap::new();
    table.insert("north".to_string(), 2);
    table.insert("south".to_string(), 3);

    let metrics = Arc::new(MeteringSink::new(Some(Arc::new(ConsoleSink))));
    let dispatch = match Dispatch::with_sink(table, Arc::clone(&metrics) as Arc<dyn EventSink>) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("demo error: {e}");
            return;
        }
    };

    let drivers = ["barbara", "gerald"];
    for name in drivers {
        if !dispatch.add_driver(Driver::new(name, DEMO_DELAY_MS)) {
            eprintln!("demo error: driver {name} rejected by pool");
        }
    }

    let passengers = ["alex", "bonnie", "chris", "dev", "erin", "farid"];
    let total = passengers.len();
    let start = Instant::now();
    let mut handles = Vec::with_capacity(total);
    for (i, name) in passengers.iter().enumerate() {
        let region = if i % 2 == 0 { "north" } else { "south" };
        match dispatch.book_passenger(Passenger::new(*name, DEMO_DELAY_MS), region) {
            Ok(handle) => handles.push(handle),
            Err(e) => eprintln!("demo error: booking for {name} rejected: {e}"),
        }
    }
    println!(
        "bookings awaiting driver after submission: {}",
        dispatch.bookings_awaiting_driver()
    );

    let (completed, cancelled, _) = collect_outcomes(handles);
    dispatch.shutdown();

    // New work is turned away once the regions are shut down.
    match dispatch.book_passenger(Passenger::new("zoe", DEMO_DELAY_MS), "north") {
        Ok(_) => eprintln!("demo error: booking accepted after shutdown"),
        Err(e) => println!("late booking rejected: {e}"),
    }

    println!("DEMO SUMMARY");
    println!("bookings_total={total} completed={completed} cancelled={cancelled}");
    println!("elapsed_ms={}", start.elapsed().as_millis());
    println!("max_concurrent_rides={}", metrics.max_active());
    println!("driver_violation={}", metrics.max_active() > drivers.len());
    println!(
        "awaiting_driver_at_end={}",
        dispatch.bookings_awaiting_driver()
    );
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    passengers: usize,
    drivers: usize,
    regions: usize,
    cap: usize,
    completed: usize,
    cancelled: usize,
    elapsed_ms: f64,
    throughput: f64,
    avg_trip_ms: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    max_active: usize,
    awaiting_at_end: usize,
    driver_violation: bool,
}

fn benchmark_once(
    passengers: usize,
    drivers: usize,
    regions: usize,
    cap: usize,
    delay_ms: u64,
) -> Option<BenchResult> {
    debug_assert!(passengers > 0, "passengers must be > 0");
    debug_assert!(drivers > 0, "drivers must be > 0");
    debug_assert!(regions > 0, "regions must be > 0");
    debug_assert!(cap > 0, "cap must be > 0");

    let table: HashMap<String, usize> = (0..regions)
        .map(|i| (format!("region-{i}"), cap))
        .collect();
    let region_names: Vec<String> = (0..regions).map(|i| format!("region-{i}")).collect();

    let metrics = Arc::new(MeteringSink::new(None));
    let dispatch = match Dispatch::with_sink(table, Arc::clone(&metrics) as Arc<dyn EventSink>) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            eprintln!("benchmark error: {e}");
            return None;
        }
    };
    for i in 0..drivers {
        if !dispatch.add_driver(Driver::new(format!("driver-{i}"), delay_ms)) {
            eprintln!("benchmark error: driver-{i} rejected by pool");
        }
    }

    let cpu_start = cpu_times_seconds();
    let start = Instant::now();
    let mut handles = Vec::with_capacity(passengers);
    for i in 0..passengers {
        let region = &region_names[i % regions];
        match dispatch.book_passenger(Passenger::new(format!("passenger-{i}"), delay_ms), region) {
            Ok(handle) => handles.push(handle),
            Err(e) => eprintln!("benchmark error: booking {i} rejected: {e}"),
        }
    }

    let (completed, cancelled, total_trip) = collect_outcomes(handles);
    dispatch.shutdown();

    let elapsed_ms = start.elapsed().as_millis() as f64;
    let throughput = if elapsed_ms > 0.0 {
        (completed as f64) / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    let avg_trip_ms = if completed > 0 {
        total_trip.as_millis() as f64 / completed as f64
    } else {
        0.0
    };

    let (cpu_user_s, cpu_sys_s) = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            (Some(user_end - user_start), Some(sys_end - sys_start))
        }
        _ => (None, None),
    };

    Some(BenchResult {
        passengers,
        drivers,
        regions,
        cap,
        completed,
        cancelled,
        elapsed_ms,
        throughput,
        avg_trip_ms,
        cpu_user_s,
        cpu_sys_s,
        max_active: metrics.max_active(),
        awaiting_at_end: dispatch.bookings_awaiting_driver(),
        driver_violation: metrics.max_active() > drivers,
    })
}

const CSV_HEADER: &str = "passengers,drivers,regions,cap,completed,cancelled,elapsed_ms,\
throughput_bookings_per_s,avg_trip_ms,cpu_user_s,cpu_sys_s,max_concurrent_rides,\
awaiting_at_end,driver_violation";

fn print_csv_row(result: &BenchResult, validate: bool) {
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{},{},{},{:.2},{:.2},{:.2},{},{},{},{},{}",
        result.passengers,
        result.drivers,
        result.regions,
        result.cap,
        result.completed,
        result.cancelled,
        result.elapsed_ms,
        result.throughput,
        result.avg_trip_ms,
        cpu_user,
        cpu_sys,
        result.max_active,
        result.awaiting_at_end,
        result.driver_violation
    );
    if validate {
        if result.driver_violation {
            eprintln!("# violation,driver_exclusivity");
        }
        if result.completed + result.cancelled < result.passengers {
            eprintln!(
                "# violation,lost_bookings,{}",
                result.passengers - result.completed - result.cancelled
            );
        }
    }
}

/// Run a single benchmark with optional parameter overrides.
pub fn run_benchmark(
    passengers: Option<usize>,
    drivers: Option<usize>,
    regions: Option<usize>,
    cap: Option<usize>,
    delay_ms: Option<u64>,
    validate: bool,
) {
    let passengers = passengers.unwrap_or(50);
    let drivers = drivers.unwrap_or(4);
    let regions = regions.unwrap_or(2);
    let cap = cap.unwrap_or(4);
    let delay_ms = delay_ms.unwrap_or(5);
    if passengers == 0 {
        eprintln!("benchmark error: passengers must be > 0");
        return;
    }
    if drivers == 0 {
        eprintln!("benchmark error: drivers must be > 0");
        return;
    }
    if regions == 0 {
        eprintln!("benchmark error: regions must be > 0");
        return;
    }
    if cap == 0 {
        eprintln!("benchmark error: cap must be > 0");
        return;
    }

    if let Some(result) = benchmark_once(passengers, drivers, regions, cap, delay_ms) {
        println!("{CSV_HEADER}");
        print_csv_row(&result, validate);
    }
}

/// Sweep multiple configurations and print CSV output, one row each.
pub fn run_stress(
    passenger_sets: Option<Vec<usize>>,
    driver_sets: Option<Vec<usize>>,
    cap_sets: Option<Vec<usize>>,
    delay_ms: Option<u64>,
    validate: bool,
) {
    let default_passenger_sets = [20usize, 50, 100];
    let default_driver_sets = [1usize, 2, 4, 8];
    let default_cap_sets = [1usize, 2, 4];
    let regions = 2usize;
    let delay_ms = delay_ms.unwrap_or(5);

    let passenger_sets = passenger_sets.unwrap_or_else(|| default_passenger_sets.to_vec());
    let driver_sets = driver_sets.unwrap_or_else(|| default_driver_sets.to_vec());
    let cap_sets = cap_sets.unwrap_or_else(|| default_cap_sets.to_vec());
    if passenger_sets.iter().any(|&n| n == 0) {
        eprintln!("stress error: passenger_sets must be > 0");
        return;
    }
    if driver_sets.iter().any(|&n| n == 0) {
        eprintln!("stress error: driver_sets must be > 0");
        return;
    }
    if cap_sets.iter().any(|&n| n == 0) {
        eprintln!("stress error: cap_sets must be > 0");
        return;
    }

    println!("{CSV_HEADER}");
    for &passengers in &passenger_sets {
        for &drivers in &driver_sets {
            for &cap in &cap_sets {
                if let Some(result) = benchmark_once(passengers, drivers, regions, cap, delay_ms) {
                    print_csv_row(&result, validate);
                }
            }
        }
    }
}
