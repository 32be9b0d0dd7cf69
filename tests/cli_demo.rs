//! CLI integration tests for the demo mode.

use std::process::Command;

#[test]
fn demo_cli_completes_all_bookings_without_violations() {
    let bin = env!("CARGO_BIN_EXE_ride_dispatch");
    // Run the demo binary with default settings.
    let output = Command::new(bin)
        .output()
        .expect("failed to run demo binary");

    // Demo should exit cleanly.
    assert!(
        output.status.success(),
        "demo exited with non-zero status: {:?}",
        output.status
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("DEMO SUMMARY"),
        "demo summary missing from output"
    );

    // Every booking completes; nothing is cancelled in the demo.
    let totals_line = stdout
        .lines()
        .find(|line| line.starts_with("bookings_total="))
        .expect("bookings_total line missing");
    assert_eq!(
        totals_line.trim(),
        "bookings_total=6 completed=6 cancelled=0"
    );

    // Two drivers serve the whole demo; exclusivity must hold.
    let violation_line = stdout
        .lines()
        .find(|line| line.starts_with("driver_violation="))
        .expect("driver_violation line missing");
    assert_eq!(violation_line.trim(), "driver_violation=false");

    // Nobody is left waiting once everything drains.
    let awaiting_line = stdout
        .lines()
        .find(|line| line.starts_with("awaiting_driver_at_end="))
        .expect("awaiting_driver_at_end line missing");
    assert_eq!(awaiting_line.trim(), "awaiting_driver_at_end=0");

    // The demo books once more after shutdown to show the rejection.
    assert!(
        stdout.contains("late booking rejected"),
        "post-shutdown rejection missing from output"
    );
}
