//! Error taxonomy: construction failures, rejected admissions, and
//! booking outcomes that are not results.

use thiserror::Error;

/// Synchronous construction failures. A dispatch with a bad region table
/// is never built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The region table was empty.
    #[error("dispatch requires at least one region")]
    NoRegions,
    /// A region was configured with a zero concurrency cap.
    #[error("region {region:?} has a non-positive concurrency cap")]
    InvalidCap {
        /// Name of the offending region.
        region: String,
    },
}

/// A booking request that was turned away before a task existed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The region name is not part of this dispatch.
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    /// The region has stopped accepting new bookings.
    #[error("region {0} is shut down")]
    RegionShutDown(String),
}

/// A booking task that terminated without producing a result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    /// The wait for a driver was cancelled before one arrived. The task
    /// never held a driver and never picked up its passenger.
    #[error("driver wait cancelled before a driver was assigned")]
    Cancelled,
    /// The worker running the booking went away before reporting.
    #[error("booking worker exited before reporting a result")]
    Abandoned,
}
