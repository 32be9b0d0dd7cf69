//! Ride-dispatch simulation: passengers request rides in named regions,
//! each region runs a bounded number of rides at once, and every ride
//! borrows a driver from a shared pool and returns it on completion.
//!
//! The coordination layer is the point of the crate: [`DriverPool`] is a
//! blocking, cancellable resource pool; [`Region`] is a bounded executor
//! with admission control; [`Booking`] is the multi-stage task that
//! threads through both; [`Dispatch`] wires it all together. The [`sim`]
//! module layers a demo/bench/stress harness on top of the public API.
//!
//! [`DriverPool`]: driver_pool::DriverPool
//! [`Region`]: region::Region
//! [`Booking`]: booking::Booking
//! [`Dispatch`]: dispatch::Dispatch

pub mod booking;
pub mod dispatch;
pub mod driver_pool;
pub mod error;
pub mod events;
pub mod region;
pub mod sim;
pub mod types;
