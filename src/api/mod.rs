pub mod client;
pub mod locations;

pub use client::{ApiError, TelemetryClient};
pub use locations::pick_locations;
