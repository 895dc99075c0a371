//! Fake vehicle telemetry for populating a backend, plus the bcrypt helpers
//! used to seed its users.

pub mod api;
pub mod config;
pub mod models;
pub mod password;
pub mod runner;
pub mod simulation;
pub mod utils;
