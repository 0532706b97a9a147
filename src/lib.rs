//! Library exports for dumbometrics, shared between the binary and tests.

pub mod config;
pub mod hooks;
pub mod metrics;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
