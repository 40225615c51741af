pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod tracker;

// Ports and their storage adapters
pub mod app;
pub mod infra;

// Domain data shapes shared across stages
pub mod domain;

pub use error::{MetricsError, Result};
