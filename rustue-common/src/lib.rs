//! rustue common library
//!
//! Shared building blocks for the rustue LTE UE stack:
//!
//! - Error types used across crates
//! - Configuration structures (YAML loadable)
//! - Logging infrastructure built on `tracing`
//! - The TTI (transmission time interval) counter type

pub mod config;
pub mod error;
pub mod logging;
pub mod tti;

pub use config::{
    LogConfig, PcapConfig, SchedulerConfig, SimConfig, StackConfig, UsimConfig,
};
pub use error::Error;
pub use logging::{init_logging_with_filter, Direction, LogLevel};
pub use tti::Tti;
