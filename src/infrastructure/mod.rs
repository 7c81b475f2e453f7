//! Infrastructure layer module
//!
//! Adapters that satisfy the domain ports, plus configuration and logging:
//! - Static city catalogs and the place gazetteer
//! - Conversation store with TTL
//! - Telemetry sinks
//! - Clocks
//! - Configuration management (figment)
//! - Logging infrastructure

pub mod catalog;
pub mod clock;
pub mod config;
pub mod logging;
pub mod store;
pub mod telemetry;
