//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty formatting
//! - Optional rolling file output
//! - PII scrubbing of user utterances

pub mod config;
pub mod logger;
pub mod pii_scrubbing;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use pii_scrubbing::PiiScrubber;
