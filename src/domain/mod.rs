//! Domain layer for the Concierge orchestrator
//!
//! Core models, port traits and the domain error type.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
