//! Infrastructure layer providing abstractions for external dependencies.
//!
//! This module contains traits and implementations for:
//! - Hostname lookup
//! - Time sources
//!
//! These abstractions enable dependency injection and deterministic tests
//! without modifying the resolver logic.

pub mod clock;
pub mod dns;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dns::{HickoryLookup, HostLookup};
