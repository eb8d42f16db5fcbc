//! Core types and trait definitions for the switchboard bridge.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store backend and the bridge itself depend on it; it depends on nothing
//! platform-specific.

pub mod agent;
pub mod error;
pub mod ids;
pub mod store;
pub mod topic;
pub mod transport;

pub use error::{Error, Result};
