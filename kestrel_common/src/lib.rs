//! Kestrel Common Library
//!
//! Shared identifiers, collaborator interfaces, error types and
//! configuration loading used by every Kestrel crate.
//!
//! # Module Structure
//!
//! - [`resource`] - Resource ids, resource sets and command handles
//! - [`hal`] - Actuator, sensor and operator-input interfaces
//! - [`tunable`] - Live-tunable parameter store
//! - [`telemetry`] - Append-only telemetry sinks
//! - [`error`] - Conflict, fault and configuration errors
//! - [`config`] - TOML configuration loading
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod error;
pub mod hal;
pub mod prelude;
pub mod resource;
pub mod telemetry;
pub mod tunable;
