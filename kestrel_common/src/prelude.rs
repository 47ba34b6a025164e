//! Prelude module for common re-exports.
//!
//! ```rust
//! use kestrel_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_CHANNELS, MAX_RESOURCES, MAX_SENSORS};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{CommandFault, ConfigurationError, ResourceConflict, SchedulerError};

// ─── Hardware Collaborators ─────────────────────────────────────────
pub use crate::hal::{
    Actuator, ActuatorBank, Buttons, ChannelId, InputAxis, InputSample, InputSource, Output,
    OutputFrame, SensorFrame, SensorId, SensorSource, SensorValue,
};

// ─── Resources ──────────────────────────────────────────────────────
pub use crate::resource::{CommandHandle, ResourceId, ResourceSet};

// ─── Dashboard / Telemetry ──────────────────────────────────────────
pub use crate::telemetry::{MemoryTelemetry, NullTelemetry, Telemetry};
pub use crate::tunable::{MemoryParameterStore, ParameterStore};
