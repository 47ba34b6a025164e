//! Error taxonomy shared by the scheduler and its collaborators.
//!
//! None of these errors stop the tick loop: conflicts defer a command,
//! faults stop one command, configuration errors keep the previous
//! configuration.

use thiserror::Error;

use crate::resource::{CommandHandle, ResourceId};

/// A claim was refused because a holder may not be interrupted.
///
/// The requester stays pending and retries on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{resource} is held by uninterruptible {held_by}")]
pub struct ResourceConflict {
    /// First resource that could not be freed.
    pub resource: ResourceId,
    /// Command currently holding it.
    pub held_by: CommandHandle,
}

/// Unexpected failure inside a command's lifecycle hook.
///
/// Recovered by stopping the command with `interrupted = true`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandFault {
    /// Command logic reported a failure.
    #[error("command '{command}' failed: {reason}")]
    Failed { command: String, reason: String },

    /// An ended command instance was started again.
    #[error("command '{0}' has already ended and cannot be restarted")]
    AlreadyEnded(String),
}

impl CommandFault {
    /// Convenience constructor for `Failed`.
    pub fn failed(command: &str, reason: impl Into<String>) -> Self {
        Self::Failed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rejected rate-limiter configuration.
///
/// The limiter keeps its previous configuration and output.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigurationError {
    /// Positive rate limit must be finite and strictly positive.
    #[error("positive rate limit must be > 0, got {0}")]
    InvalidPositiveLimit(f64),

    /// Negative rate limit must be finite and strictly negative.
    #[error("negative rate limit must be < 0, got {0}")]
    InvalidNegativeLimit(f64),

    /// Seed value must be finite.
    #[error("seed value must be finite, got {0}")]
    InvalidSeed(f64),
}

/// Setup-time scheduler errors, returned as values instead of panicking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Resource table is full.
    #[error("cannot register '{0}': resource table full")]
    TooManyResources(String),

    /// Resource id not registered with this scheduler.
    #[error("unknown {0}")]
    UnknownResource(ResourceId),

    /// Default command must require exactly its own resource.
    #[error("default command '{command}' for {resource} must require exactly that resource")]
    InvalidDefault {
        command: String,
        resource: ResourceId,
    },

    /// Parallel group children must not share resources.
    #[error("parallel group '{0}' has children with overlapping requirements")]
    OverlappingChildren(String),

    /// Command built with invalid tuning.
    #[error("invalid command tuning: {0}")]
    Tuning(#[from] ConfigurationError),
}
