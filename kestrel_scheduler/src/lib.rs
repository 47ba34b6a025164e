//! # Kestrel Scheduler Library
//!
//! Cooperative, tick-driven command scheduler for a small robot
//! controller. Commands claim exclusive resources, run for any number of
//! ticks and end on their own or by interruption. Idle resources fall back
//! to their default command.
//!
//! ## Layers
//!
//! 1. **command** - Command lifecycle and sequential / deadline composites
//! 2. **resource** - Resource table, claims and default commands
//! 3. **scheduler** - Tick phases, triggers, cancellation and faults
//! 4. **control** - Rate limiting, input shaping and drive kinematics
//! 5. **robot** - Drive, intake and eject commands plus dashboard monitors
//! 6. **cycle** - Fixed-period host loop around the scheduler
//!
//! ## Single Threaded
//!
//! Everything runs on the control thread. Commands borrow their
//! collaborators through a [`command::TickContext`] for the duration of a
//! hook call and hold no references between ticks.

#![deny(clippy::disallowed_types)]

pub mod command;
pub mod config;
pub mod control;
pub mod cycle;
pub mod resource;
pub mod robot;
pub mod scheduler;
pub mod sim;
