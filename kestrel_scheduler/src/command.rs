//! Command processing root.
//!
//! The `Command` trait, its Idle → Running → Ended state machine, the
//! per-tick context handed to every hook, and the `Sequential` and
//! `ParallelDeadline` combinators.

pub mod context;
pub mod deadline;
pub mod node;
pub mod sequential;

pub use context::TickContext;
pub use deadline::ParallelDeadline;
pub use node::{Command, CommandNode, CommandState, InterruptBehavior};
pub use sequential::Sequential;
