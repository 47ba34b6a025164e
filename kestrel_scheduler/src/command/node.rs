//! Command trait and lifecycle state machine.
//!
//! ```text
//!   Idle ──start──▶ Running ──finished──▶ Ended { interrupted: false }
//!                      │
//!                      └────stop────────▶ Ended { interrupted: true }
//! ```
//!
//! `Ended` is terminal. A `CommandNode` guarantees `on_start` runs once
//! per instance and `on_stop` exactly once, however the node ends.

use kestrel_common::error::CommandFault;
use kestrel_common::resource::ResourceSet;

use super::context::TickContext;

// ─── Command Trait ──────────────────────────────────────────────────

/// Whether a running command yields to an incoming claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptBehavior {
    /// Incoming claims stop this command (`interrupted = true`).
    #[default]
    Interruptible,
    /// Incoming claims are refused while this command runs.
    RejectIncoming,
}

/// A unit of cooperative work over a set of resources.
///
/// Hooks are called only through [`CommandNode`], which enforces the
/// lifecycle. Faults returned from `on_start` / `on_tick` make the
/// scheduler stop the command with `interrupted = true`.
pub trait Command {
    /// Name used in logs and fault reports.
    fn name(&self) -> &str;

    /// Resources held for the command's whole lifetime. Must not change.
    fn requirements(&self) -> ResourceSet;

    fn interrupt_behavior(&self) -> InterruptBehavior {
        InterruptBehavior::Interruptible
    }

    /// Called once when the command starts. Re-initializes internal state.
    fn on_start(&mut self, _ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        Ok(())
    }

    /// Called once per tick while running.
    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault>;

    /// Completion predicate, evaluated after every `on_tick`.
    fn is_finished(&self) -> bool {
        false
    }

    /// Called exactly once when the command ends.
    fn on_stop(&mut self, _ctx: &mut TickContext<'_>, _interrupted: bool) {}
}

// ─── Lifecycle ──────────────────────────────────────────────────────

/// Lifecycle state of one command instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandState {
    #[default]
    Idle,
    Running,
    Ended { interrupted: bool },
}

impl CommandState {
    #[inline]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    #[inline]
    pub const fn is_ended(self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}

/// Owned command instance plus its lifecycle state.
pub struct CommandNode {
    command: Box<dyn Command>,
    state: CommandState,
}

impl CommandNode {
    pub fn new(command: impl Command + 'static) -> Self {
        Self::boxed(Box::new(command))
    }

    pub fn boxed(command: Box<dyn Command>) -> Self {
        Self {
            command,
            state: CommandState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> CommandState {
        self.state
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.command.name()
    }

    #[inline]
    pub fn requirements(&self) -> ResourceSet {
        self.command.requirements()
    }

    #[inline]
    pub fn interrupt_behavior(&self) -> InterruptBehavior {
        self.command.interrupt_behavior()
    }

    /// Idle → Running. Starting a running node is a no-op; starting an
    /// ended node is a fault.
    ///
    /// The node is Running even if `on_start` faults, so the caller's
    /// `stop` still reaches `on_stop`.
    pub fn start(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        match self.state {
            CommandState::Idle => {
                self.state = CommandState::Running;
                self.command.on_start(ctx)
            }
            CommandState::Running => Ok(()),
            CommandState::Ended { .. } => {
                Err(CommandFault::AlreadyEnded(self.command.name().to_string()))
            }
        }
    }

    /// Tick a running node and end it if its predicate holds.
    ///
    /// Non-running nodes are left untouched.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<CommandState, CommandFault> {
        if !self.state.is_running() {
            return Ok(self.state);
        }
        self.command.on_tick(ctx)?;
        if self.command.is_finished() {
            self.command.on_stop(ctx, false);
            self.state = CommandState::Ended { interrupted: false };
        }
        Ok(self.state)
    }

    /// Running → Ended. Returns `false` (and does nothing) if the node was
    /// not running.
    pub fn stop(&mut self, ctx: &mut TickContext<'_>, interrupted: bool) -> bool {
        if !self.state.is_running() {
            return false;
        }
        self.command.on_stop(ctx, interrupted);
        self.state = CommandState::Ended { interrupted };
        true
    }
}

impl core::fmt::Debug for CommandNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.command.name())
            .field("state", &self.state)
            .finish()
    }
}
