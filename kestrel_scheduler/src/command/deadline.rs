//! Run children together until one designated child finishes.

use kestrel_common::error::{CommandFault, SchedulerError};
use kestrel_common::resource::ResourceSet;

use super::context::TickContext;
use super::node::{Command, CommandNode, CommandState, InterruptBehavior};
use super::sequential::composite_behavior;

/// Parallel composite bounded by a deadline child.
///
/// All children start in the same tick. The group ends exactly when the
/// deadline child ends; continued children still running at that point
/// are stopped with `interrupted = true`. A continued child that finishes
/// earlier stays ended and is no longer ticked.
pub struct ParallelDeadline {
    name: String,
    deadline: CommandNode,
    others: Vec<CommandNode>,
    requirements: ResourceSet,
    behavior: InterruptBehavior,
}

impl ParallelDeadline {
    /// Children must have pairwise disjoint requirements.
    pub fn new(
        name: impl Into<String>,
        deadline: Box<dyn Command>,
        others: Vec<Box<dyn Command>>,
    ) -> Result<Self, SchedulerError> {
        let name = name.into();
        let deadline = CommandNode::boxed(deadline);
        let others: Vec<CommandNode> = others.into_iter().map(CommandNode::boxed).collect();

        let mut requirements = deadline.requirements();
        for child in &others {
            let req = child.requirements();
            if requirements.intersects(req) {
                return Err(SchedulerError::OverlappingChildren(name));
            }
            requirements = requirements.union(req);
        }

        let behavior = composite_behavior(core::iter::once(&deadline).chain(&others));

        Ok(Self {
            name,
            deadline,
            others,
            requirements,
            behavior,
        })
    }

    pub fn deadline_state(&self) -> CommandState {
        self.deadline.state()
    }

    /// Lifecycle state of each continued child.
    pub fn continued_states(&self) -> impl Iterator<Item = CommandState> + '_ {
        self.others.iter().map(CommandNode::state)
    }
}

impl Command for ParallelDeadline {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> ResourceSet {
        self.requirements
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.deadline.start(ctx)?;
        for child in self.others.iter_mut() {
            child.start(ctx)?;
        }
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.deadline.tick(ctx)?;
        for child in self.others.iter_mut() {
            child.tick(ctx)?;
        }
        if self.deadline.state().is_ended() {
            for child in self.others.iter_mut() {
                child.stop(ctx, true);
            }
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.deadline.state().is_ended()
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>, _interrupted: bool) {
        // Only reached with running children on interruption or fault.
        self.deadline.stop(ctx, true);
        for child in self.others.iter_mut() {
            child.stop(ctx, true);
        }
    }
}
