//! Run children one after another.

use kestrel_common::error::CommandFault;
use kestrel_common::resource::ResourceSet;

use super::context::TickContext;
use super::node::{Command, CommandNode, CommandState, InterruptBehavior};

/// Ordered composite: exactly one child runs at a time, in list order.
///
/// Holds the union of all children's requirements for its whole lifetime.
/// When a child finishes, the next one starts in the same tick; its first
/// `on_tick` happens on the following tick.
pub struct Sequential {
    name: String,
    children: Vec<CommandNode>,
    index: usize,
    requirements: ResourceSet,
    behavior: InterruptBehavior,
}

impl Sequential {
    pub fn new(name: impl Into<String>, children: Vec<Box<dyn Command>>) -> Self {
        let children: Vec<CommandNode> = children.into_iter().map(CommandNode::boxed).collect();
        let requirements = children
            .iter()
            .fold(ResourceSet::EMPTY, |acc, c| acc.union(c.requirements()));
        Self {
            name: name.into(),
            behavior: composite_behavior(&children),
            children,
            index: 0,
            requirements,
        }
    }

    /// Index of the current child (`len()` once all have finished).
    #[inline]
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Lifecycle state of each child.
    pub fn child_states(&self) -> impl Iterator<Item = CommandState> + '_ {
        self.children.iter().map(CommandNode::state)
    }
}

/// A composite refuses incoming claims only if every child does.
pub(crate) fn composite_behavior<'a>(
    children: impl IntoIterator<Item = &'a CommandNode>,
) -> InterruptBehavior {
    let mut children = children.into_iter().peekable();
    if children.peek().is_some()
        && children.all(|c| c.interrupt_behavior() == InterruptBehavior::RejectIncoming)
    {
        InterruptBehavior::RejectIncoming
    } else {
        InterruptBehavior::Interruptible
    }
}

impl Command for Sequential {
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
        self.index = 0;
        match self.children.first_mut() {
            Some(first) => first.start(ctx),
            None => Ok(()),
        }
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        let Some(current) = self.children.get_mut(self.index) else {
            return Ok(());
        };
        if current.tick(ctx)?.is_ended() {
            self.index += 1;
            if let Some(next) = self.children.get_mut(self.index) {
                next.start(ctx)?;
            }
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.index >= self.children.len()
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>, interrupted: bool) {
        if interrupted {
            if let Some(current) = self.children.get_mut(self.index) {
                current.stop(ctx, true);
            }
        }
    }
}
