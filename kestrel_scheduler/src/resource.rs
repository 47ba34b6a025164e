//! Resource table and claim planning.
//!
//! Each registered resource records its current holder and an optional
//! persistent default command. Claims are all-or-nothing: `try_claim`
//! decides without mutating anything, the scheduler then stops the
//! displaced holders and calls `assign`.

use heapless::Vec as FixedVec;
use tracing::debug;

use kestrel_common::consts::MAX_RESOURCES;
use kestrel_common::error::{CommandFault, ResourceConflict, SchedulerError};
use kestrel_common::resource::{CommandHandle, ResourceId, ResourceSet};

use crate::command::{Command, TickContext};

/// Distinct holders displaced by one claim.
pub type Displaced = FixedVec<CommandHandle, MAX_RESOURCES>;

/// Outcome of planning a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimResult {
    /// Every resource is free or held by an interruptible command.
    Granted {
        /// Holders to stop with `interrupted = true`, each listed once.
        displaced: Displaced,
    },
    /// At least one holder refuses interruption. Nothing changed.
    Conflict(ResourceConflict),
}

// ─── Default Commands ───────────────────────────────────────────────

/// Persistent default command bound to one resource.
///
/// Started whenever the resource is free and not yet active, stopped
/// (`interrupted = true`) when a holder claims the resource.
pub struct DefaultSlot {
    command: Box<dyn Command>,
    active: bool,
}

impl DefaultSlot {
    fn new(command: Box<dyn Command>) -> Self {
        Self {
            command,
            active: false,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.command.name()
    }

    /// Start if inactive, then tick. A finished default stops
    /// (`interrupted = false`) and restarts on the next free tick.
    ///
    /// Returns `Ok(true)` when the default started on this call. On fault
    /// the slot stays active; the caller must `abort` it.
    pub(crate) fn run(&mut self, ctx: &mut TickContext<'_>) -> Result<bool, CommandFault> {
        let started = !self.active;
        if started {
            self.active = true;
            self.command.on_start(ctx)?;
        }
        self.command.on_tick(ctx)?;
        if self.command.is_finished() {
            self.command.on_stop(ctx, false);
            self.active = false;
        }
        Ok(started)
    }

    /// Stop an active default with `interrupted = true`.
    pub(crate) fn abort(&mut self, ctx: &mut TickContext<'_>) -> bool {
        if !self.active {
            return false;
        }
        self.command.on_stop(ctx, true);
        self.active = false;
        true
    }
}

// ─── Resource Table ─────────────────────────────────────────────────

/// One exclusively lockable subsystem.
pub struct Resource {
    id: ResourceId,
    name: String,
    holder: Option<CommandHandle>,
    default: Option<DefaultSlot>,
}

impl Resource {
    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn holder(&self) -> Option<CommandHandle> {
        self.holder
    }

    #[inline]
    pub fn default_command(&self) -> Option<&DefaultSlot> {
        self.default.as_ref()
    }

    pub(crate) fn default_mut(&mut self) -> Option<&mut DefaultSlot> {
        self.default.as_mut()
    }
}

/// Fixed-capacity table of every registered resource.
#[derive(Default)]
pub struct ResourceTable {
    resources: FixedVec<Resource, MAX_RESOURCES>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str) -> Result<ResourceId, SchedulerError> {
        let id = u8::try_from(self.resources.len())
            .ok()
            .and_then(ResourceId::new)
            .ok_or_else(|| SchedulerError::TooManyResources(name.to_string()))?;
        self.resources
            .push(Resource {
                id,
                name: name.to_string(),
                holder: None,
                default: None,
            })
            .map_err(|_| SchedulerError::TooManyResources(name.to_string()))?;
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Set of every registered id.
    pub fn registered(&self) -> ResourceSet {
        self.resources.iter().map(Resource::id).collect()
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.get_mut(id.index())
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.resources.iter_mut()
    }

    #[inline]
    pub fn holder(&self, id: ResourceId) -> Option<CommandHandle> {
        self.get(id).and_then(Resource::holder)
    }

    /// Install a default command, returning the previous one.
    ///
    /// The command must require exactly `{id}`.
    pub(crate) fn set_default(
        &mut self,
        id: ResourceId,
        command: Box<dyn Command>,
    ) -> Result<Option<DefaultSlot>, SchedulerError> {
        if command.requirements() != ResourceSet::single(id) {
            return Err(SchedulerError::InvalidDefault {
                command: command.name().to_string(),
                resource: id,
            });
        }
        let resource = self
            .get_mut(id)
            .ok_or(SchedulerError::UnknownResource(id))?;
        Ok(resource.default.replace(DefaultSlot::new(command)))
    }

    /// Decide whether `set` can be granted.
    ///
    /// `may_interrupt` reports whether a current holder yields to incoming
    /// claims. Unregistered ids are treated as free.
    pub fn try_claim(
        &self,
        set: ResourceSet,
        may_interrupt: impl Fn(CommandHandle) -> bool,
    ) -> ClaimResult {
        let mut displaced = Displaced::new();
        for id in set.iter() {
            let Some(holder) = self.holder(id) else {
                continue;
            };
            if !may_interrupt(holder) {
                debug!("claim on {id} refused: held by {holder}");
                return ClaimResult::Conflict(ResourceConflict {
                    resource: id,
                    held_by: holder,
                });
            }
            if !displaced.contains(&holder) {
                // Cannot overflow: at most one holder per resource.
                let _ = displaced.push(holder);
            }
        }
        ClaimResult::Granted { displaced }
    }

    /// Record `handle` as holder of every resource in `set`.
    pub(crate) fn assign(&mut self, set: ResourceSet, handle: CommandHandle) {
        for id in set.iter() {
            if let Some(resource) = self.get_mut(id) {
                resource.holder = Some(handle);
            }
        }
    }

    /// Clear every resource in `set` still held by `handle`.
    pub(crate) fn release(&mut self, set: ResourceSet, handle: CommandHandle) {
        for id in set.iter() {
            if let Some(resource) = self.get_mut(id) {
                if resource.holder == Some(handle) {
                    resource.holder = None;
                }
            }
        }
    }
}
