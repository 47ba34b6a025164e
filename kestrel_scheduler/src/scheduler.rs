//! Cooperative tick-driven command scheduler.
//!
//! ## Tick Phases
//! 1. Periodic monitors, queued cancellations, trigger polling, then
//!    every pending command attempts its claim. Granted commands displace
//!    interruptible holders and start; refused ones stay pending.
//! 2. Every free resource runs its default command.
//! 3. Every running command is ticked.
//! 4. Ended commands are removed and their resources released.
//!
//! Faults never stop the loop: the faulting command is stopped with
//! `interrupted = true`, logged, and surfaced to telemetry.

use serde::Serialize;
use tracing::{debug, error, info};

use kestrel_common::consts::default_period_s;
use kestrel_common::error::{CommandFault, SchedulerError};
use kestrel_common::hal::{Buttons, InputSource, OutputFrame, SensorSource};
use kestrel_common::resource::{CommandHandle, ResourceId, ResourceSet};
use kestrel_common::telemetry::Telemetry;
use kestrel_common::tunable::ParameterStore;

use crate::command::{Command, CommandNode, CommandState, InterruptBehavior, TickContext};
use crate::resource::{ClaimResult, DefaultSlot, Resource, ResourceTable};

// ─── Collaborators ──────────────────────────────────────────────────

/// External collaborators borrowed for one tick.
pub struct Io<'a> {
    pub inputs: &'a dyn InputSource,
    pub sensors: &'a dyn SensorSource,
    pub params: &'a mut dyn ParameterStore,
    pub telemetry: &'a mut dyn Telemetry,
}

/// Per-tick subsystem monitor (dashboard and log publication).
pub trait Periodic {
    fn name(&self) -> &str;

    /// Runs at the start of every tick, before any command.
    fn periodic(&mut self, ctx: &mut TickContext<'_>);
}

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Commands that started this tick.
    pub started: u32,
    /// Commands that ended on their own this tick.
    pub finished: u32,
    /// Commands stopped with `interrupted = true` this tick.
    pub interrupted: u32,
    /// Faults raised by command hooks or factories.
    pub faults: u32,
    /// Pending commands refused by a conflict this tick.
    pub deferred: u32,
}

// ─── Triggers ───────────────────────────────────────────────────────

/// When a trigger fires relative to its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Schedule on the rising edge.
    OnPress,
    /// Schedule on the rising edge, cancel on the falling edge.
    WhileHeld,
    /// Schedule on the falling edge.
    OnRelease,
}

/// Builds a fresh command instance every time a trigger fires.
pub type CommandFactory = Box<dyn FnMut() -> Result<Box<dyn Command>, SchedulerError>>;

/// What a trigger does when it fires.
pub enum TriggerAction {
    Schedule(CommandFactory),
    CancelAll,
}

/// Input predicate bound to an action.
pub struct Trigger {
    name: String,
    condition: Box<dyn Fn(&dyn InputSource) -> bool>,
    binding: Binding,
    action: TriggerAction,
    previous: bool,
    launched: Option<CommandHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        binding: Binding,
        condition: impl Fn(&dyn InputSource) -> bool + 'static,
        factory: impl FnMut() -> Result<Box<dyn Command>, SchedulerError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            condition: Box::new(condition),
            binding,
            action: TriggerAction::Schedule(Box::new(factory)),
            previous: false,
            launched: None,
        }
    }

    /// Trigger on any of `buttons` being held.
    pub fn button(
        name: impl Into<String>,
        buttons: Buttons,
        binding: Binding,
        factory: impl FnMut() -> Result<Box<dyn Command>, SchedulerError> + 'static,
    ) -> Self {
        Self::new(
            name,
            binding,
            move |inputs: &dyn InputSource| inputs.buttons().intersects(buttons),
            factory,
        )
    }

    /// Cancel every command when `buttons` are pressed.
    pub fn cancel_all(name: impl Into<String>, buttons: Buttons) -> Self {
        Self {
            name: name.into(),
            condition: Box::new(move |inputs: &dyn InputSource| {
                inputs.buttons().intersects(buttons)
            }),
            binding: Binding::OnPress,
            action: TriggerAction::CancelAll,
            previous: false,
            launched: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self, inputs: &dyn InputSource) -> Option<Edge> {
        let now = (self.condition)(inputs);
        let edge = match (self.previous, now) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        };
        self.previous = now;
        edge
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

struct Scheduled {
    handle: CommandHandle,
    node: CommandNode,
    requirements: ResourceSet,
}

/// Owns resources, defaults, triggers and every scheduled command.
pub struct Scheduler {
    period_s: f64,
    resources: ResourceTable,
    active: Vec<Scheduled>,
    pending: Vec<Scheduled>,
    cancel_requests: Vec<CommandHandle>,
    retired_defaults: Vec<DefaultSlot>,
    triggers: Vec<Trigger>,
    periodics: Vec<Box<dyn Periodic>>,
    outputs: OutputFrame,
    next_handle: u64,
    tick_count: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(default_period_s())
    }
}

impl Scheduler {
    /// Create a scheduler ticking every `period_s` seconds.
    pub fn new(period_s: f64) -> Self {
        Self {
            period_s,
            resources: ResourceTable::new(),
            active: Vec::new(),
            pending: Vec::new(),
            cancel_requests: Vec::new(),
            retired_defaults: Vec::new(),
            triggers: Vec::new(),
            periodics: Vec::new(),
            outputs: OutputFrame::default(),
            next_handle: 1,
            tick_count: 0,
        }
    }

    // ── Setup ──

    pub fn register_resource(&mut self, name: &str) -> Result<ResourceId, SchedulerError> {
        let id = self.resources.register(name)?;
        info!("registered resource '{name}' as {id}");
        Ok(id)
    }

    /// Install the persistent default command of `resource`.
    ///
    /// The command must require exactly `{resource}`. A replaced default
    /// that is active is stopped at the start of the next tick.
    pub fn set_default_command(
        &mut self,
        resource: ResourceId,
        command: Box<dyn Command>,
    ) -> Result<(), SchedulerError> {
        let name = command.name().to_string();
        if let Some(old) = self.resources.set_default(resource, command)? {
            if old.is_active() {
                self.retired_defaults.push(old);
            }
        }
        info!("default command for {resource} is now '{name}'");
        Ok(())
    }

    pub fn bind(&mut self, trigger: Trigger) {
        debug!("bound trigger '{}'", trigger.name());
        self.triggers.push(trigger);
    }

    pub fn add_periodic(&mut self, task: Box<dyn Periodic>) {
        debug!("added periodic task '{}'", task.name());
        self.periodics.push(task);
    }

    // ── Commands ──

    /// Queue a command; it claims its resources in the next tick.
    pub fn schedule(&mut self, command: Box<dyn Command>) -> Result<CommandHandle, SchedulerError> {
        enqueue(
            &mut self.pending,
            &mut self.next_handle,
            self.resources.registered(),
            command,
        )
    }

    /// Cancel a command. Pending commands are dropped immediately; running
    /// ones are stopped (`interrupted = true`) at the start of the next
    /// tick. Returns `false` for unknown or already-ended handles.
    pub fn cancel(&mut self, handle: CommandHandle) -> bool {
        if let Some(pos) = self.pending.iter().position(|s| s.handle == handle) {
            let entry = self.pending.remove(pos);
            debug!("dropped pending '{}' ({handle})", entry.node.name());
            return true;
        }
        if self.active.iter().any(|s| s.handle == handle) {
            if !self.cancel_requests.contains(&handle) {
                self.cancel_requests.push(handle);
            }
            return true;
        }
        false
    }

    /// Cancel every pending and running command.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
        let handles: Vec<CommandHandle> = self.active.iter().map(|s| s.handle).collect();
        for handle in handles {
            self.cancel(handle);
        }
    }

    // ── Queries ──

    /// Whether `handle` is running (including a cancel not yet applied).
    pub fn is_scheduled(&self, handle: CommandHandle) -> bool {
        self.active
            .iter()
            .any(|s| s.handle == handle && s.node.state().is_running())
    }

    pub fn is_pending(&self, handle: CommandHandle) -> bool {
        self.pending.iter().any(|s| s.handle == handle)
    }

    pub fn holder(&self, resource: ResourceId) -> Option<CommandHandle> {
        self.resources.holder(resource)
    }

    pub fn default_active(&self, resource: ResourceId) -> bool {
        self.resources
            .get(resource)
            .and_then(Resource::default_command)
            .is_some_and(DefaultSlot::is_active)
    }

    pub fn command_name(&self, handle: CommandHandle) -> Option<&str> {
        self.active
            .iter()
            .chain(self.pending.iter())
            .find(|s| s.handle == handle)
            .map(|s| s.node.name())
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    pub fn outputs(&self) -> &OutputFrame {
        &self.outputs
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    // ── Tick ──

    /// Run one scheduling tick.
    pub fn run_tick(&mut self, io: &mut Io<'_>, timestamp: f64) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport {
            tick: self.tick_count,
            ..TickReport::default()
        };

        let Self {
            period_s,
            resources,
            active,
            pending,
            cancel_requests,
            retired_defaults,
            triggers,
            periodics,
            outputs,
            next_handle,
            ..
        } = self;

        let mut ctx = TickContext {
            dt: *period_s,
            timestamp,
            inputs: io.inputs,
            sensors: io.sensors,
            params: &mut *io.params,
            telemetry: &mut *io.telemetry,
            outputs,
        };

        // ═══ PHASE 1: monitors, cancellations, triggers, claims ═══
        for task in periodics.iter_mut() {
            task.periodic(&mut ctx);
        }

        for mut old in retired_defaults.drain(..) {
            old.abort(&mut ctx);
        }

        for handle in cancel_requests.drain(..) {
            if stop_active(active, resources, handle, &mut ctx, &mut report) {
                debug!("cancelled {handle}");
            }
        }

        let registered = resources.registered();
        for trigger in triggers.iter_mut() {
            let Some(edge) = trigger.poll(ctx.inputs) else {
                continue;
            };
            match (trigger.binding, edge) {
                (Binding::OnPress | Binding::WhileHeld, Edge::Rising)
                | (Binding::OnRelease, Edge::Falling) => match &mut trigger.action {
                    TriggerAction::CancelAll => {
                        info!("trigger '{}' cancels all commands", trigger.name);
                        pending.clear();
                        while let Some(handle) = active.first().map(|s| s.handle) {
                            stop_active(active, resources, handle, &mut ctx, &mut report);
                        }
                    }
                    TriggerAction::Schedule(factory) => {
                        match factory().and_then(|cmd| enqueue(pending, next_handle, registered, cmd)) {
                            Ok(handle) => {
                                debug!("trigger '{}' scheduled {handle}", trigger.name);
                                trigger.launched = Some(handle);
                            }
                            Err(e) => {
                                let fault = CommandFault::failed(&trigger.name, e.to_string());
                                report_fault(&mut ctx, &mut report, &trigger.name, &fault);
                            }
                        }
                    }
                },
                (Binding::WhileHeld, Edge::Falling) => {
                    if let Some(handle) = trigger.launched.take() {
                        if let Some(pos) = pending.iter().position(|s| s.handle == handle) {
                            pending.remove(pos);
                        } else {
                            stop_active(active, resources, handle, &mut ctx, &mut report);
                        }
                    }
                }
                _ => {}
            }
        }

        for mut entry in core::mem::take(pending) {
            let plan = resources.try_claim(entry.requirements, |h| may_interrupt(active.as_slice(), h));
            let displaced = match plan {
                ClaimResult::Granted { displaced } => displaced,
                ClaimResult::Conflict(conflict) => {
                    debug!("'{}' deferred: {conflict}", entry.node.name());
                    report.deferred += 1;
                    pending.push(entry);
                    continue;
                }
            };

            for holder in displaced {
                debug!("'{}' displaces {holder}", entry.node.name());
                stop_active(active, resources, holder, &mut ctx, &mut report);
            }
            for id in entry.requirements.iter() {
                if let Some(slot) = resources.get_mut(id).and_then(Resource::default_mut) {
                    if slot.abort(&mut ctx) {
                        debug!("default '{}' yields {id}", slot.name());
                    }
                }
            }
            resources.assign(entry.requirements, entry.handle);

            match entry.node.start(&mut ctx) {
                Ok(()) => {
                    debug!("started '{}' ({})", entry.node.name(), entry.handle);
                    report.started += 1;
                    active.push(entry);
                }
                Err(fault) => {
                    report_fault(&mut ctx, &mut report, entry.node.name(), &fault);
                    if entry.node.stop(&mut ctx, true) {
                        report.interrupted += 1;
                    }
                    resources.release(entry.requirements, entry.handle);
                }
            }
        }

        // ═══ PHASE 2: default commands on free resources ═══
        for resource in resources.iter_mut() {
            if resource.holder().is_some() {
                continue;
            }
            let Some(slot) = resource.default_mut() else {
                continue;
            };
            match slot.run(&mut ctx) {
                Ok(true) => debug!("default '{}' started", slot.name()),
                Ok(false) => {}
                Err(fault) => {
                    report_fault(&mut ctx, &mut report, slot.name(), &fault);
                    slot.abort(&mut ctx);
                }
            }
        }

        // ═══ PHASE 3: tick running commands ═══
        for entry in active.iter_mut() {
            match entry.node.tick(&mut ctx) {
                Ok(CommandState::Ended { .. }) => {
                    debug!("'{}' finished ({})", entry.node.name(), entry.handle);
                    report.finished += 1;
                }
                Ok(_) => {}
                Err(fault) => {
                    report_fault(&mut ctx, &mut report, entry.node.name(), &fault);
                    if entry.node.stop(&mut ctx, true) {
                        report.interrupted += 1;
                    }
                }
            }
        }

        // ═══ PHASE 4: remove ended commands ═══
        active.retain(|entry| {
            if entry.node.state().is_ended() {
                resources.release(entry.requirements, entry.handle);
                false
            } else {
                true
            }
        });

        report
    }

    /// Stop everything immediately and neutral every motor output.
    ///
    /// Used by the host on exit; no further ticks are expected.
    pub fn shutdown(&mut self, io: &mut Io<'_>, timestamp: f64) -> TickReport {
        let mut report = TickReport {
            tick: self.tick_count,
            ..TickReport::default()
        };
        let Self {
            period_s,
            resources,
            active,
            pending,
            cancel_requests,
            retired_defaults,
            outputs,
            ..
        } = self;

        let mut ctx = TickContext {
            dt: *period_s,
            timestamp,
            inputs: io.inputs,
            sensors: io.sensors,
            params: &mut *io.params,
            telemetry: &mut *io.telemetry,
            outputs,
        };

        pending.clear();
        cancel_requests.clear();
        while let Some(handle) = active.first().map(|s| s.handle) {
            stop_active(active, resources, handle, &mut ctx, &mut report);
        }
        for mut old in retired_defaults.drain(..) {
            old.abort(&mut ctx);
        }
        for resource in resources.iter_mut() {
            if let Some(slot) = resource.default_mut() {
                slot.abort(&mut ctx);
            }
        }
        ctx.outputs.stop_all();
        info!("scheduler shut down ({} commands interrupted)", report.interrupted);
        report
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn enqueue(
    pending: &mut Vec<Scheduled>,
    next_handle: &mut u64,
    registered: ResourceSet,
    command: Box<dyn Command>,
) -> Result<CommandHandle, SchedulerError> {
    let requirements = command.requirements();
    if let Some(unknown) = requirements.iter().find(|id| !registered.contains(*id)) {
        return Err(SchedulerError::UnknownResource(unknown));
    }
    let handle = CommandHandle(*next_handle);
    *next_handle += 1;
    debug!("queued '{}' as {handle}", command.name());
    pending.push(Scheduled {
        handle,
        node: CommandNode::boxed(command),
        requirements,
    });
    Ok(handle)
}

fn may_interrupt(active: &[Scheduled], holder: CommandHandle) -> bool {
    active
        .iter()
        .find(|s| s.handle == holder)
        .is_none_or(|s| s.node.interrupt_behavior() == InterruptBehavior::Interruptible)
}

/// Stop a running command, release its resources and drop it.
fn stop_active(
    active: &mut Vec<Scheduled>,
    resources: &mut ResourceTable,
    handle: CommandHandle,
    ctx: &mut TickContext<'_>,
    report: &mut TickReport,
) -> bool {
    let Some(pos) = active.iter().position(|s| s.handle == handle) else {
        return false;
    };
    let mut entry = active.remove(pos);
    if entry.node.stop(ctx, true) {
        report.interrupted += 1;
    }
    resources.release(entry.requirements, entry.handle);
    true
}

fn report_fault(
    ctx: &mut TickContext<'_>,
    report: &mut TickReport,
    source: &str,
    fault: &CommandFault,
) {
    error!("'{source}': {fault}");
    ctx.telemetry.fault(source, &fault.to_string(), ctx.timestamp);
    report.faults += 1;
}

// ─── Tests ──────────────────────────────────────────────────────────
