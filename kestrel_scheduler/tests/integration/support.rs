//! Tick harness and a scriptable probe command.

use std::cell::RefCell;
use std::rc::Rc;

use kestrel_common::error::CommandFault;
use kestrel_common::hal::{Buttons, InputSample, SensorFrame};
use kestrel_common::resource::ResourceSet;
use kestrel_common::telemetry::MemoryTelemetry;
use kestrel_common::tunable::MemoryParameterStore;

use kestrel_scheduler::command::{Command, InterruptBehavior, TickContext};
use kestrel_scheduler::config::KestrelConfig;
use kestrel_scheduler::robot::{self, Robot};
use kestrel_scheduler::scheduler::{Io, Scheduler, TickReport};

pub const DT: f64 = 0.02;

pub struct Rig {
    pub inputs: InputSample,
    pub sensors: SensorFrame,
    pub params: MemoryParameterStore,
    pub telemetry: MemoryTelemetry,
    pub sched: Scheduler,
    pub time: f64,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            inputs: InputSample::default(),
            sensors: SensorFrame::new(),
            params: MemoryParameterStore::new(),
            telemetry: MemoryTelemetry::new(),
            sched: Scheduler::new(DT),
            time: 0.0,
        }
    }

    /// Rig with the full robot command set installed.
    pub fn with_robot(config: &KestrelConfig) -> (Self, Robot) {
        let mut rig = Self::new();
        rig.sched = Scheduler::new(config.period_s());
        let robot = robot::build(&mut rig.sched, config).expect("robot wiring");
        (rig, robot)
    }

    pub fn tick(&mut self) -> TickReport {
        self.time += DT;
        let mut io = Io {
            inputs: &self.inputs,
            sensors: &self.sensors,
            params: &mut self.params,
            telemetry: &mut self.telemetry,
        };
        self.sched.run_tick(&mut io, self.time)
    }

    /// Run `n` ticks and return the summed fault count.
    pub fn run(&mut self, n: usize) -> u32 {
        (0..n).map(|_| self.tick().faults).sum()
    }

    pub fn press(&mut self, buttons: Buttons) {
        self.inputs.buttons |= buttons;
    }

    pub fn release(&mut self, buttons: Buttons) {
        self.inputs.buttons -= buttons;
    }
}

pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Logs each hook as `"<name>:<hook>"`.
pub struct Probe {
    name: String,
    requires: ResourceSet,
    behavior: InterruptBehavior,
    finish_after: Option<u32>,
    fail_on_start: bool,
    fail_on_tick: Option<u32>,
    ticks: u32,
    log: EventLog,
}

impl Probe {
    pub fn new(name: &str, requires: ResourceSet, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            requires,
            behavior: InterruptBehavior::Interruptible,
            finish_after: None,
            fail_on_start: false,
            fail_on_tick: None,
            ticks: 0,
            log: Rc::clone(log),
        }
    }

    pub fn finishing_after(mut self, ticks: u32) -> Self {
        self.finish_after = Some(ticks);
        self
    }

    pub fn rejecting(mut self) -> Self {
        self.behavior = InterruptBehavior::RejectIncoming;
        self
    }

    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    pub fn failing_on_tick(mut self, tick: u32) -> Self {
        self.fail_on_tick = Some(tick);
        self
    }

    pub fn boxed(self) -> Box<dyn Command> {
        Box::new(self)
    }

    fn record(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}:{event}", self.name));
    }
}

impl Command for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> ResourceSet {
        self.requires
    }

    fn interrupt_behavior(&self) -> InterruptBehavior {
        self.behavior
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.ticks = 0;
        self.record("start");
        if self.fail_on_start {
            return Err(CommandFault::failed(&self.name, "refused to start"));
        }
        Ok(())
    }

    fn on_tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.ticks += 1;
        self.record("tick");
        if self.fail_on_tick == Some(self.ticks) {
            return Err(CommandFault::failed(&self.name, "lost encoder"));
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finish_after.is_some_and(|n| self.ticks >= n)
    }

    fn on_stop(&mut self, _ctx: &mut TickContext<'_>, interrupted: bool) {
        self.record(&format!("stop({interrupted})"));
    }
}

/// Events recorded for one probe, in order.
pub fn events_of(log: &EventLog, name: &str) -> Vec<String> {
    let prefix = format!("{name}:");
    log.borrow()
        .iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}
