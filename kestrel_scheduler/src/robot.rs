//! Robot command set: resources, channel map, default drive command,
//! eject / intake sequences, operator bindings and dashboard monitors.

pub mod drive;
pub mod intake;
pub mod monitor;

use tracing::info;

use kestrel_common::error::SchedulerError;
use kestrel_common::hal::{Buttons, ChannelId, SensorId};
use kestrel_common::resource::ResourceId;

use crate::command::Command;
use crate::config::{DriveConfig, IntakeConfig, KestrelConfig};
use crate::scheduler::{Binding, Scheduler, Trigger};

use self::drive::DriveCommand;
use self::intake::{eject_command, intake_command};
use self::monitor::{ArmMonitor, ConveyorMonitor, DriveMonitor};

// ─── Channel Map ────────────────────────────────────────────────────

const fn channel(index: u8) -> ChannelId {
    match ChannelId::new(index) {
        Some(c) => c,
        None => panic!("channel index out of range"),
    }
}

const fn sensor(index: u8) -> SensorId {
    match SensorId::new(index) {
        Some(s) => s,
        None => panic!("sensor index out of range"),
    }
}

pub const LEFT_DRIVE: ChannelId = channel(0);
pub const RIGHT_DRIVE: ChannelId = channel(1);
pub const CONVEYOR_MOTOR: ChannelId = channel(2);
pub const ROLLER_MOTOR: ChannelId = channel(3);
pub const ARM_SOLENOID: ChannelId = channel(4);

/// Reads `true` while no game piece sits in the conveyor.
pub const CONVEYOR_EMPTY: SensorId = sensor(0);

// ─── Robot ──────────────────────────────────────────────────────────

/// Resource ids of every subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Robot {
    pub drive: ResourceId,
    pub conveyor: ResourceId,
    pub rollers: ResourceId,
    pub arms: ResourceId,
}

impl Robot {
    /// Register the subsystems with `scheduler`.
    pub fn register(scheduler: &mut Scheduler) -> Result<Self, SchedulerError> {
        Ok(Self {
            drive: scheduler.register_resource("drive")?,
            conveyor: scheduler.register_resource("conveyor")?,
            rollers: scheduler.register_resource("rollers")?,
            arms: scheduler.register_resource("arms")?,
        })
    }

    pub fn drive_command(&self, config: &DriveConfig) -> Result<DriveCommand, SchedulerError> {
        Ok(DriveCommand::new(self.drive, LEFT_DRIVE, RIGHT_DRIVE, config)?)
    }

    pub fn eject(&self, config: &IntakeConfig) -> Result<Box<dyn Command>, SchedulerError> {
        eject_command(self, config)
    }

    pub fn intake(&self, config: &IntakeConfig) -> Result<Box<dyn Command>, SchedulerError> {
        intake_command(self, config)
    }
}

/// Register resources, the default drive command, operator bindings and
/// monitors.
pub fn build(scheduler: &mut Scheduler, config: &KestrelConfig) -> Result<Robot, SchedulerError> {
    let robot = Robot::register(scheduler)?;

    let drive = robot.drive_command(&config.drive)?;
    scheduler.set_default_command(robot.drive, Box::new(drive))?;

    let eject_cfg = config.intake.clone();
    scheduler.bind(Trigger::button("Eject", Buttons::EJECT, Binding::OnPress, move || {
        robot.eject(&eject_cfg)
    }));
    let intake_cfg = config.intake.clone();
    scheduler.bind(Trigger::button("Intake", Buttons::INTAKE, Binding::OnPress, move || {
        robot.intake(&intake_cfg)
    }));
    scheduler.bind(Trigger::cancel_all("Cancel", Buttons::CANCEL));

    scheduler.add_periodic(Box::new(ConveyorMonitor::new(CONVEYOR_EMPTY)));
    scheduler.add_periodic(Box::new(ArmMonitor::new(
        ARM_SOLENOID,
        config.intake.invert_arm_solenoid,
    )));
    scheduler.add_periodic(Box::new(DriveMonitor::new(LEFT_DRIVE, RIGHT_DRIVE)));

    info!("robot ready: {robot:?}");
    Ok(robot)
}
