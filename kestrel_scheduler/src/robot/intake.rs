//! Intake arm, conveyor and roller commands, and the eject / intake
//! sequences built from them.

use kestrel_common::error::{CommandFault, SchedulerError};
use kestrel_common::hal::{ChannelId, SensorId, SensorValue};
use kestrel_common::resource::{ResourceId, ResourceSet};

use super::{Robot, ARM_SOLENOID, CONVEYOR_EMPTY, CONVEYOR_MOTOR, ROLLER_MOTOR};
use crate::command::{Command, ParallelDeadline, Sequential, TickContext};
use crate::config::IntakeConfig;

// ─── Arms ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// Arms down, solenoid extended.
    Lowered,
    /// Arms up, solenoid retracted.
    Raised,
}

/// Switch the arm solenoid and wait for the arms to travel.
#[derive(Debug, Clone)]
pub struct MoveArmCommand {
    arms: ResourceId,
    solenoid: ChannelId,
    target: ArmState,
    settle_s: f64,
    inverted: bool,
    elapsed: f64,
}

impl MoveArmCommand {
    pub fn new(arms: ResourceId, solenoid: ChannelId, target: ArmState, settle_s: f64) -> Self {
        Self {
            arms,
            solenoid,
            target,
            settle_s,
            inverted: false,
            elapsed: 0.0,
        }
    }

    /// Solenoid wiring where `false` extends the arms.
    pub fn inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }
}

impl Command for MoveArmCommand {
    fn name(&self) -> &str {
        match self.target {
            ArmState::Lowered => "Lower arms",
            ArmState::Raised => "Raise arms",
        }
    }

    fn requirements(&self) -> ResourceSet {
        ResourceSet::single(self.arms)
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.elapsed = 0.0;
        let extend = self.target == ArmState::Lowered;
        ctx.outputs.set_extended(self.solenoid, extend != self.inverted);
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.elapsed += ctx.dt;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.settle_s
    }
}

// ─── Motors ─────────────────────────────────────────────────────────

/// Absorbs accumulated `dt` rounding when comparing against a duration.
const DURATION_EPSILON_S: f64 = 1e-9;

/// Run one motor channel at a fixed output until a stop condition.
///
/// Without a duration or sensor condition it runs until interrupted.
#[derive(Debug, Clone)]
pub struct RunMotorCommand {
    name: String,
    resource: ResourceId,
    channel: ChannelId,
    speed: f64,
    duration_s: Option<f64>,
    until: Option<(SensorId, bool)>,
    elapsed: f64,
    done: bool,
}

impl RunMotorCommand {
    pub fn new(name: impl Into<String>, resource: ResourceId, channel: ChannelId, speed: f64) -> Self {
        Self {
            name: name.into(),
            resource,
            channel,
            speed,
            duration_s: None,
            until: None,
            elapsed: 0.0,
            done: false,
        }
    }

    /// Finish after `seconds` of running.
    pub fn for_duration(mut self, seconds: f64) -> Self {
        self.duration_s = Some(seconds);
        self
    }

    /// Finish once a boolean sensor reads `value`.
    pub fn until_sensor(mut self, sensor: SensorId, value: bool) -> Self {
        self.until = Some((sensor, value));
        self
    }
}

impl Command for RunMotorCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> ResourceSet {
        ResourceSet::single(self.resource)
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.elapsed = 0.0;
        self.done = false;
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        // Checked before writing: the tick that ends the command is flushed
        // with the stop from `on_stop`, so it must not count as running.
        let timed_out = self
            .duration_s
            .is_some_and(|d| self.elapsed >= d - DURATION_EPSILON_S);
        let sensed = self.until.is_some_and(|(sensor, value)| {
            ctx.sensors.read(sensor).and_then(SensorValue::as_bool) == Some(value)
        });
        if timed_out || sensed {
            self.done = true;
            return Ok(());
        }

        ctx.outputs.set(self.channel, self.speed);
        self.elapsed += ctx.dt;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.done
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>, _interrupted: bool) {
        ctx.outputs.stop(self.channel);
    }
}

// ─── Sequences ──────────────────────────────────────────────────────

fn arm(robot: &Robot, config: &IntakeConfig, target: ArmState) -> Box<dyn Command> {
    Box::new(
        MoveArmCommand::new(robot.arms, ARM_SOLENOID, target, config.arm_settle_s)
            .inverted(config.invert_arm_solenoid),
    )
}

/// Lower the arms, run the conveyor in reverse with the rollers pushing
/// out for `eject_duration_s`, then raise the arms.
pub fn eject_command(robot: &Robot, config: &IntakeConfig) -> Result<Box<dyn Command>, SchedulerError> {
    let conveyor = RunMotorCommand::new(
        "Eject conveyor",
        robot.conveyor,
        CONVEYOR_MOTOR,
        config.eject_conveyor_speed,
    )
    .for_duration(config.eject_duration_s);
    let rollers = RunMotorCommand::new(
        "Eject rollers",
        robot.rollers,
        ROLLER_MOTOR,
        config.eject_roller_speed,
    );
    let group = ParallelDeadline::new("Eject motors", Box::new(conveyor), vec![Box::new(rollers)])?;

    Ok(Box::new(Sequential::new(
        "Eject",
        vec![
            arm(robot, config, ArmState::Lowered),
            Box::new(group),
            arm(robot, config, ArmState::Raised),
        ],
    )))
}

/// Lower the arms, pull a game piece in until the conveyor is full (or
/// `intake_timeout_s` passes), then raise the arms.
pub fn intake_command(robot: &Robot, config: &IntakeConfig) -> Result<Box<dyn Command>, SchedulerError> {
    let conveyor = RunMotorCommand::new(
        "Intake conveyor",
        robot.conveyor,
        CONVEYOR_MOTOR,
        config.intake_conveyor_speed,
    )
    .for_duration(config.intake_timeout_s)
    .until_sensor(CONVEYOR_EMPTY, false);
    let rollers = RunMotorCommand::new(
        "Intake rollers",
        robot.rollers,
        ROLLER_MOTOR,
        config.intake_roller_speed,
    );
    let group = ParallelDeadline::new("Intake motors", Box::new(conveyor), vec![Box::new(rollers)])?;

    Ok(Box::new(Sequential::new(
        "Intake",
        vec![
            arm(robot, config, ArmState::Lowered),
            Box::new(group),
            arm(robot, config, ArmState::Raised),
        ],
    )))
}
