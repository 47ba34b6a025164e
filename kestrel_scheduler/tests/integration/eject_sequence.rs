//! Integration test: operator-triggered eject and intake sequences.
//!
//! Runs the full robot wiring: button edge → sequence → arm, conveyor and
//! roller outputs → arms raised again, with the drive default untouched.

use kestrel_common::hal::{Buttons, Output, SensorValue};
use kestrel_common::tunable::ParameterStore;
use kestrel_scheduler::config::KestrelConfig;
use kestrel_scheduler::robot::monitor::{ARMS_EXTENDED_KEY, CONVEYOR_EMPTY_KEY};
use kestrel_scheduler::robot::{ARM_SOLENOID, CONVEYOR_EMPTY, CONVEYOR_MOTOR, ROLLER_MOTOR};

use super::support::Rig;

// ── Helpers ─────────────────────────────────────────────────────────

/// Per-tick snapshot of the intake outputs.
#[derive(Debug, Clone, Copy)]
struct Frame {
    conveyor: f64,
    rollers: f64,
    solenoid: Output,
}

fn snapshot(rig: &Rig) -> Frame {
    let out = rig.sched.outputs();
    Frame {
        conveyor: out.percent(CONVEYOR_MOTOR),
        rollers: out.percent(ROLLER_MOTOR),
        solenoid: out.get(ARM_SOLENOID),
    }
}

fn tap(rig: &mut Rig, button: Buttons) -> Vec<Frame> {
    rig.press(button);
    rig.tick();
    let mut frames = vec![snapshot(rig)];
    rig.release(button);
    for _ in 0..150 {
        rig.tick();
        frames.push(snapshot(rig));
    }
    frames
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn eject_lowers_runs_motors_then_raises() {
    let config = KestrelConfig::default();
    let (mut rig, robot) = Rig::with_robot(&config);
    rig.tick();
    assert!(rig.sched.default_active(robot.drive));

    let frames = tap(&mut rig, Buttons::EJECT);

    // Default wiring is inverted: `false` extends the arms.
    assert_eq!(frames[0].solenoid, Output::Extended(false));
    assert_eq!(frames[0].conveyor, 0.0);

    let running: Vec<&Frame> = frames.iter().filter(|f| f.conveyor != 0.0).collect();
    let expected = (config.intake.eject_duration_s / config.period_s()).round() as usize;
    assert_eq!(running.len(), expected, "conveyor output periods");
    for f in &running {
        assert_eq!(f.conveyor, config.intake.eject_conveyor_speed);
        assert_eq!(f.rollers, config.intake.eject_roller_speed);
        assert_eq!(f.solenoid, Output::Extended(false));
    }

    // Rollers are only ever driven alongside the conveyor.
    let rollers_alone = frames
        .iter()
        .filter(|f| f.rollers != 0.0 && f.conveyor == 0.0)
        .count();
    assert_eq!(rollers_alone, 0);

    let last = frames.last().unwrap();
    assert_eq!(last.solenoid, Output::Extended(true));
    assert_eq!(last.conveyor, 0.0);
    assert_eq!(last.rollers, 0.0);
    assert_eq!(rig.sched.holder(robot.conveyor), None);
    assert_eq!(rig.sched.holder(robot.arms), None);
    assert!(rig.sched.default_active(robot.drive));
    assert!(rig.telemetry.faults.is_empty());
}

#[test]
fn dashboard_tracks_arm_position() {
    let (mut rig, _) = Rig::with_robot(&KestrelConfig::default());
    rig.press(Buttons::EJECT);
    rig.tick();
    rig.release(Buttons::EJECT);
    rig.tick();
    assert!(rig.params.get_bool(ARMS_EXTENDED_KEY, false));

    rig.run(150);
    assert!(!rig.params.get_bool(ARMS_EXTENDED_KEY, true));
}

#[test]
fn holding_eject_does_not_restart_it() {
    let (mut rig, robot) = Rig::with_robot(&KestrelConfig::default());
    rig.press(Buttons::EJECT);
    let first = rig.tick();
    let holder = rig.sched.holder(robot.arms);
    assert_eq!(first.started, 1);

    for _ in 0..20 {
        assert_eq!(rig.tick().started, 0);
    }
    assert_eq!(rig.sched.holder(robot.arms), holder);
}

#[test]
fn cancel_button_stops_eject_midway() {
    let (mut rig, robot) = Rig::with_robot(&KestrelConfig::default());
    rig.press(Buttons::EJECT);
    rig.tick();
    rig.release(Buttons::EJECT);
    rig.run(30);
    assert!(rig.sched.outputs().percent(CONVEYOR_MOTOR) != 0.0);

    rig.press(Buttons::CANCEL);
    let report = rig.tick();
    assert_eq!(report.interrupted, 1);
    assert_eq!(rig.sched.outputs().get(CONVEYOR_MOTOR), Output::Stopped);
    assert_eq!(rig.sched.outputs().get(ROLLER_MOTOR), Output::Stopped);
    assert_eq!(rig.sched.holder(robot.conveyor), None);
    // The drive default is not a scheduled command and keeps running.
    assert!(rig.sched.default_active(robot.drive));
}

#[test]
fn intake_stops_when_conveyor_fills() {
    let (mut rig, robot) = Rig::with_robot(&KestrelConfig::default());
    rig.sensors.set(CONVEYOR_EMPTY, SensorValue::Bool(true));
    rig.press(Buttons::INTAKE);
    rig.tick();
    rig.release(Buttons::INTAKE);

    // Arms settle, then the conveyor pulls the piece in.
    let mut ticks = 0;
    while rig.sched.outputs().percent(CONVEYOR_MOTOR) == 0.0 {
        rig.tick();
        ticks += 1;
        assert!(ticks < 50, "conveyor never started");
    }
    rig.run(5);
    assert!(rig.sched.outputs().percent(CONVEYOR_MOTOR) > 0.0);
    assert!(rig.sched.outputs().percent(ROLLER_MOTOR) < 0.0);

    rig.sensors.set(CONVEYOR_EMPTY, SensorValue::Bool(false));
    rig.tick();
    assert_eq!(rig.sched.outputs().get(CONVEYOR_MOTOR), Output::Stopped);
    assert_eq!(rig.sched.outputs().get(ROLLER_MOTOR), Output::Stopped);

    rig.run(30);
    assert_eq!(rig.sched.holder(robot.arms), None);
    assert!(!rig.params.get_bool(CONVEYOR_EMPTY_KEY, true));
}
