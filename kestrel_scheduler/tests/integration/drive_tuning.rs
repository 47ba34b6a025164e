//! Integration test: live drive tuning through the parameter store.
//!
//! Rate limits, scales and input squaring are re-read every tick, so a
//! dashboard edit takes effect on the very next tick without restarting
//! the drive command.

use kestrel_common::hal::Buttons;
use kestrel_common::tunable::ParameterStore;
use kestrel_scheduler::config::{KestrelConfig, ReseedPolicy};
use kestrel_scheduler::robot::drive::keys;
use kestrel_scheduler::robot::monitor::LEFT_OUTPUT_SERIES;
use kestrel_scheduler::robot::{LEFT_DRIVE, RIGHT_DRIVE};

use super::support::Rig;

// ── Helpers ─────────────────────────────────────────────────────────

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn left(rig: &Rig) -> f64 {
    rig.sched.outputs().percent(LEFT_DRIVE)
}

/// Robot rig driving straight at full stick.
fn full_speed(config: &KestrelConfig) -> Rig {
    let (mut rig, _) = Rig::with_robot(config);
    rig.inputs.speed = 1.0;
    rig
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn drive_publishes_its_tunables_on_start() {
    let (mut rig, _) = Rig::with_robot(&KestrelConfig::default());
    rig.tick();
    assert_eq!(rig.params.get_number(keys::SPEED_SCALE, 0.0), 1.0);
    assert_eq!(rig.params.get_number(keys::TURN_SCALE, 0.0), 0.5);
    assert_eq!(rig.params.get_number(keys::POSITIVE_SPEED_RATE_LIMIT, 0.0), 5.0);
    assert_eq!(rig.params.get_number(keys::NEGATIVE_TURN_RATE_LIMIT, 0.0), -10.0);
    assert!(!rig.params.get_bool(keys::SQUARE_INPUTS, true));
}

#[test]
fn speed_ramps_at_configured_rate() {
    let mut rig = full_speed(&KestrelConfig::default());
    for i in 1..=10 {
        rig.tick();
        assert!(close(left(&rig), 0.1 * i as f64), "tick {i}: {}", left(&rig));
    }
    rig.run(5);
    assert!(close(left(&rig), 1.0));
    assert!(close(rig.sched.outputs().percent(RIGHT_DRIVE), 1.0));
}

#[test]
fn rate_limit_change_mid_drive_continues_from_output() {
    let mut rig = full_speed(&KestrelConfig::default());
    rig.run(3);
    assert!(close(left(&rig), 0.3));

    rig.params.put_number(keys::POSITIVE_SPEED_RATE_LIMIT, 10.0);
    rig.tick();
    assert!(close(left(&rig), 0.5), "no jump, faster ramp: {}", left(&rig));
    rig.tick();
    assert!(close(left(&rig), 0.7));
}

#[test]
fn lowered_rate_limit_is_respected_mid_drive() {
    let config = KestrelConfig::default();
    let dt = config.period_s();
    let mut rig = full_speed(&config);
    rig.run(3);
    assert!(close(left(&rig), 0.3));

    rig.params.put_number(keys::POSITIVE_SPEED_RATE_LIMIT, 2.0);
    let mut previous = left(&rig);
    for i in 0..10 {
        rig.tick();
        let delta = left(&rig) - previous;
        assert!(delta <= 2.0 * dt + 1e-9, "tick {i}: step {delta}");
        assert!(delta > 0.0, "tick {i}: still ramping");
        previous = left(&rig);
    }
    assert!(close(previous, 0.3 + 10.0 * 2.0 * dt));
}

#[test]
fn rate_limit_change_with_target_reseed_jumps() {
    let mut config = KestrelConfig::default();
    config.drive.reseed = ReseedPolicy::Target;
    let mut rig = full_speed(&config);
    rig.run(3);

    rig.params.put_number(keys::POSITIVE_SPEED_RATE_LIMIT, 10.0);
    rig.tick();
    assert!(close(left(&rig), 1.0));
}

#[test]
fn invalid_rate_limit_keeps_previous_tuning() {
    let mut rig = full_speed(&KestrelConfig::default());
    rig.run(2);

    rig.params.put_number(keys::POSITIVE_SPEED_RATE_LIMIT, -1.0);
    let faults = rig.run(2);
    assert_eq!(faults, 0);
    assert!(close(left(&rig), 0.4));

    // A valid value afterwards is picked up normally.
    rig.params.put_number(keys::POSITIVE_SPEED_RATE_LIMIT, 15.0);
    rig.tick();
    assert!(close(left(&rig), 0.7));
}

#[test]
fn dashboard_scale_caps_speed() {
    let mut rig = full_speed(&KestrelConfig::default());
    rig.tick();
    rig.params.put_number(keys::SPEED_SCALE, 0.5);
    rig.run(20);
    assert!(close(left(&rig), 0.5));
}

#[test]
fn squared_inputs_soften_small_sticks() {
    let (mut rig, _) = Rig::with_robot(&KestrelConfig::default());
    rig.inputs.speed = 0.5;
    rig.tick();
    rig.params.put_bool(keys::SQUARE_INPUTS, true);
    rig.run(20);
    let out = left(&rig);
    assert!(out > 0.2 && out < 0.3, "squared output {out}");
}

#[test]
fn turn_in_place_needs_quick_turn() {
    let mut config = KestrelConfig::default();
    config.drive.quick_turn_always = false;
    let (mut rig, _) = Rig::with_robot(&config);
    rig.inputs.turn = 1.0;
    rig.run(10);
    assert_eq!(left(&rig), 0.0);

    rig.press(Buttons::QUICK_TURN);
    rig.run(10);
    assert!(left(&rig) > 0.0);
    assert!(rig.sched.outputs().percent(RIGHT_DRIVE) < 0.0);
}

#[test]
fn drive_outputs_are_logged_every_tick() {
    let mut rig = full_speed(&KestrelConfig::default());
    rig.run(5);
    // Monitors run before the drive, so each sample lags one tick.
    let series = rig.telemetry.series(LEFT_OUTPUT_SERIES);
    assert_eq!(series.len(), 5);
    assert_eq!(series[0], 0.0);
    assert!(close(series[4], 0.4));
}
