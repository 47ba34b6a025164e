//! Integration test: faults stop one command, never the loop.
//!
//! 1. A hook failure stops the command with `interrupted = true`.
//! 2. The fault reaches telemetry and the tick report.
//! 3. Resources are released and other commands keep running.
//! 4. A failing trigger factory is reported the same way.

use kestrel_common::error::SchedulerError;
use kestrel_common::hal::Buttons;
use kestrel_common::resource::{ResourceId, ResourceSet};
use kestrel_scheduler::scheduler::{Binding, Trigger};

use super::support::{events_of, new_log, Probe, Rig};

// ── Helpers ─────────────────────────────────────────────────────────

fn rig_with(names: &[&str]) -> (Rig, Vec<ResourceId>) {
    let mut rig = Rig::new();
    let ids = names
        .iter()
        .map(|n| rig.sched.register_resource(n).unwrap())
        .collect();
    (rig, ids)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn tick_fault_stops_only_the_failing_command() {
    let log = new_log();
    let (mut rig, ids) = rig_with(&["drive", "conveyor"]);

    let bad = rig
        .sched
        .schedule(Probe::new("bad", ResourceSet::single(ids[0]), &log).failing_on_tick(2).boxed())
        .unwrap();
    let good = rig
        .sched
        .schedule(Probe::new("good", ResourceSet::single(ids[1]), &log).boxed())
        .unwrap();

    assert_eq!(rig.tick().faults, 0);
    let report = rig.tick();
    assert_eq!(report.faults, 1);
    assert_eq!(report.interrupted, 1);

    assert!(!rig.sched.is_scheduled(bad));
    assert!(rig.sched.is_scheduled(good));
    assert_eq!(rig.sched.holder(ids[0]), None);
    assert_eq!(events_of(&log, "bad"), ["start", "tick", "tick", "stop(true)"]);

    assert_eq!(rig.telemetry.faults.len(), 1);
    assert_eq!(rig.telemetry.faults[0].source, "bad");
    assert!(rig.telemetry.faults[0].message.contains("lost encoder"));

    rig.run(3);
    assert_eq!(events_of(&log, "good").len(), 6);
}

#[test]
fn start_fault_still_runs_stop_hook() {
    let log = new_log();
    let (mut rig, ids) = rig_with(&["arms"]);

    let handle = rig
        .sched
        .schedule(Probe::new("stuck", ResourceSet::single(ids[0]), &log).failing_on_start().boxed())
        .unwrap();
    let report = rig.tick();

    assert_eq!(report.faults, 1);
    assert_eq!(report.started, 0);
    assert!(!rig.sched.is_scheduled(handle));
    assert_eq!(rig.sched.holder(ids[0]), None);
    assert_eq!(events_of(&log, "stuck"), ["start", "stop(true)"]);
}

#[test]
fn failing_default_restarts_next_tick() {
    let log = new_log();
    let (mut rig, ids) = rig_with(&["drive"]);
    rig.sched
        .set_default_command(
            ids[0],
            Probe::new("idle", ResourceSet::single(ids[0]), &log).failing_on_tick(1).boxed(),
        )
        .unwrap();

    assert_eq!(rig.tick().faults, 1);
    assert!(!rig.sched.default_active(ids[0]));

    // Each restart resets the probe's tick count, so it fails again.
    assert_eq!(rig.tick().faults, 1);
    assert_eq!(
        events_of(&log, "idle"),
        ["start", "tick", "stop(true)", "start", "tick", "stop(true)"]
    );
}

#[test]
fn factory_error_is_reported_as_fault() {
    let (mut rig, _) = rig_with(&["drive"]);
    let stranger = ResourceId::new(9).unwrap();
    rig.sched.bind(Trigger::button("Broken", Buttons::EJECT, Binding::OnPress, || {
        Err(SchedulerError::UnknownResource(ResourceId::new(9).unwrap()))
    }));

    rig.press(Buttons::EJECT);
    let report = rig.tick();
    assert_eq!(report.faults, 1);
    assert_eq!(rig.sched.pending_count(), 0);
    assert_eq!(rig.telemetry.faults[0].source, "Broken");
    assert!(rig.telemetry.faults[0].message.contains(&stranger.to_string()));
}

#[test]
fn loop_survives_repeated_faults() {
    let log = new_log();
    let (mut rig, ids) = rig_with(&["drive"]);
    for i in 0..10 {
        rig.sched
            .schedule(
                Probe::new(&format!("p{i}"), ResourceSet::single(ids[0]), &log)
                    .rejecting()
                    .failing_on_tick(1)
                    .boxed(),
            )
            .unwrap();
    }

    let faults = rig.run(12);
    assert_eq!(faults, 10);
    assert_eq!(rig.sched.active_count(), 0);
    assert_eq!(rig.sched.pending_count(), 0);
    assert_eq!(rig.sched.tick_count(), 12);
}
