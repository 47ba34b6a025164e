//! Integration test: exclusive resource ownership.
//!
//! 1. An interruptible holder is displaced by a newcomer.
//! 2. A rejecting holder defers the newcomer until it finishes.
//! 3. Default commands yield to claims and resume once released.
//! 4. Composite commands hold the union of their children's resources.

use kestrel_common::error::SchedulerError;
use kestrel_common::resource::{ResourceId, ResourceSet};
use kestrel_scheduler::command::Sequential;

use super::support::{events_of, new_log, Probe, Rig};

// ── Helpers ─────────────────────────────────────────────────────────

fn two_resources(rig: &mut Rig) -> (ResourceId, ResourceId) {
    let a = rig.sched.register_resource("drive").unwrap();
    let b = rig.sched.register_resource("conveyor").unwrap();
    (a, b)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn newcomer_displaces_interruptible_holder() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, _) = two_resources(&mut rig);

    let first = rig.sched.schedule(Probe::new("first", ResourceSet::single(a), &log).boxed()).unwrap();
    rig.tick();
    assert_eq!(rig.sched.holder(a), Some(first));

    let second = rig.sched.schedule(Probe::new("second", ResourceSet::single(a), &log).boxed()).unwrap();
    let report = rig.tick();

    assert_eq!(report.started, 1);
    assert_eq!(report.interrupted, 1);
    assert!(!rig.sched.is_scheduled(first));
    assert_eq!(rig.sched.holder(a), Some(second));
    assert_eq!(events_of(&log, "first"), ["start", "tick", "stop(true)"]);
    assert_eq!(events_of(&log, "second"), ["start", "tick"]);
}

#[test]
fn rejecting_holder_defers_newcomer_until_finished() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, _) = two_resources(&mut rig);

    let holder = rig
        .sched
        .schedule(Probe::new("holder", ResourceSet::single(a), &log).rejecting().finishing_after(3).boxed())
        .unwrap();
    rig.tick();

    let waiter = rig.sched.schedule(Probe::new("waiter", ResourceSet::single(a), &log).boxed()).unwrap();
    let report = rig.tick();
    assert_eq!(report.deferred, 1);
    assert!(rig.sched.is_pending(waiter));
    assert_eq!(rig.sched.holder(a), Some(holder));

    // Holder ends on its third tick and releases in the same tick.
    let report = rig.tick();
    assert_eq!(report.finished, 1);
    assert_eq!(rig.sched.holder(a), None);

    let report = rig.tick();
    assert_eq!(report.started, 1);
    assert_eq!(rig.sched.holder(a), Some(waiter));
    assert_eq!(events_of(&log, "holder").last().map(String::as_str), Some("stop(false)"));
}

#[test]
fn disjoint_commands_run_side_by_side() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, b) = two_resources(&mut rig);

    let x = rig.sched.schedule(Probe::new("x", ResourceSet::single(a), &log).boxed()).unwrap();
    let y = rig.sched.schedule(Probe::new("y", ResourceSet::single(b), &log).boxed()).unwrap();
    let report = rig.tick();

    assert_eq!(report.started, 2);
    assert!(rig.sched.is_scheduled(x));
    assert!(rig.sched.is_scheduled(y));
    assert_eq!(rig.sched.active_count(), 2);
}

#[test]
fn default_yields_and_resumes() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, _) = two_resources(&mut rig);
    rig.sched
        .set_default_command(a, Probe::new("idle", ResourceSet::single(a), &log).boxed())
        .unwrap();

    rig.tick();
    assert!(rig.sched.default_active(a));

    rig.sched
        .schedule(Probe::new("job", ResourceSet::single(a), &log).finishing_after(2).boxed())
        .unwrap();
    rig.tick();
    assert!(!rig.sched.default_active(a));

    // Job ends on this tick; the default restarts on the next.
    rig.tick();
    assert!(!rig.sched.default_active(a));
    rig.tick();
    assert!(rig.sched.default_active(a));

    assert_eq!(
        events_of(&log, "idle"),
        ["start", "tick", "stop(true)", "start", "tick"]
    );
}

#[test]
fn default_must_require_exactly_its_resource() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, b) = two_resources(&mut rig);

    let err = rig
        .sched
        .set_default_command(a, Probe::new("wide", ResourceSet::of(&[a, b]), &log).boxed())
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidDefault { .. }));
}

#[test]
fn unregistered_requirement_rejected_at_schedule() {
    let log = new_log();
    let mut rig = Rig::new();
    two_resources(&mut rig);
    let stranger = ResourceId::new(7).unwrap();

    let err = rig
        .sched
        .schedule(Probe::new("lost", ResourceSet::single(stranger), &log).boxed())
        .unwrap_err();
    assert_eq!(err, SchedulerError::UnknownResource(stranger));
}

#[test]
fn sequence_holds_union_for_its_whole_run() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, b) = two_resources(&mut rig);

    let seq = Sequential::new(
        "both",
        vec![
            Probe::new("on_a", ResourceSet::single(a), &log).finishing_after(1).boxed(),
            Probe::new("on_b", ResourceSet::single(b), &log).rejecting().finishing_after(5).boxed(),
        ],
    );
    let handle = rig.sched.schedule(Box::new(seq)).unwrap();
    rig.tick();

    // `a` stays held by the sequence even though its child is done.
    assert_eq!(rig.sched.holder(a), Some(handle));
    assert_eq!(rig.sched.holder(b), Some(handle));

    // Mixed children make the sequence interruptible.
    let intruder = rig.sched.schedule(Probe::new("intruder", ResourceSet::single(b), &log).boxed()).unwrap();
    rig.tick();
    assert!(!rig.sched.is_scheduled(handle));
    assert_eq!(rig.sched.holder(a), None);
    assert_eq!(rig.sched.holder(b), Some(intruder));
    assert_eq!(events_of(&log, "on_b"), ["start", "stop(true)"]);
}

#[test]
fn cancel_is_applied_on_next_tick() {
    let log = new_log();
    let mut rig = Rig::new();
    let (a, _) = two_resources(&mut rig);

    let handle = rig.sched.schedule(Probe::new("job", ResourceSet::single(a), &log).boxed()).unwrap();
    rig.tick();

    assert!(rig.sched.cancel(handle));
    assert!(rig.sched.is_scheduled(handle));
    let report = rig.tick();
    assert_eq!(report.interrupted, 1);
    assert!(!rig.sched.is_scheduled(handle));
    assert_eq!(rig.sched.holder(a), None);
    assert!(!rig.sched.cancel(handle));
}
