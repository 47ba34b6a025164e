//! Fixed-period host loop: sample → tick → flush → plant.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` to lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` to pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! Every step is a no-op without the `rt` feature.
//!
//! ## Cycle Body
//! Scripted operator input and the simulated conveyor sensor feed one
//! scheduler tick; the resulting output frame is flushed to the actuator
//! bank and drives the conveyor model for the next cycle.
//!
//! ## Pacing
//! With the `rt` feature the loop sleeps on `CLOCK_MONOTONIC` absolute
//! deadlines and an overrun ends the run with `CycleError::CycleOverrun`.
//! Otherwise it uses `std::thread::sleep` and overruns are only counted.
//! [`Pacing::Fast`] skips sleeping entirely; simulated time still advances
//! one period per cycle.

use std::cell::Cell;
use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use kestrel_common::config::ConfigError;
use kestrel_common::error::SchedulerError;
use kestrel_common::hal::{ActuatorBank, ChannelId, InputSample, SensorFrame};
use kestrel_common::telemetry::{JsonLinesTelemetry, MemoryTelemetry, Telemetry};
use kestrel_common::tunable::MemoryParameterStore;

use crate::config::KestrelConfig;
use crate::robot::{
    self, Robot, ARM_SOLENOID, CONVEYOR_EMPTY, CONVEYOR_MOTOR, LEFT_DRIVE, RIGHT_DRIVE,
    ROLLER_MOTOR,
};
use crate::scheduler::{Io, Scheduler, TickReport};
use crate::sim::{ConveyorPlant, ScriptedInputs, SimActuator};

/// Conveyor fill rate at full output [1/s].
const CONVEYOR_FILL_RATE: f64 = 4.0;

/// Extra simulated time after the last script step in fast mode [s].
const SCRIPT_TAIL_S: f64 = 1.0;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles whose body took longer than the period.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

/// Scheduler counters summed over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub started: u64,
    pub finished: u64,
    pub interrupted: u64,
    pub faults: u64,
}

impl RunSummary {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks = self.ticks.max(report.tick);
        self.started += u64::from(report.started);
        self.finished += u64::from(report.finished);
        self.interrupted += u64::from(report.interrupted);
        self.faults += u64::from(report.faults);
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during host setup or cycle execution.
#[derive(Debug, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
    /// Hard deadline missed with the `rt` feature enabled.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration [ns].
        actual_ns: i64,
        /// Configured cycle budget [ns].
        budget_ns: i64,
    },
    /// Invalid configuration or script.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Robot wiring rejected by the scheduler.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    /// Telemetry sink could not be opened.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockAllFlags};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the loop never faults it in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, aligned reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Prepare the calling thread for the control loop.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Telemetry Sink ─────────────────────────────────────────────────

/// Data-log destination chosen by `[telemetry] log_path`.
pub enum TelemetrySink {
    Memory(MemoryTelemetry),
    File(JsonLinesTelemetry<BufWriter<File>>),
}

impl TelemetrySink {
    pub fn open(log_path: Option<&str>) -> Result<Self, CycleError> {
        match log_path {
            None => Ok(Self::Memory(MemoryTelemetry::new())),
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| CycleError::Telemetry(format!("{path}: {e}")))?;
                info!("writing telemetry to {path}");
                Ok(Self::File(JsonLinesTelemetry::new(BufWriter::new(file))))
            }
        }
    }

    pub fn flush(&mut self) {
        if let Self::File(sink) = self {
            sink.flush();
            if sink.write_errors() > 0 {
                warn!("{} telemetry records dropped", sink.write_errors());
            }
        }
    }
}

impl Telemetry for TelemetrySink {
    fn append(&mut self, series: &str, value: f64, timestamp: f64) {
        match self {
            Self::Memory(t) => t.append(series, value, timestamp),
            Self::File(t) => t.append(series, value, timestamp),
        }
    }

    fn fault(&mut self, source: &str, message: &str, timestamp: f64) {
        match self {
            Self::Memory(t) => t.fault(source, message, timestamp),
            Self::File(t) => t.fault(source, message, timestamp),
        }
    }
}

// ─── Cycle Runner ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Sleep until each period boundary.
    #[default]
    RealTime,
    /// Run cycles back to back.
    Fast,
}

/// Owns the scheduler, the robot wiring and the simulated collaborators.
pub struct CycleRunner {
    scheduler: Scheduler,
    robot: Robot,
    bank: ActuatorBank,
    readback: Vec<(ChannelId, Rc<Cell<f64>>)>,
    script: ScriptedInputs,
    sensors: SensorFrame,
    plant: ConveyorPlant,
    params: MemoryParameterStore,
    telemetry: TelemetrySink,
    stats: CycleStats,
    summary: RunSummary,
    period_s: f64,
    cycle_time_ns: i64,
}

impl CycleRunner {
    pub fn new(config: &KestrelConfig) -> Result<Self, CycleError> {
        let telemetry = TelemetrySink::open(config.telemetry.log_path.as_deref())?;
        Self::with_telemetry(config, telemetry)
    }

    pub fn with_telemetry(config: &KestrelConfig, telemetry: TelemetrySink) -> Result<Self, CycleError> {
        let mut scheduler = Scheduler::new(config.period_s());
        let robot = robot::build(&mut scheduler, config)?;
        let script = ScriptedInputs::from_steps(&config.script)?;

        let mut bank = ActuatorBank::new();
        let mut readback = Vec::new();
        for (channel, name) in [
            (LEFT_DRIVE, "left drive"),
            (RIGHT_DRIVE, "right drive"),
            (CONVEYOR_MOTOR, "conveyor"),
            (ROLLER_MOTOR, "rollers"),
            (ARM_SOLENOID, "arm solenoid"),
        ] {
            let (actuator, value) = SimActuator::new(name);
            bank.attach(channel, Box::new(actuator));
            readback.push((channel, value));
        }

        let mut sensors = SensorFrame::new();
        let plant = ConveyorPlant::new(CONVEYOR_MOTOR, CONVEYOR_EMPTY, CONVEYOR_FILL_RATE);
        plant.publish(&mut sensors);

        Ok(Self {
            scheduler,
            robot,
            bank,
            readback,
            script,
            sensors,
            plant,
            params: MemoryParameterStore::new(),
            telemetry,
            stats: CycleStats::new(),
            summary: RunSummary::default(),
            period_s: config.period_s(),
            cycle_time_ns: i64::from(config.cycle_time_us) * 1000,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn robot(&self) -> &Robot {
        &self.robot
    }

    pub fn params(&self) -> &MemoryParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut MemoryParameterStore {
        &mut self.params
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    pub fn plant(&self) -> &ConveyorPlant {
        &self.plant
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Last value flushed to `channel`'s actuator.
    pub fn actuator_value(&self, channel: ChannelId) -> Option<f64> {
        self.readback
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, v)| v.get())
    }

    /// Simulated time of the next cycle [s].
    pub fn sim_time(&self) -> f64 {
        self.stats.cycle_count as f64 * self.period_s
    }

    /// Cycles needed to play the whole script plus a short tail.
    pub fn script_cycles(&self) -> u64 {
        let cycles = (self.script.end_s() + SCRIPT_TAIL_S) / self.period_s;
        // Absorb representation error so whole multiples don't round up.
        (cycles - 1e-9).ceil() as u64
    }

    /// Run until `running` clears or `max_cycles` have executed, then shut
    /// the scheduler down and neutral every output.
    pub fn run(
        &mut self,
        running: &AtomicBool,
        max_cycles: Option<u64>,
        pacing: Pacing,
    ) -> Result<RunSummary, CycleError> {
        let mut pacer = Pacer::new(self.cycle_time_ns, pacing);

        while running.load(Ordering::SeqCst) && max_cycles.is_none_or(|n| self.stats.cycle_count < n) {
            let latency_ns = pacer.wait()?;
            let start = std::time::Instant::now();

            self.cycle_body();

            let duration_ns = start.elapsed().as_nanos() as i64;
            self.stats.record(duration_ns, latency_ns);
            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
                // Only a paced RT loop treats the period as a hard deadline.
                if cfg!(feature = "rt") && pacing == Pacing::RealTime {
                    self.shutdown();
                    return Err(CycleError::CycleOverrun {
                        actual_ns: duration_ns,
                        budget_ns: self.cycle_time_ns,
                    });
                }
                warn!(
                    "cycle {} overrun: {duration_ns}ns > {}ns budget",
                    self.stats.cycle_count, self.cycle_time_ns
                );
            }
        }

        self.shutdown();
        info!(
            "ran {} cycles (avg {}ns, max {}ns, {} overruns)",
            self.stats.cycle_count,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns,
            self.stats.overruns
        );
        Ok(self.summary)
    }

    /// One cycle at the current simulated time.
    pub fn cycle_body(&mut self) -> TickReport {
        let t = self.sim_time();
        let inputs = self.script.sample_at(t);

        let report = self.scheduler.run_tick(
            &mut Io {
                inputs: &inputs,
                sensors: &self.sensors,
                params: &mut self.params,
                telemetry: &mut self.telemetry,
            },
            t,
        );
        if report.started + report.finished + report.interrupted + report.faults > 0 {
            debug!("t={t:.2}s {report:?}");
        }
        self.summary.absorb(&report);

        self.bank.flush(self.scheduler.outputs());
        self.plant
            .update(self.scheduler.outputs(), self.period_s, &mut self.sensors);
        report
    }

    fn shutdown(&mut self) {
        let t = self.sim_time();
        let inputs = InputSample::default();
        let report = self.scheduler.shutdown(
            &mut Io {
                inputs: &inputs,
                sensors: &self.sensors,
                params: &mut self.params,
                telemetry: &mut self.telemetry,
            },
            t,
        );
        self.summary.absorb(&report);
        self.bank.flush(self.scheduler.outputs());
        self.bank.stop_all();
        self.telemetry.flush();
        info!("scheduler shut down at t={t:.2}s");
    }
}

// ─── Pacing ─────────────────────────────────────────────────────────

/// Sleeps until each period boundary; returns the wake-up latency [ns].
struct Pacer {
    pacing: Pacing,
    cycle_time_ns: i64,
    #[cfg(feature = "rt")]
    next_wake: Option<nix::sys::time::TimeSpec>,
    #[cfg(not(feature = "rt"))]
    next_wake: Option<std::time::Instant>,
}

impl Pacer {
    fn new(cycle_time_ns: i64, pacing: Pacing) -> Self {
        Self {
            pacing,
            cycle_time_ns,
            next_wake: None,
        }
    }

    #[cfg(feature = "rt")]
    fn wait(&mut self) -> Result<i64, CycleError> {
        use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

        if self.pacing == Pacing::Fast {
            return Ok(0);
        }
        let clock = ClockId::CLOCK_MONOTONIC;
        let now = clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
        let Some(target) = self.next_wake else {
            self.next_wake = Some(timespec_add_ns(now, self.cycle_time_ns));
            return Ok(0);
        };
        let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &target);
        let woke = clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
        self.next_wake = Some(timespec_add_ns(target, self.cycle_time_ns));
        Ok(timespec_diff_ns(&woke, &target).abs())
    }

    #[cfg(not(feature = "rt"))]
    fn wait(&mut self) -> Result<i64, CycleError> {
        use std::time::{Duration, Instant};

        if self.pacing == Pacing::Fast {
            return Ok(0);
        }
        let period = Duration::from_nanos(self.cycle_time_ns as u64);
        let Some(target) = self.next_wake else {
            self.next_wake = Some(Instant::now() + period);
            return Ok(0);
        };
        if let Some(remaining) = target.checked_duration_since(Instant::now()) {
            std::thread::sleep(remaining);
        }
        let latency = Instant::now().saturating_duration_since(target);
        self.next_wake = Some(target + period);
        Ok(latency.as_nanos() as i64)
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let total = ts.tv_nsec() + ns;
    let secs = ts.tv_sec() + total.div_euclid(1_000_000_000);
    TimeSpec::new(secs, total.rem_euclid(1_000_000_000))
}

/// (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

// ─── Tests ──────────────────────────────────────────────────────────
