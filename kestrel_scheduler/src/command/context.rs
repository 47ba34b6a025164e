//! Per-tick context passed to every command hook.

use kestrel_common::hal::{InputSource, OutputFrame, SensorSource};
use kestrel_common::telemetry::Telemetry;
use kestrel_common::tunable::ParameterStore;

/// Everything a command may touch during one tick.
///
/// Built by the scheduler at the start of `run_tick` and dropped at its
/// end; commands never keep references to it.
pub struct TickContext<'a> {
    /// Fixed control period [s].
    pub dt: f64,
    /// Tick timestamp [s] as supplied by the host.
    pub timestamp: f64,
    /// Operator inputs sampled for this tick.
    pub inputs: &'a dyn InputSource,
    /// Sensor values sampled for this tick.
    pub sensors: &'a dyn SensorSource,
    /// Live-tunable dashboard values.
    pub params: &'a mut dyn ParameterStore,
    /// Append-only telemetry sink.
    pub telemetry: &'a mut dyn Telemetry,
    /// Actuator outputs flushed to hardware after the tick.
    pub outputs: &'a mut OutputFrame,
}

impl TickContext<'_> {
    /// Append a sample stamped with this tick's timestamp.
    #[inline]
    pub fn log(&mut self, series: &str, value: f64) {
        self.telemetry.append(series, value, self.timestamp);
    }
}
