//! Per-tick dashboard and data-log publication.

use kestrel_common::hal::{ChannelId, Output, SensorId, SensorValue};

use crate::command::TickContext;
use crate::scheduler::Periodic;

pub const CONVEYOR_EMPTY_KEY: &str = "isConveyorEmpty";
pub const ARMS_EXTENDED_KEY: &str = "IntakeArms/Extended";
pub const LEFT_OUTPUT_SERIES: &str = "Drive/Left output";
pub const RIGHT_OUTPUT_SERIES: &str = "Drive/Right output";

/// Publishes the conveyor-empty sensor. An unread sensor reports empty.
pub struct ConveyorMonitor {
    sensor: SensorId,
}

impl ConveyorMonitor {
    pub fn new(sensor: SensorId) -> Self {
        Self { sensor }
    }
}

impl Periodic for ConveyorMonitor {
    fn name(&self) -> &str {
        "Conveyor"
    }

    fn periodic(&mut self, ctx: &mut TickContext<'_>) {
        let empty = ctx
            .sensors
            .read(self.sensor)
            .and_then(SensorValue::as_bool)
            .unwrap_or(true);
        ctx.params.put_bool(CONVEYOR_EMPTY_KEY, empty);
    }
}

/// Publishes whether the arms are lowered, from the last solenoid command.
pub struct ArmMonitor {
    solenoid: ChannelId,
    inverted: bool,
}

impl ArmMonitor {
    pub fn new(solenoid: ChannelId, inverted: bool) -> Self {
        Self { solenoid, inverted }
    }
}

impl Periodic for ArmMonitor {
    fn name(&self) -> &str {
        "IntakeArms"
    }

    fn periodic(&mut self, ctx: &mut TickContext<'_>) {
        // Never commanded: arms start raised.
        let extended = match ctx.outputs.get(self.solenoid) {
            Output::Extended(on) => on != self.inverted,
            _ => false,
        };
        ctx.params.put_bool(ARMS_EXTENDED_KEY, extended);
    }
}

/// Appends the drive outputs to the data log.
pub struct DriveMonitor {
    left: ChannelId,
    right: ChannelId,
}

impl DriveMonitor {
    pub fn new(left: ChannelId, right: ChannelId) -> Self {
        Self { left, right }
    }
}

impl Periodic for DriveMonitor {
    fn name(&self) -> &str {
        "Drive"
    }

    fn periodic(&mut self, ctx: &mut TickContext<'_>) {
        let left = ctx.outputs.percent(self.left);
        let right = ctx.outputs.percent(self.right);
        ctx.log(LEFT_OUTPUT_SERIES, left);
        ctx.log(RIGHT_OUTPUT_SERIES, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::node::test_support::Fixture;
    use crate::robot::{ARM_SOLENOID, CONVEYOR_EMPTY, LEFT_DRIVE, RIGHT_DRIVE};
    use kestrel_common::tunable::ParameterStore;

    #[test]
    fn conveyor_state_published() {
        let mut fx = Fixture::default();
        let mut monitor = ConveyorMonitor::new(CONVEYOR_EMPTY);
        monitor.periodic(&mut fx.ctx());
        assert!(fx.params.get_bool(CONVEYOR_EMPTY_KEY, false));

        fx.sensors.set(CONVEYOR_EMPTY, SensorValue::Bool(false));
        monitor.periodic(&mut fx.ctx());
        assert!(!fx.params.get_bool(CONVEYOR_EMPTY_KEY, true));
    }

    #[test]
    fn arm_state_respects_inversion() {
        let mut fx = Fixture::default();
        let mut monitor = ArmMonitor::new(ARM_SOLENOID, true);
        monitor.periodic(&mut fx.ctx());
        assert!(!fx.params.get_bool(ARMS_EXTENDED_KEY, true));

        fx.outputs.set_extended(ARM_SOLENOID, false);
        monitor.periodic(&mut fx.ctx());
        assert!(fx.params.get_bool(ARMS_EXTENDED_KEY, false));
    }

    #[test]
    fn drive_outputs_logged() {
        let mut fx = Fixture::default();
        fx.outputs.set(LEFT_DRIVE, 0.25);
        fx.outputs.set(RIGHT_DRIVE, -0.25);
        DriveMonitor::new(LEFT_DRIVE, RIGHT_DRIVE).periodic(&mut fx.ctx());
        assert_eq!(fx.telemetry.series(LEFT_OUTPUT_SERIES), vec![0.25]);
        assert_eq!(fx.telemetry.series(RIGHT_OUTPUT_SERIES), vec![-0.25]);
    }
}
