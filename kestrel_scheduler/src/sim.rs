//! Simulated collaborators for running the host without hardware.
//!
//! - [`ScriptedInputs`] replays the operator timeline from the config.
//! - [`ConveyorPlant`] turns conveyor output into a conveyor-empty reading.
//! - [`SimActuator`] records the last value written to a channel.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use kestrel_common::config::ConfigError;
use kestrel_common::hal::{
    Actuator, ChannelId, InputSample, OutputFrame, SensorFrame, SensorId, SensorValue,
};

use crate::config::ScriptStep;

// ─── Operator Script ────────────────────────────────────────────────

/// Step-wise operator input: each entry holds until the next one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInputs {
    steps: Vec<(f64, InputSample)>,
}

impl ScriptedInputs {
    pub fn from_steps(steps: &[ScriptStep]) -> Result<Self, ConfigError> {
        let steps = steps
            .iter()
            .map(|step| {
                let buttons = step.button_mask().map_err(ConfigError::ValidationError)?;
                Ok((
                    step.at_s,
                    InputSample {
                        speed: step.speed,
                        turn: step.turn,
                        buttons,
                    },
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Time of the last step, or 0 for an empty script.
    pub fn end_s(&self) -> f64 {
        self.steps.last().map_or(0.0, |(t, _)| *t)
    }

    /// Input held at time `t`. Neutral before the first step.
    pub fn sample_at(&self, t: f64) -> InputSample {
        let idx = self.steps.partition_point(|(at, _)| *at <= t);
        match idx {
            0 => InputSample::default(),
            i => self.steps[i - 1].1,
        }
    }
}

// ─── Conveyor Plant ─────────────────────────────────────────────────

/// Fill level above which the conveyor sensor reports a game piece.
const FULL_LEVEL: f64 = 0.5;

/// First-order conveyor model: positive output pulls a piece in,
/// negative output pushes it out.
#[derive(Debug, Clone)]
pub struct ConveyorPlant {
    motor: ChannelId,
    sensor: SensorId,
    /// Fill change per second at full output.
    rate: f64,
    level: f64,
}

impl ConveyorPlant {
    pub fn new(motor: ChannelId, sensor: SensorId, rate: f64) -> Self {
        Self {
            motor,
            sensor,
            rate,
            level: 0.0,
        }
    }

    /// Fill level in [0, 1].
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_empty(&self) -> bool {
        self.level < FULL_LEVEL
    }

    /// Publish the current reading without advancing the model.
    pub fn publish(&self, sensors: &mut SensorFrame) {
        sensors.set(self.sensor, SensorValue::Bool(self.is_empty()));
    }

    /// Advance by `dt` under the frame's conveyor output and publish.
    pub fn update(&mut self, outputs: &OutputFrame, dt: f64, sensors: &mut SensorFrame) {
        let drive = outputs.percent(self.motor);
        self.level = (self.level + drive * self.rate * dt).clamp(0.0, 1.0);
        self.publish(sensors);
    }
}

// ─── Actuators ──────────────────────────────────────────────────────

/// Actuator that records its last value in a shared cell.
pub struct SimActuator {
    name: String,
    value: Rc<Cell<f64>>,
}

impl SimActuator {
    /// New actuator plus a handle for reading back its value.
    pub fn new(name: impl Into<String>) -> (Self, Rc<Cell<f64>>) {
        let value = Rc::new(Cell::new(0.0));
        (
            Self {
                name: name.into(),
                value: Rc::clone(&value),
            },
            value,
        )
    }
}

impl Actuator for SimActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn set(&mut self, value: f64) {
        if self.value.get() != value {
            trace!("{} <- {value:.3}", self.name);
        }
        self.value.set(value);
    }

    fn stop(&mut self) {
        self.set(0.0);
    }
}
