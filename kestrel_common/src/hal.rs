//! Hardware collaborator interfaces.
//!
//! The scheduler never talks to motor controllers or solenoids directly.
//! Commands write into an [`OutputFrame`] during a tick; after the tick the
//! host flushes the frame through an [`ActuatorBank`] to the [`Actuator`]
//! implementations. Joystick and sensor values arrive through the
//! [`InputSource`] and [`SensorSource`] query traits.
//!
//! # Lifecycle
//!
//! 1. Host samples inputs and sensors
//! 2. `Scheduler::run_tick()` updates the output frame
//! 3. `ActuatorBank::flush()` hands the final values to the drivers

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::consts::{MAX_CHANNELS, MAX_SENSORS};

// ─── Identifiers ────────────────────────────────────────────────────

/// Actuator output channel (one motor controller or solenoid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u8);

impl ChannelId {
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_CHANNELS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Sensor input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId(u8);

impl SensorId {
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_SENSORS {
            Some(Self(index))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

// ─── Actuator Outputs ───────────────────────────────────────────────

/// Last commanded value of one output channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Output {
    /// Motor stopped / neutral.
    #[default]
    Stopped,
    /// Percent output in [-1.0, 1.0].
    Percent(f64),
    /// Solenoid state.
    Extended(bool),
}

impl Output {
    /// Percent value, treating `Stopped` as zero and solenoids as `None`.
    #[inline]
    pub const fn percent(self) -> Option<f64> {
        match self {
            Self::Stopped => Some(0.0),
            Self::Percent(v) => Some(v),
            Self::Extended(_) => None,
        }
    }
}

/// Per-channel commanded outputs for one tick.
///
/// Values persist across ticks: a channel keeps its last command until a
/// command writes it again, like a motor controller holding its setpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFrame {
    channels: [Output; MAX_CHANNELS],
}

impl Default for OutputFrame {
    fn default() -> Self {
        Self {
            channels: [Output::Stopped; MAX_CHANNELS],
        }
    }
}

impl OutputFrame {
    /// Command a percent output. Clamped to [-1, 1]; non-finite stops.
    #[inline]
    pub fn set(&mut self, channel: ChannelId, value: f64) {
        self.channels[channel.index()] = if value.is_finite() {
            Output::Percent(value.clamp(-1.0, 1.0))
        } else {
            Output::Stopped
        };
    }

    #[inline]
    pub fn stop(&mut self, channel: ChannelId) {
        self.channels[channel.index()] = Output::Stopped;
    }

    #[inline]
    pub fn set_extended(&mut self, channel: ChannelId, extended: bool) {
        self.channels[channel.index()] = Output::Extended(extended);
    }

    #[inline]
    pub fn get(&self, channel: ChannelId) -> Output {
        self.channels[channel.index()]
    }

    /// Percent output of a channel (`Stopped` reads as 0.0).
    #[inline]
    pub fn percent(&self, channel: ChannelId) -> f64 {
        self.get(channel).percent().unwrap_or(0.0)
    }

    /// Stop every channel. Solenoids keep their position.
    pub fn stop_all(&mut self) {
        for out in self.channels.iter_mut() {
            if !matches!(out, Output::Extended(_)) {
                *out = Output::Stopped;
            }
        }
    }
}

/// Physical output driver (motor controller, solenoid).
pub trait Actuator {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Apply a percent output in [-1, 1].
    fn set(&mut self, value: f64);

    /// Stop / neutral output.
    fn stop(&mut self);

    /// Drive a solenoid. Motor drivers map this onto full output.
    fn set_extended(&mut self, extended: bool) {
        self.set(if extended { 1.0 } else { 0.0 });
    }
}

/// Maps output channels onto actuator drivers.
#[derive(Default)]
pub struct ActuatorBank {
    actuators: Vec<(ChannelId, Box<dyn Actuator>)>,
}

impl ActuatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a driver to a channel, replacing any previous one.
    pub fn attach(&mut self, channel: ChannelId, actuator: Box<dyn Actuator>) {
        if let Some(slot) = self.actuators.iter_mut().find(|(c, _)| *c == channel) {
            warn!("replacing actuator '{}' on channel {}", slot.1.name(), channel.index());
            slot.1 = actuator;
        } else {
            self.actuators.push((channel, actuator));
        }
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    /// Push the frame's final values to every attached driver.
    pub fn flush(&mut self, frame: &OutputFrame) {
        for (channel, actuator) in self.actuators.iter_mut() {
            match frame.get(*channel) {
                Output::Stopped => actuator.stop(),
                Output::Percent(v) => actuator.set(v),
                Output::Extended(e) => actuator.set_extended(e),
            }
        }
    }

    /// Stop every motor driver immediately.
    pub fn stop_all(&mut self) {
        for (_, actuator) in self.actuators.iter_mut() {
            actuator.stop();
        }
    }
}

// ─── Sensors ────────────────────────────────────────────────────────

/// Sampled sensor value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Bool(bool),
    Number(f64),
}

impl SensorValue {
    #[inline]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Number(_) => None,
        }
    }

    #[inline]
    pub const fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(v),
            Self::Bool(_) => None,
        }
    }
}

/// Latest sampled sensor values, queried during a tick.
pub trait SensorSource {
    /// `None` if the sensor is not wired or not sampled.
    fn read(&self, sensor: SensorId) -> Option<SensorValue>;
}

/// Fixed table of sensor samples, filled by the host before each tick.
#[derive(Debug, Clone, Default)]
pub struct SensorFrame {
    values: [Option<SensorValue>; MAX_SENSORS],
}

impl SensorFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, sensor: SensorId, value: SensorValue) {
        self.values[sensor.index()] = Some(value);
    }

    pub fn clear(&mut self, sensor: SensorId) {
        self.values[sensor.index()] = None;
    }
}

impl SensorSource for SensorFrame {
    fn read(&self, sensor: SensorId) -> Option<SensorValue> {
        self.values[sensor.index()]
    }
}

// ─── Operator Inputs ────────────────────────────────────────────────

/// Analog operator input channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAxis {
    /// Forward/backward joystick axis in [-1, 1].
    Speed,
    /// Rotation joystick axis in [-1, 1] (positive = clockwise).
    Turn,
}

bitflags! {
    /// Operator button state sampled at tick time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        /// Run the eject sequence.
        const EJECT      = 0x0001;
        /// Run the intake sequence.
        const INTAKE     = 0x0002;
        /// Allow turning in place.
        const QUICK_TURN = 0x0004;
        /// Cancel every running command.
        const CANCEL     = 0x0008;
    }
}

impl Buttons {
    /// Parse a lowercase button name as used in TOML scripts.
    pub fn from_script_name(name: &str) -> Option<Self> {
        match name {
            "eject" => Some(Self::EJECT),
            "intake" => Some(Self::INTAKE),
            "quick_turn" => Some(Self::QUICK_TURN),
            "cancel" => Some(Self::CANCEL),
            _ => None,
        }
    }
}

/// Latest operator input sample; pure zero-argument queries at tick time.
pub trait InputSource {
    fn axis(&self, axis: InputAxis) -> f64;
    fn buttons(&self) -> Buttons;
}

/// Plain input sample, set by the host or by tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSample {
    pub speed: f64,
    pub turn: f64,
    pub buttons: Buttons,
}

impl InputSource for InputSample {
    fn axis(&self, axis: InputAxis) -> f64 {
        match axis {
            InputAxis::Speed => self.speed,
            InputAxis::Turn => self.turn,
        }
    }

    fn buttons(&self) -> Buttons {
        self.buttons
    }
}
