//! Host configuration: TOML loading with validation.
//!
//! Every section is optional; missing fields fall back to the values the
//! robot was tuned with. Numeric parameters are range-checked by
//! `validate()` before the scheduler is built.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use kestrel_common::config::{ConfigError, ConfigLoader, SharedConfig};
use kestrel_common::consts::{CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN};
use kestrel_common::hal::Buttons;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KestrelConfig {
    #[serde(default)]
    pub shared: SharedConfig,

    /// Control period in microseconds (default: 20000 = 50 Hz).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub intake: IntakeConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Simulated operator input timeline.
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}

impl Default for KestrelConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            cycle_time_us: CYCLE_TIME_US,
            drive: DriveConfig::default(),
            intake: IntakeConfig::default(),
            telemetry: TelemetryConfig::default(),
            script: Vec::new(),
        }
    }
}

impl KestrelConfig {
    /// Control period [s].
    #[inline]
    pub fn period_s(&self) -> f64 {
        self.cycle_time_us as f64 / 1_000_000.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if !(CYCLE_TIME_US_MIN..=CYCLE_TIME_US_MAX).contains(&self.cycle_time_us) {
            return Err(ConfigError::ValidationError(format!(
                "cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            )));
        }
        self.drive.validate().map_err(ConfigError::ValidationError)?;
        self.intake.validate().map_err(ConfigError::ValidationError)?;

        let mut last = f64::NEG_INFINITY;
        for (i, step) in self.script.iter().enumerate() {
            step.validate()
                .map_err(|e| ConfigError::ValidationError(format!("script[{i}]: {e}")))?;
            if step.at_s < last {
                return Err(ConfigError::ValidationError(format!(
                    "script[{i}]: at_s {} is earlier than the previous step",
                    step.at_s
                )));
            }
            last = step.at_s;
        }
        Ok(())
    }
}

// ─── Drive ──────────────────────────────────────────────────────────

/// Limiter seed used when a rate bound changes while driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReseedPolicy {
    /// Continue from the limiter's current output; no jump.
    #[default]
    Output,
    /// Restart at the freshly computed target value.
    Target,
}

/// Drive command defaults. These are also the values published to the
/// parameter store when the drive command starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub speed_scale: f64,
    pub turn_scale: f64,
    pub square_inputs: bool,
    /// [output units/s]
    pub positive_speed_rate_limit: f64,
    pub negative_speed_rate_limit: f64,
    pub positive_turn_rate_limit: f64,
    pub negative_turn_rate_limit: f64,
    /// Joystick deadband applied before squaring and scaling.
    pub deadband: f64,
    /// Always allow turning in place.
    pub quick_turn_always: bool,
    pub reseed: ReseedPolicy,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            speed_scale: 1.0,
            turn_scale: 0.5,
            square_inputs: false,
            positive_speed_rate_limit: 5.0,
            negative_speed_rate_limit: -5.0,
            positive_turn_rate_limit: 10.0,
            negative_turn_rate_limit: -10.0,
            deadband: 0.02,
            quick_turn_always: true,
            reseed: ReseedPolicy::Output,
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("speed_scale", self.speed_scale),
            ("turn_scale", self.turn_scale),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("drive.{name} {v} out of range [0, 1]"));
            }
        }
        for (name, v) in [
            ("positive_speed_rate_limit", self.positive_speed_rate_limit),
            ("positive_turn_rate_limit", self.positive_turn_rate_limit),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("drive.{name} must be > 0, got {v}"));
            }
        }
        for (name, v) in [
            ("negative_speed_rate_limit", self.negative_speed_rate_limit),
            ("negative_turn_rate_limit", self.negative_turn_rate_limit),
        ] {
            if !(v.is_finite() && v < 0.0) {
                return Err(format!("drive.{name} must be < 0, got {v}"));
            }
        }
        if !(0.0..0.5).contains(&self.deadband) {
            return Err(format!(
                "drive.deadband {} out of range [0, 0.5)",
                self.deadband
            ));
        }
        Ok(())
    }
}

// ─── Intake ─────────────────────────────────────────────────────────

/// Eject / intake sequence tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Conveyor output while ejecting (negative = reverse).
    pub eject_conveyor_speed: f64,
    pub eject_roller_speed: f64,
    /// How long the conveyor runs while ejecting [s].
    pub eject_duration_s: f64,
    pub intake_conveyor_speed: f64,
    pub intake_roller_speed: f64,
    /// Give up intaking after this long without a full conveyor [s].
    pub intake_timeout_s: f64,
    /// Time for the arms to travel after the solenoid switches [s].
    pub arm_settle_s: f64,
    /// Solenoid reads `false` when the arms are lowered.
    pub invert_arm_solenoid: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            eject_conveyor_speed: -0.3,
            eject_roller_speed: 0.3,
            eject_duration_s: 1.0,
            intake_conveyor_speed: 0.3,
            intake_roller_speed: -0.3,
            intake_timeout_s: 3.0,
            arm_settle_s: 0.25,
            invert_arm_solenoid: true,
        }
    }
}

impl IntakeConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("eject_conveyor_speed", self.eject_conveyor_speed),
            ("eject_roller_speed", self.eject_roller_speed),
            ("intake_conveyor_speed", self.intake_conveyor_speed),
            ("intake_roller_speed", self.intake_roller_speed),
        ] {
            if !(-1.0..=1.0).contains(&v) {
                return Err(format!("intake.{name} {v} out of range [-1, 1]"));
            }
        }
        for (name, v) in [
            ("eject_duration_s", self.eject_duration_s),
            ("intake_timeout_s", self.intake_timeout_s),
            ("arm_settle_s", self.arm_settle_s),
        ] {
            if !(0.0..=60.0).contains(&v) {
                return Err(format!("intake.{name} {v} out of range [0, 60]"));
            }
        }
        Ok(())
    }
}

// ─── Telemetry ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSON-lines data log; `None` keeps samples in memory only.
    pub log_path: Option<String>,
}

// ─── Input Script ───────────────────────────────────────────────────

/// Operator input held from `at_s` until the next step.
///
/// ```toml
/// [[script]]
/// at_s = 1.0
/// speed = 0.8
/// buttons = ["eject"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_s: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub turn: f64,
    #[serde(default)]
    pub buttons: Vec<String>,
}

impl ScriptStep {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.at_s.is_finite() && self.at_s >= 0.0) {
            return Err(format!("at_s must be >= 0, got {}", self.at_s));
        }
        for (name, v) in [("speed", self.speed), ("turn", self.turn)] {
            if !(-1.0..=1.0).contains(&v) {
                return Err(format!("{name} {v} out of range [-1, 1]"));
            }
        }
        self.button_mask().map(|_| ())
    }

    /// Parsed button set.
    pub fn button_mask(&self) -> Result<Buttons, String> {
        self.buttons.iter().try_fold(Buttons::empty(), |acc, name| {
            Buttons::from_script_name(name)
                .map(|b| acc | b)
                .ok_or_else(|| format!("unknown button '{name}'"))
        })
    }
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> Result<KestrelConfig, ConfigError> {
    let config = KestrelConfig::load(path)?;
    config.validate()?;
    info!(
        "loaded {} (cycle_time={}µs, {} script steps)",
        path.display(),
        config.cycle_time_us,
        config.script.len()
    );
    Ok(config)
}

/// Parse and validate an in-memory TOML document.
pub fn load_config_from_str(content: &str) -> Result<KestrelConfig, ConfigError> {
    let config = KestrelConfig::from_toml_str(content)?;
    config.validate()?;
    Ok(config)
}
