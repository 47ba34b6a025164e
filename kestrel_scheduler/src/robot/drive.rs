//! Live-tunable arcade drive.
//!
//! Every tick the command re-reads its tuning from the parameter store,
//! shapes the joystick axes, slew-limits them and maps the result onto
//! the left/right drive channels with curvature kinematics. A changed
//! rate bound reconfigures its limiter in place; a rejected bound is
//! logged once and the previous configuration stays active.

use tracing::{debug, warn};

use kestrel_common::error::{CommandFault, ConfigurationError};
use kestrel_common::hal::{Buttons, ChannelId, InputAxis};
use kestrel_common::resource::{ResourceId, ResourceSet};
use kestrel_common::tunable::ParameterStore;

use crate::command::{Command, TickContext};
use crate::config::{DriveConfig, ReseedPolicy};
use crate::control::kinematics::curvature_drive;
use crate::control::rate_limiter::RateLimiter;
use crate::control::shaping::shape_axis;

/// Parameter store keys.
pub mod keys {
    pub const SPEED_SCALE: &str = "Drive/Speed scale";
    pub const TURN_SCALE: &str = "Drive/Turn scale";
    pub const SQUARE_INPUTS: &str = "Drive/Square inputs";
    pub const POSITIVE_SPEED_RATE_LIMIT: &str = "Drive/Positive speed rate limit";
    pub const NEGATIVE_SPEED_RATE_LIMIT: &str = "Drive/Negative speed rate limit";
    pub const POSITIVE_TURN_RATE_LIMIT: &str = "Drive/Positive turn rate limit";
    pub const NEGATIVE_TURN_RATE_LIMIT: &str = "Drive/Negative turn rate limit";
}

/// One slew-limited axis with its tunable bounds.
#[derive(Debug, Clone)]
struct LimitedAxis {
    label: &'static str,
    positive_key: &'static str,
    negative_key: &'static str,
    limiter: RateLimiter,
    // Last bound pair that failed validation, so it is reported once.
    rejected: Option<(u64, u64)>,
}

impl LimitedAxis {
    fn new(
        label: &'static str,
        positive_key: &'static str,
        negative_key: &'static str,
        positive: f64,
        negative: f64,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            label,
            positive_key,
            negative_key,
            limiter: RateLimiter::new(positive, negative, 0.0)?,
            rejected: None,
        })
    }

    fn publish(&self, params: &mut dyn ParameterStore) {
        params.put_number(self.positive_key, self.limiter.positive_limit());
        params.put_number(self.negative_key, self.limiter.negative_limit());
    }

    /// Apply changed bounds from the store before stepping.
    fn retune(&mut self, params: &dyn ParameterStore, target: f64, reseed: ReseedPolicy) {
        let positive = params.get_number(self.positive_key, self.limiter.positive_limit());
        let negative = params.get_number(self.negative_key, self.limiter.negative_limit());
        if positive == self.limiter.positive_limit() && negative == self.limiter.negative_limit() {
            self.rejected = None;
            return;
        }
        let bits = (positive.to_bits(), negative.to_bits());
        if self.rejected == Some(bits) {
            return;
        }

        let seed = match reseed {
            ReseedPolicy::Output => self.limiter.value(),
            ReseedPolicy::Target => target,
        };
        match self.limiter.configure(positive, negative, seed) {
            Ok(()) => {
                debug!(
                    "{} rate limits now [{negative}, {positive}], seeded at {seed}",
                    self.label
                );
                self.rejected = None;
            }
            Err(e) => {
                warn!("{} rate limits rejected: {e}", self.label);
                self.rejected = Some(bits);
            }
        }
    }

    #[inline]
    fn step(&mut self, target: f64, dt: f64) -> f64 {
        self.limiter.step(target, dt)
    }
}

/// Default command of the drive resource. Never finishes on its own.
#[derive(Debug, Clone)]
pub struct DriveCommand {
    resource: ResourceId,
    left: ChannelId,
    right: ChannelId,
    speed_scale: f64,
    turn_scale: f64,
    square_inputs: bool,
    deadband: f64,
    quick_turn_always: bool,
    reseed: ReseedPolicy,
    speed: LimitedAxis,
    turn: LimitedAxis,
}

impl DriveCommand {
    pub fn new(
        resource: ResourceId,
        left: ChannelId,
        right: ChannelId,
        config: &DriveConfig,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            resource,
            left,
            right,
            speed_scale: config.speed_scale,
            turn_scale: config.turn_scale,
            square_inputs: config.square_inputs,
            deadband: config.deadband,
            quick_turn_always: config.quick_turn_always,
            reseed: config.reseed,
            speed: LimitedAxis::new(
                "speed",
                keys::POSITIVE_SPEED_RATE_LIMIT,
                keys::NEGATIVE_SPEED_RATE_LIMIT,
                config.positive_speed_rate_limit,
                config.negative_speed_rate_limit,
            )?,
            turn: LimitedAxis::new(
                "turn",
                keys::POSITIVE_TURN_RATE_LIMIT,
                keys::NEGATIVE_TURN_RATE_LIMIT,
                config.positive_turn_rate_limit,
                config.negative_turn_rate_limit,
            )?,
        })
    }

    /// Current limiter outputs `(speed, turn)`.
    pub fn limited(&self) -> (f64, f64) {
        (self.speed.limiter.value(), self.turn.limiter.value())
    }
}

impl Command for DriveCommand {
    fn name(&self) -> &str {
        "Drive"
    }

    fn requirements(&self) -> ResourceSet {
        ResourceSet::single(self.resource)
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        ctx.outputs.stop(self.left);
        ctx.outputs.stop(self.right);
        // The drive was stopped, so ramp up from rest.
        self.speed.limiter.reset(0.0);
        self.turn.limiter.reset(0.0);

        ctx.params.put_number(keys::SPEED_SCALE, self.speed_scale);
        ctx.params.put_number(keys::TURN_SCALE, self.turn_scale);
        ctx.params.put_bool(keys::SQUARE_INPUTS, self.square_inputs);
        self.speed.publish(ctx.params);
        self.turn.publish(ctx.params);
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), CommandFault> {
        self.speed_scale = ctx.params.get_number(keys::SPEED_SCALE, self.speed_scale);
        self.turn_scale = ctx.params.get_number(keys::TURN_SCALE, self.turn_scale);
        self.square_inputs = ctx.params.get_bool(keys::SQUARE_INPUTS, self.square_inputs);

        let speed_target = shape_axis(
            ctx.inputs.axis(InputAxis::Speed),
            self.deadband,
            self.square_inputs,
            self.speed_scale,
        );
        let turn_target = shape_axis(
            ctx.inputs.axis(InputAxis::Turn),
            self.deadband,
            self.square_inputs,
            self.turn_scale,
        );

        self.speed.retune(&*ctx.params, speed_target, self.reseed);
        self.turn.retune(&*ctx.params, turn_target, self.reseed);

        let speed = self.speed.step(speed_target, ctx.dt);
        let turn = self.turn.step(turn_target, ctx.dt);

        let quick_turn =
            self.quick_turn_always || ctx.inputs.buttons().contains(Buttons::QUICK_TURN);
        let wheels = curvature_drive(speed, turn, quick_turn);
        ctx.outputs.set(self.left, wheels.left);
        ctx.outputs.set(self.right, wheels.right);
        Ok(())
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>, _interrupted: bool) {
        ctx.outputs.stop(self.left);
        ctx.outputs.stop(self.right);
    }
}
