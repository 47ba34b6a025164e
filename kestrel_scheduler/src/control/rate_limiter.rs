//! Asymmetric slew-rate limiter.
//!
//! Bounds how fast a scalar may change per second:
//!
//! ```text
//! delta  = input − output
//! rate   = clamp(delta / dt, negative_limit, positive_limit)
//! output = output + rate × dt
//! ```
//!
//! Reconfiguration validates the new bounds first; a rejected bound leaves
//! the limiter exactly as it was.

use kestrel_common::error::ConfigurationError;

/// Slew-rate limiter with separate rising and falling bounds [units/s].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    positive_limit: f64,
    negative_limit: f64,
    output: f64,
}

impl RateLimiter {
    /// Create a limiter starting at `initial`.
    pub fn new(
        positive_limit: f64,
        negative_limit: f64,
        initial: f64,
    ) -> Result<Self, ConfigurationError> {
        validate(positive_limit, negative_limit, initial)?;
        Ok(Self {
            positive_limit,
            negative_limit,
            output: initial,
        })
    }

    /// Replace both bounds and reset the output to `seed`.
    ///
    /// On error nothing changes.
    pub fn configure(
        &mut self,
        positive_limit: f64,
        negative_limit: f64,
        seed: f64,
    ) -> Result<(), ConfigurationError> {
        validate(positive_limit, negative_limit, seed)?;
        self.positive_limit = positive_limit;
        self.negative_limit = negative_limit;
        self.output = seed;
        Ok(())
    }

    /// Advance by one period of `dt` seconds toward `input`.
    ///
    /// Non-positive or non-finite `dt`, and non-finite `input`, leave the
    /// output unchanged.
    #[inline]
    pub fn step(&mut self, input: f64, dt: f64) -> f64 {
        if dt <= 0.0 || !dt.is_finite() || !input.is_finite() {
            return self.output;
        }
        let rate = ((input - self.output) / dt).clamp(self.negative_limit, self.positive_limit);
        self.output += rate * dt;
        self.output
    }

    /// Jump straight to `value` without changing the bounds.
    #[inline]
    pub fn reset(&mut self, value: f64) {
        if value.is_finite() {
            self.output = value;
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.output
    }

    #[inline]
    pub fn positive_limit(&self) -> f64 {
        self.positive_limit
    }

    #[inline]
    pub fn negative_limit(&self) -> f64 {
        self.negative_limit
    }
}

fn validate(positive: f64, negative: f64, seed: f64) -> Result<(), ConfigurationError> {
    if !(positive.is_finite() && positive > 0.0) {
        return Err(ConfigurationError::InvalidPositiveLimit(positive));
    }
    if !(negative.is_finite() && negative < 0.0) {
        return Err(ConfigurationError::InvalidNegativeLimit(negative));
    }
    if !seed.is_finite() {
        return Err(ConfigurationError::InvalidSeed(seed));
    }
    Ok(())
}
