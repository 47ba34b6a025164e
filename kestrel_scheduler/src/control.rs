//! Control primitives root.
//!
//! Slew-rate limiting, joystick shaping and differential-drive kinematics.
//! All functions are allocation-free and safe to call every tick.

pub mod kinematics;
pub mod rate_limiter;
pub mod shaping;
