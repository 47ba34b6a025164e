//! System-wide constants for the Kestrel workspace.
//!
//! Single source of truth for numeric limits and default values.

use static_assertions::const_assert;

/// Maximum number of lockable resources (one bit each in a `ResourceSet`).
pub const MAX_RESOURCES: usize = 32;

/// Maximum number of actuator output channels.
pub const MAX_CHANNELS: usize = 16;

/// Maximum number of sensor channels.
pub const MAX_SENSORS: usize = 16;

/// Default control period in microseconds (50 Hz).
pub const CYCLE_TIME_US: u32 = 20_000;

/// Shortest accepted control period [µs].
pub const CYCLE_TIME_US_MIN: u32 = 1_000;

/// Longest accepted control period [µs].
pub const CYCLE_TIME_US_MAX: u32 = 100_000;

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "kestrel";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/kestrel.toml";

const_assert!(MAX_RESOURCES <= u32::BITS as usize);
const_assert!(MAX_CHANNELS <= u8::MAX as usize);
const_assert!(MAX_SENSORS <= u8::MAX as usize);
const_assert!(CYCLE_TIME_US_MIN <= CYCLE_TIME_US && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);

/// Default control period [s].
#[inline]
pub const fn default_period_s() -> f64 {
    CYCLE_TIME_US as f64 / 1_000_000.0
}
