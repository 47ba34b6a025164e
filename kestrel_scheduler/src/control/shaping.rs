//! Joystick input shaping: deadband, sign-preserving square, scaling.

/// Zero inputs inside `±deadband` and rescale the rest back onto [-1, 1].
///
/// ```text
/// |x| <= d  →  0
/// |x| >  d  →  sign(x) · (|x| − d) / (1 − d)
/// ```
#[inline]
pub fn apply_deadband(value: f64, deadband: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let d = deadband.clamp(0.0, 0.99);
    let magnitude = value.abs();
    if magnitude <= d {
        0.0
    } else {
        value.signum() * ((magnitude - d) / (1.0 - d)).min(1.0)
    }
}

/// Square while keeping the sign: finer control near zero.
#[inline]
pub fn square_preserving_sign(value: f64) -> f64 {
    value * value.abs()
}

/// Full shaping chain for one axis.
#[inline]
pub fn shape_axis(value: f64, deadband: f64, square: bool, scale: f64) -> f64 {
    let v = apply_deadband(value, deadband);
    let v = if square { square_preserving_sign(v) } else { v };
    v * scale
}
