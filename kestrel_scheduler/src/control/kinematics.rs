//! Curvature drive kinematics for a differential drivetrain.
//!
//! ```text
//! turn'  = quick_turn ? turn : |forward| · turn
//! left   = forward + turn'
//! right  = forward − turn'
//! ```
//!
//! Positive turn is clockwise. When either side exceeds unit magnitude
//! both are divided by the larger magnitude, preserving their ratio.

/// Left/right wheel outputs in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

/// Map `(forward, turn)` onto wheel outputs.
///
/// Inputs are clamped to [-1, 1]; non-finite inputs read as zero.
#[inline]
pub fn curvature_drive(forward: f64, turn: f64, quick_turn: bool) -> WheelSpeeds {
    let forward = sanitize(forward);
    let turn = sanitize(turn);

    let effective_turn = if quick_turn {
        turn
    } else {
        forward.abs() * turn
    };

    let mut left = forward + effective_turn;
    let mut right = forward - effective_turn;

    let max = left.abs().max(right.abs());
    if max > 1.0 {
        left /= max;
        right /= max;
    }
    WheelSpeeds { left, right }
}

#[inline]
fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn straight_line() {
        let w = curvature_drive(0.6, 0.0, false);
        assert!(close(w.left, 0.6) && close(w.right, 0.6));
    }

    #[test]
    fn turn_couples_to_forward_without_quick_turn() {
        // Standing still: no rotation.
        assert_eq!(curvature_drive(0.0, 1.0, false), WheelSpeeds::default());

        let w = curvature_drive(0.5, 0.5, false);
        assert!(close(w.left, 0.75) && close(w.right, 0.25));
    }

    #[test]
    fn quick_turn_spins_in_place() {
        let w = curvature_drive(0.0, 0.4, true);
        assert!(close(w.left, 0.4) && close(w.right, -0.4));
    }

    #[test]
    fn turn_authority_shrinks_with_forward_speed() {
        let moving = curvature_drive(0.6, 0.6, false);
        let still = curvature_drive(0.0, 0.6, false);
        let moving_turn = (moving.left - moving.right) / 2.0;
        let still_turn = (still.left - still.right) / 2.0;
        assert!(close(moving.left, 0.96) && close(moving.right, 0.24));
        assert!(still_turn.abs() < moving_turn.abs());

        let spin = curvature_drive(0.0, 0.6, true);
        assert!(close(spin.left, 0.6) && close(spin.right, -0.6));
    }

    #[test]
    fn saturation_preserves_ratio() {
        let w = curvature_drive(1.0, 0.5, true);
        // 1.5 / 0.5 normalized by 1.5.
        assert!(close(w.left, 1.0));
        assert!(close(w.right, 1.0 / 3.0));
    }

    #[test]
    fn inputs_are_clamped() {
        let w = curvature_drive(3.0, f64::NAN, false);
        assert!(close(w.left, 1.0) && close(w.right, 1.0));
    }
}
