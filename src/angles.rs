use std::f64::consts::PI;

const TWO_PI: f64 = 2.0 * PI;

/// Wrap an angle into (-π, π] with a single Euclidean remainder.
///
/// Non-finite input is returned unchanged.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    // rem_euclid lands in [0, 2π); shift so the result lies in [-π, π)
    let wrapped = (angle + PI).rem_euclid(TWO_PI) - PI;
    // -π maps onto the open end of the interval
    if wrapped <= -PI {
        wrapped + TWO_PI
    } else {
        wrapped
    }
}
