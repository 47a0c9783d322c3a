//! Constant Turn Rate and Velocity (CTRV) motion model
//!
//! Maps an augmented sigma point [px, py, v, yaw, yaw_rate, nu_a, nu_yawdd]
//! forward by `dt` seconds into a 5D state sigma point. Speed and yaw rate
//! follow a random walk driven by the two noise terms.

use crate::types::{AugStateVec, StateVec};

/// Below this |yaw_rate| the straight-line branch is used
pub const YAW_RATE_EPSILON: f64 = 1e-5;

pub fn propagate(aug: &AugStateVec, dt: f64) -> StateVec {
    let px = aug[0];
    let py = aug[1];
    let v = aug[2];
    let yaw = aug[3];
    let yaw_rate = aug[4];
    let nu_a = aug[5];
    let nu_yawdd = aug[6];

    let (mut px_p, mut py_p) = if yaw_rate.abs() > YAW_RATE_EPSILON {
        // Arc motion
        let yaw_end = yaw + yaw_rate * dt;
        (
            px + v / yaw_rate * (yaw_end.sin() - yaw.sin()),
            py + v / yaw_rate * (yaw.cos() - yaw_end.cos()),
        )
    } else {
        // Straight line
        (px + v * dt * yaw.cos(), py + v * dt * yaw.sin())
    };
    let mut v_p = v;
    let mut yaw_p = yaw + yaw_rate * dt;
    let mut yaw_rate_p = yaw_rate;

    // Process noise
    let half_dt2 = 0.5 * dt * dt;
    px_p += half_dt2 * yaw.cos() * nu_a;
    py_p += half_dt2 * yaw.sin() * nu_a;
    v_p += dt * nu_a;
    yaw_p += half_dt2 * nu_yawdd;
    yaw_rate_p += dt * nu_yawdd;

    StateVec::new(px_p, py_p, v_p, yaw_p, yaw_rate_p)
}
