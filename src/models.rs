//! Motion and observation models for the radar/lidar fusion filter.
//!
//! The motion model is constant-velocity with white-noise acceleration as
//! process noise. Lidar observes position linearly; radar observes the
//! polar form (range, bearing, range rate), which is folded into the linear
//! filter by linearizing at the current predicted state.

use std::f64::consts::{PI, TAU};

use nalgebra::Vector2;

use crate::error::FusionError;
use crate::types::{LidarObsMat, RadarJacobian, RadarVec, StateMat, StateVec};

/// Squared-range tolerance below which the radar Jacobian is treated as
/// undefined (linearization point at the origin).
const DEGENERATE_RANGE_SQ: f64 = 1e-8;

/// Constant-velocity transition matrix F for an elapsed time `dt` seconds.
/// Degenerates to the identity at `dt = 0`.
pub fn transition_matrix(dt: f64) -> StateMat {
    let mut f = StateMat::identity();
    f[(0, 2)] = dt;
    f[(1, 3)] = dt;
    f
}

/// Process noise covariance Q for an elapsed time `dt` seconds, modeling
/// unmodeled acceleration as zero-mean white noise with per-axis variances
/// `noise_ax` and `noise_ay`. Degenerates to the zero matrix at `dt = 0`.
pub fn process_noise(dt: f64, noise_ax: f64, noise_ay: f64) -> StateMat {
    let dt2 = dt * dt;
    let dt3 = dt2 * dt;
    let dt4 = dt3 * dt;

    let mut q = StateMat::zeros();
    q[(0, 0)] = dt4 / 4.0 * noise_ax;
    q[(0, 2)] = dt3 / 2.0 * noise_ax;
    q[(1, 1)] = dt4 / 4.0 * noise_ay;
    q[(1, 3)] = dt3 / 2.0 * noise_ay;
    q[(2, 0)] = dt3 / 2.0 * noise_ax;
    q[(2, 2)] = dt2 * noise_ax;
    q[(3, 1)] = dt3 / 2.0 * noise_ay;
    q[(3, 3)] = dt2 * noise_ay;
    q
}

/// Linear lidar observation matrix H: selects (px, py) from the state.
pub fn lidar_observation_matrix() -> LidarObsMat {
    let mut h = LidarObsMat::zeros();
    h[(0, 0)] = 1.0;
    h[(1, 1)] = 1.0;
    h
}

/// Nonlinear radar observation h(x) = (ρ, φ, ρ̇).
///
/// Divides by ρ for the range rate; callers must have guarded the
/// near-origin case via [`radar_jacobian`] on the same state first.
pub fn radar_observation(x: &StateVec) -> RadarVec {
    let (px, py, vx, vy) = (x[0], x[1], x[2], x[3]);
    let rho = (px * px + py * py).sqrt();
    RadarVec::new(rho, py.atan2(px), (px * vx + py * vy) / rho)
}

/// Range-and-bearing observation for radar returns without a range rate.
pub fn radar_position_observation(x: &StateVec) -> Vector2<f64> {
    let (px, py) = (x[0], x[1]);
    Vector2::new((px * px + py * py).sqrt(), py.atan2(px))
}

/// Jacobian of the radar observation function, evaluated at `x`.
///
/// The partial derivatives are undefined when the linearization point is at
/// the origin; that case is detected up front and reported as
/// [`FusionError::DegenerateJacobian`] so NaN/Inf never reach the filter.
pub fn radar_jacobian(x: &StateVec) -> Result<RadarJacobian, FusionError> {
    let (px, py, vx, vy) = (x[0], x[1], x[2], x[3]);

    let rho_sq = px * px + py * py;
    if rho_sq < DEGENERATE_RANGE_SQ {
        log::warn!("radar Jacobian undefined at near-origin state (px={px}, py={py})");
        return Err(FusionError::DegenerateJacobian { px, py });
    }
    let rho = rho_sq.sqrt();
    let rho_cu = rho_sq * rho;

    let mut hj = RadarJacobian::zeros();
    // ∂ρ/∂x
    hj[(0, 0)] = px / rho;
    hj[(0, 1)] = py / rho;
    // ∂φ/∂x
    hj[(1, 0)] = -py / rho_sq;
    hj[(1, 1)] = px / rho_sq;
    // ∂ρ̇/∂x
    hj[(2, 0)] = py * (vx * py - vy * px) / rho_cu;
    hj[(2, 1)] = px * (vy * px - vx * py) / rho_cu;
    hj[(2, 2)] = px / rho;
    hj[(2, 3)] = py / rho;
    Ok(hj)
}

/// Wrap an angle into `(-π, π]`.
///
/// Angular residuals computed by subtraction can wrap by ±2π; the Kalman
/// gain must only ever see the short way around.
pub fn normalize_bearing(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}
