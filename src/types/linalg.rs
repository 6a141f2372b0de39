//! Linear algebra type system for the fusion filter
//!
//! Provides compile-time dimension checking and clean type aliases
//! for the Kalman core and the sensor observation models.

use nalgebra::{SMatrix, SVector};

// ===== State Dimension =====
pub const STATE_DIM: usize = 4; // [px, py, vx, vy]

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_LIDAR: usize = 2; // (x, y)
pub const MEASURE_DIM_RADAR: usize = 3; // (range, bearing, range rate)

// ===== State Types =====
pub type StateVec = SVector<f64, STATE_DIM>;
pub type StateMat = SMatrix<f64, STATE_DIM, STATE_DIM>;

// ===== Lidar Measurement Types =====
pub type LidarVec = SVector<f64, MEASURE_DIM_LIDAR>;
pub type LidarNoise = SMatrix<f64, MEASURE_DIM_LIDAR, MEASURE_DIM_LIDAR>;
pub type LidarObsMat = SMatrix<f64, MEASURE_DIM_LIDAR, STATE_DIM>; // 2×4

// ===== Radar Measurement Types =====
pub type RadarVec = SVector<f64, MEASURE_DIM_RADAR>;
pub type RadarNoise = SMatrix<f64, MEASURE_DIM_RADAR, MEASURE_DIM_RADAR>;
pub type RadarJacobian = SMatrix<f64, MEASURE_DIM_RADAR, STATE_DIM>; // 3×4
