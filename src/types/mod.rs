pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// Lidar return: Cartesian position of the tracked object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LidarData {
    /// Capture time [microseconds]
    pub timestamp_us: i64,
    pub x: f64,
    pub y: f64,
}

/// Radar return: polar position of the tracked object, with an optional
/// Doppler range rate (some radar modes report range and bearing only).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RadarData {
    /// Capture time [microseconds]
    pub timestamp_us: i64,
    /// Range ρ [meters]
    pub range: f64,
    /// Bearing φ [radians], measured from the x axis
    pub bearing: f64,
    /// Range rate ρ̇ [m/s], when the sensor reports it
    pub range_rate: Option<f64>,
}

/// A single timestamped sensor return. Immutable once produced; the
/// ingestion layer delivers these in non-decreasing timestamp order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Measurement {
    Lidar(LidarData),
    Radar(RadarData),
}

impl Measurement {
    pub fn timestamp_us(&self) -> i64 {
        match self {
            Measurement::Lidar(lidar) => lidar.timestamp_us,
            Measurement::Radar(radar) => radar.timestamp_us,
        }
    }
}
