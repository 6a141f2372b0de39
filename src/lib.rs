//! Radar/lidar fusion core: a 4-state extended Kalman filter estimating the
//! position and velocity of a single tracked object from asynchronous,
//! noisy lidar (Cartesian position) and radar (range/bearing/range-rate)
//! returns.
//!
//! The crate owns only the estimation math. Measurement ingestion,
//! timestamping, and any replay/CLI wrapper live upstream and hand this
//! crate typed [`Measurement`] records in timestamp order:
//!
//! ```
//! use fusion_ekf::{FusionConfig, FusionEkf, LidarData, Measurement, RadarData};
//!
//! let mut fusion = FusionEkf::new(FusionConfig::default());
//! fusion.process_measurement(&Measurement::Radar(RadarData {
//!     timestamp_us: 0,
//!     range: 5.0,
//!     bearing: 0.0,
//!     range_rate: None,
//! }))?;
//! fusion.process_measurement(&Measurement::Lidar(LidarData {
//!     timestamp_us: 100_000,
//!     x: 5.1,
//!     y: 0.05,
//! }))?;
//!
//! let estimate = fusion.estimate().unwrap();
//! assert!(estimate.position.0 > 5.0);
//! # Ok::<(), fusion_ekf::FusionError>(())
//! ```

pub mod error;
pub mod filters;
pub mod fusion;
pub mod models;
pub mod types;

pub use error::FusionError;
pub use filters::ekf::Ekf;
pub use fusion::{FusionConfig, FusionEkf, FusionEstimate};
pub use types::{LidarData, Measurement, RadarData};
