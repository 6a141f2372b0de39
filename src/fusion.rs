// fusion.rs — Pure computation layer for radar/lidar fusion
//
// Everything in this module is independent of:
//   - measurement ingestion, timestamping, file I/O
//   - any process wrapper or CLI feeding the filter
//
// It takes typed measurements in, produces state estimates out. This means
// you can unit-test it with recorded data and swap the ingestion frontend
// for a live sensor feed without touching fusion logic.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::FusionError;
use crate::filters::ekf::Ekf;
use crate::models::{
    lidar_observation_matrix, process_noise, radar_jacobian, radar_observation,
    radar_position_observation, transition_matrix,
};
use crate::types::{
    LidarData, LidarNoise, LidarObsMat, Measurement, RadarData, RadarNoise, RadarVec, StateMat,
    StateVec,
};

const MICROS_PER_SEC: f64 = 1_000_000.0;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Sensor noise and motion-model tuning, fixed at construction.
///
/// These are domain constants calibrated offline; holding them in an explicit
/// config (instead of module-level state) makes the filter trivially
/// instantiable multiple times with different tuning.
#[derive(Clone, Debug)]
pub struct FusionConfig {
    /// Lidar position variance, per axis [m²]
    pub lidar_position_var: f64,

    /// Radar range variance [m²]
    pub radar_range_var: f64,
    /// Radar bearing variance [rad²]
    pub radar_bearing_var: f64,
    /// Radar range-rate variance [m²/s²]
    pub radar_range_rate_var: f64,

    /// Process noise: acceleration variance along x [m²/s⁴]
    pub noise_ax: f64,
    /// Process noise: acceleration variance along y [m²/s⁴]
    pub noise_ay: f64,

    /// Initial position variance, per axis [m²]
    pub init_position_var: f64,
    /// Initial velocity variance, per axis [m²/s²] — large, since velocity
    /// is unobservable from a single measurement
    pub init_velocity_var: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            lidar_position_var: 0.0225,
            radar_range_var: 0.09,
            radar_bearing_var: 0.0009,
            radar_range_rate_var: 0.09,
            noise_ax: 9.0,
            noise_ay: 9.0,
            init_position_var: 1.0,
            init_velocity_var: 1000.0,
        }
    }
}

// ─── Fusion output snapshot ──────────────────────────────────────────────────

/// Read-only snapshot of the current estimate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FusionEstimate {
    /// Estimated position (px, py) [meters]
    pub position: (f64, f64),

    /// Estimated velocity (vx, vy) [m/s]
    pub velocity: (f64, f64),

    /// Covariance trace for overall uncertainty
    pub covariance_trace: f64,

    /// RMS position uncertainty [meters]
    pub position_uncertainty: f64,

    /// Update counters
    pub lidar_updates: u64,
    pub radar_updates: u64,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Filter lifecycle. The transition is one-way: the first measurement of any
/// type seeds the state and moves the filter to `Tracking` for good.
#[derive(Clone, Copy, Debug)]
enum Phase {
    Uninitialized,
    Tracking { last_timestamp_us: i64 },
}

/// Drives the Kalman core from a strictly ordered measurement stream:
/// seeds the state on the first measurement, then runs predict + the
/// sensor-appropriate correction on every subsequent one.
pub struct FusionEkf {
    config: FusionConfig,
    phase: Phase,
    ekf: Ekf,

    // Sensor constants, built once from the config
    h_lidar: LidarObsMat,
    r_lidar: LidarNoise,
    r_radar: RadarNoise,

    lidar_updates: u64,
    radar_updates: u64,
}

impl FusionEkf {
    pub fn new(config: FusionConfig) -> Self {
        let r_lidar = LidarNoise::from_diagonal_element(config.lidar_position_var);
        let r_radar = RadarNoise::from_diagonal(&RadarVec::new(
            config.radar_range_var,
            config.radar_bearing_var,
            config.radar_range_rate_var,
        ));

        Self {
            config,
            phase: Phase::Uninitialized,
            // Placeholder until the first measurement seeds it.
            ekf: Ekf::new(StateVec::zeros(), StateMat::zeros()),
            h_lidar: lidar_observation_matrix(),
            r_lidar,
            r_radar,
            lidar_updates: 0,
            radar_updates: 0,
        }
    }

    /// Feed one measurement, in timestamp order. On the first call this
    /// initializes the state and performs no predict/update; afterwards each
    /// call runs one full predict + correct cycle.
    ///
    /// Errors are fatal for the cycle and propagate unchanged; the filter
    /// never retries. After a failed correction the mean and covariance hold
    /// the predicted (uncorrected) values, so dropping the offending
    /// measurement and continuing is safe.
    pub fn process_measurement(&mut self, measurement: &Measurement) -> Result<(), FusionError> {
        let timestamp_us = measurement.timestamp_us();

        let last_timestamp_us = match self.phase {
            Phase::Uninitialized => {
                self.initialize(measurement);
                self.phase = Phase::Tracking {
                    last_timestamp_us: timestamp_us,
                };
                return Ok(());
            }
            Phase::Tracking { last_timestamp_us } => last_timestamp_us,
        };

        if timestamp_us < last_timestamp_us {
            log::warn!(
                "rejecting out-of-order measurement: {timestamp_us} us < {last_timestamp_us} us"
            );
            return Err(FusionError::OutOfOrderMeasurement {
                timestamp_us,
                previous_us: last_timestamp_us,
            });
        }

        let dt = (timestamp_us - last_timestamp_us) as f64 / MICROS_PER_SEC;
        self.phase = Phase::Tracking {
            last_timestamp_us: timestamp_us,
        };

        let f = transition_matrix(dt);
        let q = process_noise(dt, self.config.noise_ax, self.config.noise_ay);
        self.ekf.predict(&f, &q);

        match measurement {
            Measurement::Lidar(lidar) => {
                let z = Vector2::new(lidar.x, lidar.y);
                self.ekf.update(&z, &self.h_lidar, &self.r_lidar)?;
                self.lidar_updates += 1;
            }
            Measurement::Radar(radar) => {
                self.update_radar(radar)?;
                self.radar_updates += 1;
            }
        }
        Ok(())
    }

    /// Radar correction: linearized gain, nonlinear residual. The Jacobian is
    /// evaluated at the just-predicted state; a degenerate linearization
    /// point aborts the correction before any state is touched.
    fn update_radar(&mut self, radar: &RadarData) -> Result<(), FusionError> {
        let hj = radar_jacobian(self.ekf.state())?;

        match radar.range_rate {
            Some(range_rate) => {
                let z = RadarVec::new(radar.range, radar.bearing, range_rate);
                self.ekf.update_ekf(&z, &hj, &self.r_radar, radar_observation)
            }
            None => {
                // Range-and-bearing-only return: drop the Doppler row of the
                // Jacobian and the matching block of R.
                let z = Vector2::new(radar.range, radar.bearing);
                let h = hj.fixed_view::<2, 4>(0, 0).into_owned();
                let r = self.r_radar.fixed_view::<2, 2>(0, 0).into_owned();
                self.ekf.update_ekf(&z, &h, &r, radar_position_observation)
            }
        }
    }

    /// Seed the state from the first measurement. Radar positions are
    /// converted from polar to Cartesian; when a range rate is present its
    /// radial projection seeds the velocity (the tangential component stays
    /// unobservable and zero).
    fn initialize(&mut self, measurement: &Measurement) {
        let x = match measurement {
            Measurement::Lidar(LidarData { x, y, .. }) => StateVec::new(*x, *y, 0.0, 0.0),
            Measurement::Radar(RadarData {
                range,
                bearing,
                range_rate,
                ..
            }) => {
                let (sin_phi, cos_phi) = bearing.sin_cos();
                let rate = range_rate.unwrap_or(0.0);
                StateVec::new(
                    range * cos_phi,
                    range * sin_phi,
                    rate * cos_phi,
                    rate * sin_phi,
                )
            }
        };

        let p = StateMat::from_diagonal(&StateVec::new(
            self.config.init_position_var,
            self.config.init_position_var,
            self.config.init_velocity_var,
            self.config.init_velocity_var,
        ));

        log::info!(
            "filter initialized at ({:.3}, {:.3}) from {}",
            x[0],
            x[1],
            match measurement {
                Measurement::Lidar(_) => "lidar",
                Measurement::Radar(_) => "radar",
            }
        );
        self.ekf = Ekf::new(x, p);
    }

    /// Whether the first measurement has been processed.
    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, Phase::Tracking { .. })
    }

    /// Current state mean `[px, py, vx, vy]`, if initialized.
    pub fn state(&self) -> Option<&StateVec> {
        self.is_initialized().then(|| self.ekf.state())
    }

    /// Current state covariance, if initialized.
    pub fn covariance(&self) -> Option<&StateMat> {
        self.is_initialized().then(|| self.ekf.covariance())
    }

    /// Snapshot of the current estimate, if initialized.
    pub fn estimate(&self) -> Option<FusionEstimate> {
        if !self.is_initialized() {
            return None;
        }
        let x = self.ekf.state();
        let p = self.ekf.covariance();
        Some(FusionEstimate {
            position: (x[0], x[1]),
            velocity: (x[2], x[3]),
            covariance_trace: p.trace(),
            position_uncertainty: ((p[(0, 0)] + p[(1, 1)]) / 2.0).sqrt(),
            lidar_updates: self.lidar_updates,
            radar_updates: self.radar_updates,
        })
    }
}
