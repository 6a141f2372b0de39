//! Kalman core: owns the state mean and covariance, nothing else.
//!
//! The observation matrix and measurement noise are call arguments rather
//! than pre-set fields, so an update can never run against a stale H or R.
//! The core is generic over the measurement dimension; the orchestrator
//! instantiates it for 2-component lidar and 2/3-component radar returns.

use nalgebra::{Const, DimMin, SMatrix, SVector};

use crate::error::FusionError;
use crate::models::normalize_bearing;
use crate::types::{StateMat, StateVec, STATE_DIM};

/// Index of the bearing component in a radar measurement/innovation.
const BEARING_COMPONENT: usize = 1;

/// Extended Kalman filter over the 4D constant-velocity state
/// `[px, py, vx, vy]`.
pub struct Ekf {
    /// State mean
    x: StateVec,
    /// State covariance
    p: StateMat,
}

impl Ekf {
    pub fn new(x: StateVec, p: StateMat) -> Self {
        Self { x, p }
    }

    /// Current state mean.
    pub fn state(&self) -> &StateVec {
        &self.x
    }

    /// Current state covariance.
    pub fn covariance(&self) -> &StateMat {
        &self.p
    }

    /// Time update: `x = F·x`, `P = F·P·Fᵀ + Q`.
    ///
    /// Called exactly once per measurement cycle, before any correction.
    pub fn predict(&mut self, f: &StateMat, q: &StateMat) {
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + q;
    }

    /// Linear measurement update with innovation `y = z − H·x`.
    pub fn update<const M: usize>(
        &mut self,
        z: &SVector<f64, M>,
        h: &SMatrix<f64, M, STATE_DIM>,
        r: &SMatrix<f64, M, M>,
    ) -> Result<(), FusionError>
    where
        Const<M>: DimMin<Const<M>, Output = Const<M>>,
    {
        let y = z - h * self.x;
        self.correct(&y, h, r)
    }

    /// Nonlinear measurement update: the gain is computed from the supplied
    /// Jacobian `hj`, but the innovation uses the actual observation
    /// function, `y = z − observe(x)`. The bearing component of the
    /// innovation is wrapped into `(−π, π]` before the gain is applied.
    ///
    /// `hj` must be the Jacobian of `observe` evaluated at the current
    /// (predicted) state.
    pub fn update_ekf<const M: usize, O>(
        &mut self,
        z: &SVector<f64, M>,
        hj: &SMatrix<f64, M, STATE_DIM>,
        r: &SMatrix<f64, M, M>,
        observe: O,
    ) -> Result<(), FusionError>
    where
        O: Fn(&StateVec) -> SVector<f64, M>,
        Const<M>: DimMin<Const<M>, Output = Const<M>>,
    {
        let mut y = z - observe(&self.x);
        y[BEARING_COMPONENT] = normalize_bearing(y[BEARING_COMPONENT]);
        self.correct(&y, hj, r)
    }

    /// Shared gain/covariance algebra. All-or-nothing: the inversion happens
    /// before the mean or covariance is touched, so a singular innovation
    /// covariance leaves the filter exactly as it was.
    fn correct<const M: usize>(
        &mut self,
        y: &SVector<f64, M>,
        h: &SMatrix<f64, M, STATE_DIM>,
        r: &SMatrix<f64, M, M>,
    ) -> Result<(), FusionError>
    where
        Const<M>: DimMin<Const<M>, Output = Const<M>>,
    {
        let h_t = h.transpose();
        let s = h * self.p * &h_t + r;
        let s_inv = s.try_inverse().ok_or(FusionError::SingularInnovation)?;
        let k = self.p * h_t * s_inv;

        self.x += k * y;
        self.p = (StateMat::identity() - k * h) * self.p;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        lidar_observation_matrix, process_noise, radar_jacobian, radar_observation,
        transition_matrix,
    };
    use crate::types::{LidarNoise, LidarVec, RadarNoise, RadarVec};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn test_filter() -> Ekf {
        let x = StateVec::new(1.0, 2.0, 0.5, -0.5);
        let p = StateMat::from_diagonal(&StateVec::new(1.0, 1.0, 1000.0, 1000.0));
        Ekf::new(x, p)
    }

    fn assert_symmetric(p: &StateMat) {
        let diff = p - p.transpose();
        assert!(diff.iter().all(|v| v.abs() < 1e-9), "covariance not symmetric: {p}");
    }

    #[test]
    fn predict_with_zero_dt_is_a_no_op() {
        let mut ekf = test_filter();
        let x0 = *ekf.state();
        let p0 = *ekf.covariance();

        ekf.predict(&transition_matrix(0.0), &process_noise(0.0, 9.0, 9.0));

        assert_eq!(*ekf.state(), x0);
        assert_eq!(*ekf.covariance(), p0);
    }

    #[test]
    fn predict_grows_position_uncertainty() {
        let mut ekf = test_filter();
        let p0 = *ekf.covariance();

        ekf.predict(&transition_matrix(0.5), &process_noise(0.5, 9.0, 9.0));

        // Velocity uncertainty leaks into position over time.
        assert!(ekf.covariance()[(0, 0)] > p0[(0, 0)]);
        assert!(ekf.covariance()[(1, 1)] > p0[(1, 1)]);
        assert_symmetric(ekf.covariance());
    }

    #[test]
    fn linear_update_shrinks_observed_diagonal() {
        let mut ekf = test_filter();
        let p0 = *ekf.covariance();

        let h = lidar_observation_matrix();
        let r = LidarNoise::from_diagonal_element(0.0225);
        ekf.update(&LidarVec::new(1.1, 2.1), &h, &r).unwrap();

        let p1 = ekf.covariance();
        assert!(p1[(0, 0)] <= p0[(0, 0)]);
        assert!(p1[(1, 1)] <= p0[(1, 1)]);
        assert_symmetric(p1);
    }

    #[test]
    fn linear_update_pulls_mean_toward_measurement() {
        let mut ekf = test_filter();

        let h = lidar_observation_matrix();
        let r = LidarNoise::from_diagonal_element(0.0225);
        ekf.update(&LidarVec::new(2.0, 3.0), &h, &r).unwrap();

        let x = ekf.state();
        assert!(x[0] > 1.0 && x[0] < 2.0);
        assert!(x[1] > 2.0 && x[1] < 3.0);
    }

    #[test]
    fn covariance_stays_symmetric_over_mixed_cycles() {
        let mut ekf = test_filter();
        let h = lidar_observation_matrix();
        let r_lidar = LidarNoise::from_diagonal_element(0.0225);
        let r_radar = RadarNoise::from_diagonal(&RadarVec::new(0.09, 0.0009, 0.09));

        for step in 0..10 {
            ekf.predict(&transition_matrix(0.1), &process_noise(0.1, 9.0, 9.0));
            if step % 2 == 0 {
                let z = radar_observation(ekf.state());
                let hj = radar_jacobian(ekf.state()).unwrap();
                ekf.update_ekf(&z, &hj, &r_radar, radar_observation).unwrap();
            } else {
                let z = LidarVec::new(ekf.state()[0], ekf.state()[1]);
                ekf.update(&z, &h, &r_lidar).unwrap();
            }
            assert_symmetric(ekf.covariance());
        }
    }

    #[test]
    fn ekf_update_normalizes_wrapped_bearing_residual() {
        // Object on the negative x axis: predicted bearing is +π. A measured
        // bearing just past -π differs by ~2π numerically but ~0 physically.
        let x = StateVec::new(-5.0, 1e-4, 0.0, 0.0);
        let p = StateMat::from_diagonal(&StateVec::new(1.0, 1.0, 1000.0, 1000.0));
        let mut ekf = Ekf::new(x, p);

        let predicted = radar_observation(&x);
        assert!(predicted[1] > PI - 0.01);

        let z = RadarVec::new(5.0, -PI + 1e-4, 0.0);
        let hj = radar_jacobian(&x).unwrap();
        let r = RadarNoise::from_diagonal(&RadarVec::new(0.09, 0.0009, 0.09));
        ekf.update_ekf(&z, &hj, &r, radar_observation).unwrap();

        // An un-normalized 2π residual would fling the state across the
        // plane; the corrected position must stay near (-5, 0).
        let x1 = ekf.state();
        assert_relative_eq!(x1[0], -5.0, epsilon = 0.1);
        assert!(x1[1].abs() < 0.1);
        assert_symmetric(ekf.covariance());
    }

    #[test]
    fn singular_innovation_leaves_state_untouched() {
        let mut ekf = test_filter();
        let x0 = *ekf.state();
        let p0 = *ekf.covariance();

        // Zero observation rows with zero noise make S exactly singular.
        let h = SMatrix::<f64, 2, STATE_DIM>::zeros();
        let r = LidarNoise::zeros();
        let err = ekf.update(&LidarVec::new(1.0, 1.0), &h, &r).unwrap_err();

        assert_eq!(err, FusionError::SingularInnovation);
        assert_eq!(*ekf.state(), x0);
        assert_eq!(*ekf.covariance(), p0);
    }
}
