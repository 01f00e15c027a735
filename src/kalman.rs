//! Kalman filter implementation for tracking
//!
//! Constant-velocity model over the box state
//! `[center_x, center_y, aspect_ratio, height, vx, vy, va, vh]`, observed
//! through `[center_x, center_y, aspect_ratio, height]`.

use crate::bbox::Bbox;
use crate::config::MotionConfig;
use crate::error::{Result, TrackerError};
use nalgebra::{Matrix4, SMatrix, SVector, Vector4};

pub const DIM_X: usize = 8;
pub const DIM_Z: usize = 4;

pub type StateVector = SVector<f32, DIM_X>;
pub type StateCovariance = SMatrix<f32, DIM_X, DIM_X>;
type ObservationMatrix = SMatrix<f32, DIM_Z, DIM_X>;

/// Chi-square 0.95 quantile for 4 degrees of freedom, the default gate
pub const CHI2INV95_4DOF: f32 = 9.4877;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    pub mean: StateVector,              // State vector
    pub covariance: StateCovariance,    // State covariance matrix
    transition: StateCovariance,        // State transition matrix
    observation: ObservationMatrix,     // Observation matrix
    process_noise: StateCovariance,     // Process noise covariance
    measurement_noise: Matrix4<f32>,    // Observation noise covariance
}

impl KalmanFilter {
    /// Create a filter centred on an unassociated detection, with zero velocity
    pub fn initiate(bbox: &Bbox, config: &MotionConfig) -> Self {
        let z = bbox.to_xyah();
        let mean = StateVector::from_column_slice(&[z[0], z[1], z[2], z[3], 0.0, 0.0, 0.0, 0.0]);

        // x' = x + v for each of the four observed quantities
        let mut transition = StateCovariance::identity();
        for i in 0..DIM_Z {
            transition[(i, i + DIM_Z)] = 1.0;
        }

        let mut observation = ObservationMatrix::zeros();
        for i in 0..DIM_Z {
            observation[(i, i)] = 1.0;
        }

        Self {
            mean,
            covariance: StateCovariance::from_diagonal(&StateVector::from_column_slice(
                &config.initial_covariance,
            )),
            transition,
            observation,
            process_noise: StateCovariance::from_diagonal(&StateVector::from_column_slice(
                &config.process_noise,
            )),
            measurement_noise: Matrix4::from_diagonal(&Vector4::from_column_slice(
                &config.measurement_noise,
            )),
        }
    }

    /// Advance the state one time step
    pub fn predict(&mut self) {
        // Keep aspect ratio and height from being driven non-positive
        for i in [2, 3] {
            if self.mean[i] + self.mean[i + DIM_Z] <= 0.0 {
                self.mean[i + DIM_Z] = 0.0;
            }
        }

        // x = F * x
        self.mean = self.transition * self.mean;

        // P = F * P * F^T + Q
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    /// Project the state distribution into measurement space
    pub fn project(&self) -> (Vector4<f32>, Matrix4<f32>) {
        let mean = self.observation * self.mean;
        let covariance = self.observation * self.covariance * self.observation.transpose()
            + self.measurement_noise;
        (mean, covariance)
    }

    /// Fuse an associated detection box into the predicted state.
    ///
    /// On failure the filter is left untouched.
    pub fn update(&mut self, bbox: &Bbox) -> Result<()> {
        let z = Vector4::from_column_slice(&bbox.to_xyah());
        let (projected_mean, projected_cov) = self.project();

        // Innovation covariance must be positive definite
        let chol = projected_cov.cholesky().ok_or_else(|| {
            TrackerError::numerical("innovation covariance is not positive definite")
        })?;

        // Kalman gain: K = P * H^T * S^-1, solved as (S^-1 * (P * H^T)^T)^T
        let pht = self.covariance * self.observation.transpose();
        let gain = chol.solve(&pht.transpose()).transpose();

        // Residual: y = z - H * x
        let innovation = z - projected_mean;

        let mean = self.mean + gain * innovation;
        let covariance = self.covariance - gain * projected_cov * gain.transpose();
        let covariance = (covariance + covariance.transpose()) * 0.5;

        let diagonal_ok = covariance.diagonal().iter().all(|v| v.is_finite() && *v > 0.0);
        if !mean.iter().all(|v| v.is_finite()) || !diagonal_ok {
            return Err(TrackerError::numerical(
                "corrected state or covariance is degenerate",
            ));
        }

        self.mean = mean;
        self.covariance = covariance;
        Ok(())
    }

    /// Squared Mahalanobis distance between the projected state and each box.
    ///
    /// Returns `f32::INFINITY` for every box when the projected covariance
    /// cannot be factorised.
    pub fn gating_distance(&self, boxes: &[Bbox]) -> Vec<f32> {
        let (mean, covariance) = self.project();
        let Some(chol) = covariance.cholesky() else {
            return vec![f32::INFINITY; boxes.len()];
        };

        boxes
            .iter()
            .map(|bbox| {
                let d = Vector4::from_column_slice(&bbox.to_xyah()) - mean;
                d.dot(&chol.solve(&d))
            })
            .collect()
    }

    /// Current box estimate
    pub fn bbox(&self) -> Bbox {
        Bbox::from_xyah(&[self.mean[0], self.mean[1], self.mean[2], self.mean[3]])
    }

    /// Velocity of the box centre in pixels per frame
    pub fn velocity(&self) -> (f32, f32) {
        (self.mean[4], self.mean[5])
    }
}
