//! Configuration types for the tracker and its motion model

use crate::error::{Result, TrackerError};
use crate::kalman::CHI2INV95_4DOF;
use serde::{Deserialize, Serialize};

/// Noise parameters for the constant-velocity Kalman filter.
///
/// State order is `[cx, cy, aspect, height, vx, vy, va, vh]`, measurement
/// order is `[cx, cy, aspect, height]`. All values are variances.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Initial state covariance diagonal
    pub initial_covariance: [f32; 8],
    /// Process noise covariance diagonal
    pub process_noise: [f32; 8],
    /// Measurement noise covariance diagonal
    pub measurement_noise: [f32; 4],
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            initial_covariance: [100.0, 100.0, 1e-2, 100.0, 4000.0, 4000.0, 1e-4, 4000.0],
            process_noise: [25.0, 25.0, 1e-4, 25.0, 0.4, 0.4, 1e-6, 0.4],
            measurement_noise: [25.0, 25.0, 1e-2, 25.0],
        }
    }
}

/// Configuration for the appearance-aware tracker
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive hits before a tentative track is confirmed
    pub n_init: u32,
    /// Frames a confirmed track survives without a match
    pub max_age: u32,
    /// Largest cosine distance accepted by the appearance stage
    pub max_cosine_distance: f32,
    /// Smallest IoU accepted by the fallback stage
    pub min_iou: f32,
    /// Embeddings kept per track (oldest evicted first)
    pub gallery_capacity: usize,
    /// Squared Mahalanobis distance above which a pair is gated out
    pub gating_threshold: f32,
    /// Only associate detections with tracks of the same class
    pub gate_by_class: bool,
    /// Expected embedding length; learned from the first observation when unset
    pub embedding_dim: Option<usize>,
    pub motion: MotionConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            n_init: 3,
            max_age: 30,
            max_cosine_distance: 0.4,
            min_iou: 0.3,
            gallery_capacity: 100,
            gating_threshold: CHI2INV95_4DOF,
            gate_by_class: false,
            embedding_dim: None,
            motion: MotionConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(TrackerError::config("n_init must be at least 1"));
        }
        if !(0.0..=2.0).contains(&self.max_cosine_distance) {
            return Err(TrackerError::config(format!(
                "max_cosine_distance {} outside [0, 2]",
                self.max_cosine_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.min_iou) {
            return Err(TrackerError::config(format!(
                "min_iou {} outside [0, 1]",
                self.min_iou
            )));
        }
        if self.gallery_capacity == 0 {
            return Err(TrackerError::config("gallery_capacity must be at least 1"));
        }
        if self.gating_threshold.is_nan() || self.gating_threshold <= 0.0 {
            return Err(TrackerError::config("gating_threshold must be positive"));
        }
        if self.embedding_dim == Some(0) {
            return Err(TrackerError::config("embedding_dim must be at least 1"));
        }

        let motion = &self.motion;
        let all_positive = motion
            .initial_covariance
            .iter()
            .chain(motion.process_noise.iter())
            .chain(motion.measurement_noise.iter())
            .all(|v| v.is_finite() && *v > 0.0);
        if !all_positive {
            return Err(TrackerError::config(
                "motion noise variances must be finite and positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_init, 3);
        assert_eq!(config.max_age, 30);
        assert_eq!(config.gallery_capacity, 100);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = TrackerConfig::from_json(r#"{"max_age": 10, "gate_by_class": true}"#).unwrap();
        assert_eq!(config.max_age, 10);
        assert!(config.gate_by_class);
        assert_eq!(config.n_init, 3);
        assert_eq!(config.motion, MotionConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = TrackerConfig {
            min_iou: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TrackerError::InvalidConfig(_))
        ));

        let mut config = TrackerConfig::default();
        config.motion.measurement_noise[0] = -1.0;
        assert!(config.validate().is_err());

        assert!(matches!(
            TrackerConfig::from_json("{not json"),
            Err(TrackerError::Serialization(_))
        ));
    }
}
