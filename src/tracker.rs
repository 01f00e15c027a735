//! Frame-by-frame tracker: predict, associate, apply the lifecycle

use crate::association::AssociationEngine;
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::lifecycle::{FrameSummary, TrackLifecycleManager};
use crate::track::Track;
use crate::types::{Observation, RawDetection, TrackOutput};

/// Appearance-aware multi-object tracker.
///
/// Call [`predict`](Self::predict) then [`update`](Self::update) exactly once
/// per frame, in that order.
#[derive(Debug, Clone)]
pub struct TrackerCore {
    config: TrackerConfig,
    engine: AssociationEngine,
    lifecycle: TrackLifecycleManager,
    /// Fixed by configuration or by the first non-empty frame
    embedding_dim: Option<usize>,
    n_frames: u64,
}

impl TrackerCore {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Creating TrackerCore: n_init={}, max_age={}, max_cosine_distance={:.3}, min_iou={:.3}, gallery_capacity={}",
            config.n_init,
            config.max_age,
            config.max_cosine_distance,
            config.min_iou,
            config.gallery_capacity
        );
        Ok(Self {
            engine: AssociationEngine::from_config(&config),
            lifecycle: TrackLifecycleManager::new(config.clone()),
            embedding_dim: config.embedding_dim,
            n_frames: 0,
            config,
        })
    }

    /// Advance every active track's motion state one frame
    pub fn predict(&mut self) {
        self.lifecycle.predict_all();
    }

    /// Associate this frame's observations and update the track set.
    ///
    /// The whole frame is validated first; on a contract violation the
    /// error is returned and no track is touched.
    pub fn update(&mut self, observations: Vec<Observation>) -> Result<FrameSummary> {
        let embedding_dim = self.validate_frame(&observations)?;

        let active: Vec<&Track> = self.lifecycle.tracks().collect();
        let association = self.engine.associate(&active, &observations);

        log::debug!(
            "Frame {}: {} observations, {} tracks, {} matches",
            self.n_frames,
            observations.len(),
            active.len(),
            association.matches.len()
        );

        let summary = self.lifecycle.apply(&association, observations);
        self.embedding_dim = embedding_dim;
        self.n_frames += 1;

        log::debug!(
            "Frame {} done: {:?}, {} active tracks",
            self.n_frames,
            summary,
            self.lifecycle.len()
        );
        Ok(summary)
    }

    /// Bind index-aligned detector and feature-extractor outputs, then update
    pub fn update_with(
        &mut self,
        detections: Vec<RawDetection>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<FrameSummary> {
        let observations = Observation::bind(detections, embeddings)?;
        self.update(observations)
    }

    /// Returns the embedding dimension in force after this frame
    fn validate_frame(&self, observations: &[Observation]) -> Result<Option<usize>> {
        let embedding_dim = self
            .embedding_dim
            .or_else(|| observations.first().map(|obs| obs.embedding.len()));

        for (index, obs) in observations.iter().enumerate() {
            obs.validate(index, embedding_dim)?;
        }
        Ok(embedding_dim)
    }

    /// Confirmed tracks seen in this frame or the one before
    pub fn confirmed_tracks(&self) -> impl Iterator<Item = TrackOutput> + '_ {
        self.lifecycle
            .tracks()
            .filter(|t| t.is_confirmed() && t.time_since_update() <= 1)
            .map(Track::to_output)
    }

    /// Every active track, in id order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.lifecycle.tracks()
    }

    pub fn track(&self, track_id: u32) -> Option<&Track> {
        self.lifecycle.get(track_id)
    }

    pub fn len(&self) -> usize {
        self.lifecycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_empty()
    }

    /// Number of completed updates
    pub fn frame_count(&self) -> u64 {
        self.n_frames
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Drop all tracks. New tracks continue the id sequence.
    pub fn reset(&mut self) {
        self.lifecycle.clear();
        self.embedding_dim = self.config.embedding_dim;
        self.n_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::Bbox;
    use crate::error::TrackerError;
    use crate::track::TrackState;
    use crate::types::ClassId;

    fn obs(x: f32, y: f32, embedding: Vec<f32>) -> Observation {
        Observation::new(Bbox::new(x, y, 50.0, 50.0), 0.9, ClassId(0), embedding)
    }

    fn step(tracker: &mut TrackerCore, observations: Vec<Observation>) -> FrameSummary {
        tracker.predict();
        tracker.update(observations).unwrap()
    }

    #[test]
    fn test_track_confirms_on_third_hit() {
        let mut tracker = TrackerCore::new(TrackerConfig::default()).unwrap();
        step(&mut tracker, vec![obs(10.0, 10.0, vec![1.0, 0.0])]);
        assert_eq!(tracker.confirmed_tracks().count(), 0);
        step(&mut tracker, vec![obs(12.0, 10.0, vec![1.0, 0.0])]);
        assert_eq!(tracker.confirmed_tracks().count(), 0);
        step(&mut tracker, vec![obs(14.0, 10.0, vec![1.0, 0.0])]);

        let out: Vec<TrackOutput> = tracker.confirmed_tracks().collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, 1);
        assert_eq!(tracker.frame_count(), 3);
    }

    #[test]
    fn test_contract_violation_leaves_tracks_unchanged() {
        let mut tracker = TrackerCore::new(TrackerConfig::default()).unwrap();
        step(&mut tracker, vec![obs(10.0, 10.0, vec![1.0, 0.0])]);
        tracker.predict();

        let mut bad = obs(200.0, 10.0, vec![1.0, 0.0]);
        bad.bbox.height = -1.0;
        let err = tracker
            .update(vec![obs(10.0, 10.0, vec![1.0, 0.0]), bad])
            .unwrap_err();
        assert!(err.is_contract_violation());

        let track = tracker.track(1).unwrap();
        assert_eq!(track.hit_streak(), 1);
        assert_eq!(track.state(), TrackState::Tentative);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.frame_count(), 1);
    }

    #[test]
    fn test_embedding_dimension_is_pinned_by_first_frame() {
        let mut tracker = TrackerCore::new(TrackerConfig::default()).unwrap();
        step(&mut tracker, vec![obs(10.0, 10.0, vec![1.0, 0.0, 0.0])]);
        tracker.predict();
        let err = tracker
            .update(vec![obs(10.0, 10.0, vec![1.0, 0.0])])
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::EmbeddingDimension {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_update_with_rejects_misaligned_inputs() {
        let mut tracker = TrackerCore::new(TrackerConfig::default()).unwrap();
        tracker.predict();
        let dets = vec![RawDetection::new(
            Bbox::new(0.0, 0.0, 10.0, 10.0),
            0.8,
            ClassId(0),
        )];
        let err = tracker.update_with(dets, Vec::new()).unwrap_err();
        assert!(matches!(err, TrackerError::LengthMismatch { .. }));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TrackerConfig {
            gallery_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            TrackerCore::new(config),
            Err(TrackerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reset_keeps_ids_monotonic() {
        let mut tracker = TrackerCore::new(TrackerConfig::default()).unwrap();
        step(&mut tracker, vec![obs(0.0, 0.0, vec![1.0]), obs(300.0, 0.0, vec![1.0])]);
        tracker.reset();
        assert!(tracker.is_empty());
        step(&mut tracker, vec![obs(0.0, 0.0, vec![1.0])]);
        assert_eq!(tracker.tracks().next().map(|t| t.id()), Some(3));
    }
}
