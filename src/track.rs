//! A single tracked identity: motion filter, appearance gallery and lifecycle counters

use crate::bbox::Bbox;
use crate::config::TrackerConfig;
use crate::gallery::AppearanceGallery;
use crate::kalman::KalmanFilter;
use crate::types::{ClassId, Observation, TrackOutput};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a track. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct Track {
    id: u32,
    class_id: ClassId,
    state: TrackState,
    /// Kalman filter tracking bbox state
    kf: KalmanFilter,
    gallery: AppearanceGallery,
    /// number of consecutive frames without a matched detection
    time_since_update: u32,
    /// number of consecutive frames with a matched detection
    hit_streak: u32,
    /// number of frames with a matched detection
    hits: u32,
    /// number of predict steps since creation
    age: u32,
}

impl Track {
    /// Start a tentative track from an unmatched observation
    pub(crate) fn new(id: u32, observation: Observation, config: &TrackerConfig) -> Self {
        let mut gallery = AppearanceGallery::new(config.gallery_capacity);
        gallery.push(observation.embedding);

        Self {
            id,
            class_id: observation.class_id,
            state: TrackState::Tentative,
            kf: KalmanFilter::initiate(&observation.bbox, &config.motion),
            gallery,
            time_since_update: 0,
            hit_streak: 1,
            hits: 1,
            age: 0,
        }
    }

    pub(crate) fn predict(&mut self) {
        self.kf.predict();
        self.age += 1;
    }

    /// Apply a matched observation.
    ///
    /// A filter that cannot absorb the measurement sends the track straight
    /// to `Deleted`.
    pub(crate) fn mark_hit(&mut self, observation: Observation, n_init: u32) {
        if let Err(e) = self.kf.update(&observation.bbox) {
            log::warn!("Track {} dropped: {}", self.id, e);
            self.state = TrackState::Deleted;
            return;
        }

        self.time_since_update = 0;
        self.hit_streak += 1;
        self.hits += 1;
        self.gallery.push(observation.embedding);

        if self.state == TrackState::Tentative && self.hit_streak >= n_init {
            self.state = TrackState::Confirmed;
        }
    }

    /// Record a frame without a matched observation
    pub(crate) fn mark_missed(&mut self, max_age: u32) {
        self.time_since_update += 1;
        self.hit_streak = 0;

        match self.state {
            TrackState::Tentative => self.state = TrackState::Deleted,
            TrackState::Confirmed if self.time_since_update > max_age => {
                self.state = TrackState::Deleted
            }
            _ => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn motion_mut(&mut self) -> &mut KalmanFilter {
        &mut self.kf
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_tentative(&self) -> bool {
        self.state == TrackState::Tentative
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }

    /// Current box estimate from the motion filter
    pub fn bbox(&self) -> Bbox {
        self.kf.bbox()
    }

    pub fn motion(&self) -> &KalmanFilter {
        &self.kf
    }

    pub fn gallery(&self) -> &AppearanceGallery {
        &self.gallery
    }

    pub fn time_since_update(&self) -> u32 {
        self.time_since_update
    }

    pub fn hit_streak(&self) -> u32 {
        self.hit_streak
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn to_output(&self) -> TrackOutput {
        TrackOutput {
            track_id: self.id,
            class_id: self.class_id,
            bbox: self.bbox(),
        }
    }
}
