//! Ownership of the active track set and its state transitions

use crate::association::Association;
use crate::config::TrackerConfig;
use crate::track::Track;
use crate::types::Observation;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// What one update did to the track set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub matched: usize,
    /// Matched, but the motion filter rejected the measurement and the track was dropped
    pub failed: usize,
    pub missed: usize,
    pub created: usize,
    pub deleted: usize,
}

/// Sole owner of the tracks: creates, updates, ages and removes them
#[derive(Debug, Clone)]
pub struct TrackLifecycleManager {
    config: TrackerConfig,
    next_track_id: u32,
    tracks: BTreeMap<u32, Track>,
}

impl TrackLifecycleManager {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_track_id: 1,
            tracks: BTreeMap::new(),
        }
    }

    /// Parallel motion prediction; tracks share no state
    pub fn predict_all(&mut self) {
        self.tracks
            .par_iter_mut()
            .for_each(|(_, track)| track.predict());
    }

    /// Apply an association result to the track set.
    ///
    /// `observations` must be the slice the association was computed from.
    pub fn apply(&mut self, association: &Association, observations: Vec<Observation>) -> FrameSummary {
        let mut observations: Vec<Option<Observation>> = observations.into_iter().map(Some).collect();
        let mut summary = FrameSummary::default();

        for m in &association.matches {
            let (Some(track), Some(obs)) = (
                self.tracks.get_mut(&m.track_id),
                observations.get_mut(m.detection).and_then(Option::take),
            ) else {
                continue;
            };
            track.mark_hit(obs, self.config.n_init);
            if track.is_deleted() {
                summary.failed += 1;
            } else {
                summary.matched += 1;
            }
        }

        for track_id in &association.unmatched_tracks {
            if let Some(track) = self.tracks.get_mut(track_id) {
                track.mark_missed(self.config.max_age);
                summary.missed += 1;
            }
        }

        for det_idx in &association.unmatched_detections {
            if let Some(obs) = observations.get_mut(*det_idx).and_then(Option::take) {
                let id = self.spawn(obs);
                log::debug!("  New tentative track {} from detection {}", id, det_idx);
                summary.created += 1;
            }
        }

        summary.deleted = self.prune();
        summary
    }

    fn spawn(&mut self, observation: Observation) -> u32 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        self.tracks.insert(id, Track::new(id, observation, &self.config));
        id
    }

    /// Remove deleted tracks, returning how many went
    fn prune(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|_, track| !track.is_deleted());
        before - self.tracks.len()
    }

    /// Drop every track; ids keep counting from where they were
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn get(&self, track_id: u32) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Id the next spawned track will receive
    pub fn next_track_id(&self) -> u32 {
        self.next_track_id
    }
}
