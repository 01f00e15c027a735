//! Cascaded detection-to-track association
//!
//! Matching runs in two stages:
//! 1. An appearance cascade. Confirmed tracks are visited in tiers of equal
//!    `time_since_update` (most recently updated first), then tentative tracks
//!    as a final tier. Each tier is matched against the detections still free,
//!    on nearest-neighbour cosine distance, with spatially implausible pairs
//!    (Mahalanobis gate) made infinitely expensive.
//! 2. An IoU fallback between every track and detection left over.
//!
//! Both stages solve their cost matrix with [`HungarianSolver`] and reject
//! matches over the stage's threshold.

use crate::bbox::{ious, Bbox};
use crate::config::TrackerConfig;
use crate::hungarian::HungarianSolver;
use crate::track::Track;
use crate::types::Observation;
use ndarray::Array2;
use rayon::prelude::*;

/// Which stage produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    Appearance,
    Iou,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub track_id: u32,
    pub detection: usize,
    pub stage: MatchStage,
    /// Cosine distance for appearance matches, 1 - IoU for IoU matches
    pub cost: f32,
}

/// Outcome of associating one frame's detections with the active tracks.
///
/// Every input track id appears exactly once across `matches` and
/// `unmatched_tracks`, and every detection index exactly once across
/// `matches` and `unmatched_detections`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// Sorted by track id
    pub matches: Vec<Match>,
    /// Sorted ascending
    pub unmatched_tracks: Vec<u32>,
    /// Sorted ascending
    pub unmatched_detections: Vec<usize>,
}

/// Thresholds for the two association stages
#[derive(Debug, Clone)]
pub struct AssociationEngine {
    pub max_cosine_distance: f32,
    pub min_iou: f32,
    pub gating_threshold: f32,
    pub gate_by_class: bool,
}

impl AssociationEngine {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            max_cosine_distance: config.max_cosine_distance,
            min_iou: config.min_iou,
            gating_threshold: config.gating_threshold,
            gate_by_class: config.gate_by_class,
        }
    }

    pub fn associate(&self, tracks: &[&Track], observations: &[Observation]) -> Association {
        if tracks.is_empty() || observations.is_empty() {
            let mut unmatched_tracks: Vec<u32> = tracks.iter().map(|t| t.id()).collect();
            unmatched_tracks.sort_unstable();
            return Association {
                matches: Vec::new(),
                unmatched_tracks,
                unmatched_detections: (0..observations.len()).collect(),
            };
        }

        let det_boxes: Vec<Bbox> = observations.iter().map(|obs| obs.bbox).collect();
        let mut matches = Vec::new();
        let mut free_dets: Vec<usize> = (0..observations.len()).collect();
        let mut leftover_tracks: Vec<&Track> = Vec::new();

        // Stage 1: appearance cascade
        for tier in Self::cascade_tiers(tracks) {
            if free_dets.is_empty() {
                leftover_tracks.extend(tier);
                continue;
            }

            let cost = self.appearance_cost(&tier, observations, &det_boxes, &free_dets);
            let result = HungarianSolver::solve(cost.view(), self.max_cosine_distance);

            log::debug!(
                "  Appearance tier (time_since_update={}, tentative={}): {} tracks x {} detections, {} matches",
                tier[0].time_since_update(),
                tier[0].is_tentative(),
                tier.len(),
                free_dets.len(),
                result.assignments.len()
            );

            for &(row, col) in &result.assignments {
                matches.push(Match {
                    track_id: tier[row].id(),
                    detection: free_dets[col],
                    stage: MatchStage::Appearance,
                    cost: cost[[row, col]],
                });
            }
            leftover_tracks.extend(result.unassigned_rows.iter().map(|&row| tier[row]));
            free_dets = result
                .unassigned_cols
                .iter()
                .map(|&col| free_dets[col])
                .collect();
        }

        // Stage 2: IoU fallback on whatever is left
        let mut unmatched_tracks: Vec<u32> = Vec::new();
        if !leftover_tracks.is_empty() && !free_dets.is_empty() {
            let cost = self.iou_cost(&leftover_tracks, observations, &det_boxes, &free_dets);
            let result = HungarianSolver::solve(cost.view(), 1.0 - self.min_iou);

            log::debug!(
                "  IoU fallback: {} tracks x {} detections, {} matches",
                leftover_tracks.len(),
                free_dets.len(),
                result.assignments.len()
            );

            for &(row, col) in &result.assignments {
                matches.push(Match {
                    track_id: leftover_tracks[row].id(),
                    detection: free_dets[col],
                    stage: MatchStage::Iou,
                    cost: cost[[row, col]],
                });
            }
            unmatched_tracks.extend(
                result
                    .unassigned_rows
                    .iter()
                    .map(|&row| leftover_tracks[row].id()),
            );
            free_dets = result
                .unassigned_cols
                .iter()
                .map(|&col| free_dets[col])
                .collect();
        } else {
            unmatched_tracks.extend(leftover_tracks.iter().map(|t| t.id()));
        }

        matches.sort_by_key(|m| m.track_id);
        unmatched_tracks.sort_unstable();
        free_dets.sort_unstable();

        Association {
            matches,
            unmatched_tracks,
            unmatched_detections: free_dets,
        }
    }

    /// Confirmed tracks grouped by `time_since_update` ascending, then all
    /// tentative tracks. Each tier is ordered by id.
    fn cascade_tiers<'a>(tracks: &[&'a Track]) -> Vec<Vec<&'a Track>> {
        let mut confirmed: Vec<&Track> = tracks.iter().copied().filter(|t| t.is_confirmed()).collect();
        confirmed.sort_by_key(|t| (t.time_since_update(), t.id()));

        let mut tiers: Vec<Vec<&Track>> = Vec::new();
        for track in confirmed {
            match tiers.last_mut() {
                Some(tier) if tier[0].time_since_update() == track.time_since_update() => {
                    tier.push(track)
                }
                _ => tiers.push(vec![track]),
            }
        }

        let mut tentative: Vec<&Track> = tracks.iter().copied().filter(|t| t.is_tentative()).collect();
        if !tentative.is_empty() {
            tentative.sort_by_key(|t| t.id());
            tiers.push(tentative);
        }
        tiers
    }

    /// Gated nearest-neighbour cosine distances, (tier tracks x free detections)
    fn appearance_cost(
        &self,
        tier: &[&Track],
        observations: &[Observation],
        det_boxes: &[Bbox],
        free_dets: &[usize],
    ) -> Array2<f32> {
        let free_boxes: Vec<Bbox> = free_dets.iter().map(|&d| det_boxes[d]).collect();

        let rows: Vec<f32> = tier
            .par_iter()
            .flat_map_iter(|track| {
                let gate = track.motion().gating_distance(&free_boxes);
                free_dets
                    .iter()
                    .zip(gate)
                    .map(|(&d, mahalanobis)| {
                        let obs = &observations[d];
                        if mahalanobis > self.gating_threshold || self.class_gated(track, obs) {
                            f32::INFINITY
                        } else {
                            track.gallery().nearest_distance(&obs.embedding)
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Array2::from_shape_vec((tier.len(), free_dets.len()), rows)
            .unwrap_or_else(|_| Array2::from_elem((tier.len(), free_dets.len()), f32::INFINITY))
    }

    /// 1 - IoU between predicted and detected boxes, (tracks x free detections)
    fn iou_cost(
        &self,
        tracks: &[&Track],
        observations: &[Observation],
        det_boxes: &[Bbox],
        free_dets: &[usize],
    ) -> Array2<f32> {
        let track_boxes: Vec<Bbox> = tracks.iter().map(|t| t.bbox()).collect();
        let free_boxes: Vec<Bbox> = free_dets.iter().map(|&d| det_boxes[d]).collect();

        let mut cost = ious(&track_boxes, &free_boxes).mapv(|iou| 1.0 - iou);
        if self.gate_by_class {
            for ((row, col), value) in cost.indexed_iter_mut() {
                if self.class_gated(tracks[row], &observations[free_dets[col]]) {
                    *value = f32::INFINITY;
                }
            }
        }
        cost
    }

    fn class_gated(&self, track: &Track, obs: &Observation) -> bool {
        self.gate_by_class && track.class_id() != obs.class_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;
    use approx::assert_abs_diff_eq;

    fn config() -> TrackerConfig {
        TrackerConfig {
            n_init: 1,
            ..Default::default()
        }
    }

    fn obs(x: f32, y: f32, embedding: Vec<f32>) -> Observation {
        Observation::new(Bbox::new(x, y, 50.0, 50.0), 0.9, ClassId(0), embedding)
    }

    /// Unit vector at `angle` radians; cosine distance between two is 1 - cos(delta)
    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    /// A track created at (x, y) and predicted one step
    fn predicted_track(id: u32, x: f32, y: f32, embedding: Vec<f32>) -> Track {
        let mut track = Track::new(id, obs(x, y, embedding), &config());
        track.predict();
        track
    }

    /// A confirmed track with `misses` consecutive misses
    fn confirmed_track(id: u32, x: f32, y: f32, embedding: Vec<f32>, misses: u32) -> Track {
        let config = config();
        let mut track = Track::new(id, obs(x, y, embedding.clone()), &config);
        track.predict();
        track.mark_hit(obs(x, y, embedding), config.n_init);
        for _ in 0..misses {
            track.predict();
            track.mark_missed(config.max_age);
        }
        track.predict();
        track
    }

    fn engine() -> AssociationEngine {
        AssociationEngine::from_config(&config())
    }

    fn assert_conserved(assoc: &Association, track_ids: &[u32], n_dets: usize) {
        let mut seen_tracks: Vec<u32> = assoc.matches.iter().map(|m| m.track_id).collect();
        seen_tracks.extend(&assoc.unmatched_tracks);
        seen_tracks.sort_unstable();
        let mut expected = track_ids.to_vec();
        expected.sort_unstable();
        assert_eq!(seen_tracks, expected);

        let mut seen_dets: Vec<usize> = assoc.matches.iter().map(|m| m.detection).collect();
        seen_dets.extend(&assoc.unmatched_detections);
        seen_dets.sort_unstable();
        assert_eq!(seen_dets, (0..n_dets).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_tracks_leaves_all_detections_unmatched() {
        let dets = vec![obs(0.0, 0.0, unit(0.0)), obs(100.0, 0.0, unit(1.0))];
        let assoc = engine().associate(&[], &dets);
        assert!(assoc.matches.is_empty());
        assert_eq!(assoc.unmatched_detections, vec![0, 1]);
    }

    #[test]
    fn test_no_detections_leaves_all_tracks_unmatched() {
        let t1 = predicted_track(3, 0.0, 0.0, unit(0.0));
        let t2 = predicted_track(1, 100.0, 0.0, unit(0.0));
        let assoc = engine().associate(&[&t1, &t2], &[]);
        assert!(assoc.matches.is_empty());
        assert_eq!(assoc.unmatched_tracks, vec![1, 3]);
    }

    #[test]
    fn test_close_similar_detection_matches_on_appearance() {
        let track = predicted_track(1, 100.0, 100.0, unit(0.0));
        // cos distance 1 - cos(0.451) ~= 0.1
        let dets = vec![obs(102.0, 101.0, unit(0.451))];
        let assoc = engine().associate(&[&track], &dets);

        assert_eq!(assoc.matches.len(), 1);
        let m = &assoc.matches[0];
        assert_eq!((m.track_id, m.detection), (1, 0));
        assert_eq!(m.stage, MatchStage::Appearance);
        assert_abs_diff_eq!(m.cost, 0.1, epsilon = 0.01);
    }

    #[test]
    fn test_appearance_over_threshold_falls_back_to_iou() {
        let track = predicted_track(1, 100.0, 100.0, unit(0.0));
        // Orthogonal appearance, same place
        let dets = vec![obs(101.0, 100.0, unit(std::f32::consts::FRAC_PI_2))];
        let assoc = engine().associate(&[&track], &dets);

        assert_eq!(assoc.matches.len(), 1);
        assert_eq!(assoc.matches[0].stage, MatchStage::Iou);
    }

    #[test]
    fn test_gate_blocks_distant_lookalike() {
        let track = confirmed_track(1, 0.0, 0.0, unit(0.0), 0);
        // Identical appearance but far outside the gate and without overlap
        let dets = vec![obs(1000.0, 1000.0, unit(0.0))];
        let assoc = engine().associate(&[&track], &dets);

        assert!(assoc.matches.is_empty());
        assert_eq!(assoc.unmatched_tracks, vec![1]);
        assert_eq!(assoc.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_recently_updated_track_wins_contested_detection() {
        // Both confirmed at the same place with the same appearance; track 1
        // has been missing for two frames, track 2 was just updated
        let stale = confirmed_track(1, 100.0, 100.0, unit(0.0), 2);
        let fresh = confirmed_track(2, 100.0, 100.0, unit(0.0), 0);
        let dets = vec![obs(100.0, 100.0, unit(0.0))];

        let assoc = engine().associate(&[&stale, &fresh], &dets);
        assert_eq!(assoc.matches.len(), 1);
        assert_eq!(assoc.matches[0].track_id, 2);
        assert_eq!(assoc.unmatched_tracks, vec![1]);
    }

    #[test]
    fn test_confirmed_tier_before_tentative() {
        let tentative = predicted_track(1, 100.0, 100.0, unit(0.0));
        let confirmed = confirmed_track(2, 100.0, 100.0, unit(0.05), 0);
        // Appearance is slightly closer to the tentative track
        let dets = vec![obs(100.0, 100.0, unit(0.0))];

        let assoc = engine().associate(&[&tentative, &confirmed], &dets);
        assert_eq!(assoc.matches[0].track_id, 2);
        assert_eq!(assoc.unmatched_tracks, vec![1]);
    }

    #[test]
    fn test_class_gating() {
        let engine = AssociationEngine {
            gate_by_class: true,
            ..engine()
        };
        let track = predicted_track(1, 100.0, 100.0, unit(0.0));
        let mut det = obs(100.0, 100.0, unit(0.0));
        det.class_id = ClassId(2);

        let assoc = engine.associate(&[&track], &[det]);
        assert!(assoc.matches.is_empty());
    }

    #[test]
    fn test_conservation_and_determinism() {
        let tracks: Vec<Track> = (0..6)
            .map(|i| {
                let x = i as f32 * 40.0;
                if i % 2 == 0 {
                    confirmed_track(i + 1, x, 0.0, unit(i as f32 * 0.3), i % 3)
                } else {
                    predicted_track(i + 1, x, 0.0, unit(i as f32 * 0.3))
                }
            })
            .collect();
        let refs: Vec<&Track> = tracks.iter().collect();
        let dets: Vec<Observation> = (0..8)
            .map(|j| obs(j as f32 * 35.0, 3.0, unit(j as f32 * 0.25)))
            .collect();

        let first = engine().associate(&refs, &dets);
        let ids: Vec<u32> = tracks.iter().map(|t| t.id()).collect();
        assert_conserved(&first, &ids, dets.len());

        for _ in 0..5 {
            assert_eq!(engine().associate(&refs, &dets), first);
        }
    }

    #[test]
    fn test_equal_cost_tie_goes_to_first_detection() {
        let track = predicted_track(1, 100.0, 100.0, unit(0.0));
        let dets = vec![obs(100.0, 100.0, unit(0.2)), obs(100.0, 100.0, unit(0.2))];
        let assoc = engine().associate(&[&track], &dets);
        assert_eq!(assoc.matches.len(), 1);
        assert_eq!(assoc.matches[0].detection, 0);
        assert_eq!(assoc.unmatched_detections, vec![1]);
    }
}
