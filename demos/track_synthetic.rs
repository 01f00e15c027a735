//! Track a few synthetic objects through a short scene.
//!
//! Objects move at constant velocity with a little jitter, one of them is
//! occluded for a stretch of frames, and a late arrival shows up halfway
//! through. The feature extractor returns a noisy copy of each object's
//! appearance vector.

use deeptrack::{
    observe, Bbox, ClassId, Detector, FeatureExtractor, RawDetection, TrackerConfig, TrackerCore,
};
use rand::prelude::*;

const EMBEDDING_DIM: usize = 16;
const N_FRAMES: u32 = 40;

struct SceneObject {
    class_id: ClassId,
    start: (f32, f32),
    velocity: (f32, f32),
    size: (f32, f32),
    appearance: Vec<f32>,
    /// Frames in which the object is visible
    visible: std::ops::Range<u32>,
    occluded: std::ops::Range<u32>,
}

impl SceneObject {
    fn bbox_at(&self, frame: u32, rng: &mut impl Rng) -> Bbox {
        let t = frame as f32;
        Bbox::new(
            self.start.0 + self.velocity.0 * t + rng.gen_range(-1.0f32..1.0),
            self.start.1 + self.velocity.1 * t + rng.gen_range(-1.0f32..1.0),
            self.size.0,
            self.size.1,
        )
    }

    fn is_visible(&self, frame: u32) -> bool {
        self.visible.contains(&frame) && !self.occluded.contains(&frame)
    }
}

/// What the "camera" sees: each visible box with its class and true appearance
struct SceneFrame {
    index: u32,
    visible: Vec<(Bbox, ClassId, Vec<f32>)>,
}

struct SyntheticDetector;

impl Detector for SyntheticDetector {
    type Frame = SceneFrame;

    fn detect(&mut self, frame: &SceneFrame) -> deeptrack::Result<Vec<RawDetection>> {
        Ok(frame
            .visible
            .iter()
            .map(|(bbox, class_id, _)| RawDetection::new(*bbox, 0.9, *class_id))
            .collect())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct NoisyExtractor {
    rng: StdRng,
}

impl FeatureExtractor for NoisyExtractor {
    type Frame = SceneFrame;

    fn extract(&mut self, frame: &SceneFrame, boxes: &[Bbox]) -> deeptrack::Result<Vec<Vec<f32>>> {
        Ok(boxes
            .iter()
            .map(|bbox| {
                let appearance = frame
                    .visible
                    .iter()
                    .find(|(b, _, _)| b == bbox)
                    .map(|(_, _, appearance)| appearance.as_slice())
                    .unwrap_or(&[0.0; EMBEDDING_DIM]);
                appearance
                    .iter()
                    .map(|&v| v + self.rng.gen_range(-0.05f32..0.05))
                    .collect()
            })
            .collect())
    }

    fn embedding_dim(&self) -> usize {
        EMBEDDING_DIM
    }
}

fn random_appearance(rng: &mut impl Rng) -> Vec<f32> {
    (0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(7);
    let objects = vec![
        SceneObject {
            class_id: ClassId(0),
            start: (20.0, 40.0),
            velocity: (4.0, 1.0),
            size: (40.0, 90.0),
            appearance: random_appearance(&mut rng),
            visible: 0..N_FRAMES,
            occluded: 12..18,
        },
        SceneObject {
            class_id: ClassId(2),
            start: (400.0, 200.0),
            velocity: (-6.0, 0.0),
            size: (120.0, 60.0),
            appearance: random_appearance(&mut rng),
            visible: 0..N_FRAMES,
            occluded: 0..0,
        },
        SceneObject {
            class_id: ClassId(0),
            start: (100.0, 300.0),
            velocity: (2.0, -2.0),
            size: (35.0, 85.0),
            appearance: random_appearance(&mut rng),
            visible: 20..N_FRAMES,
            occluded: 0..0,
        },
    ];

    let mut tracker = TrackerCore::new(TrackerConfig::default())?;
    let mut detector = SyntheticDetector;
    let mut extractor = NoisyExtractor {
        rng: StdRng::seed_from_u64(11),
    };

    for index in 0..N_FRAMES {
        let visible = objects
            .iter()
            .filter(|obj| obj.is_visible(index))
            .map(|obj| (obj.bbox_at(index, &mut rng), obj.class_id, obj.appearance.clone()))
            .collect();
        let frame = SceneFrame { index, visible };

        let observations = observe(&mut detector, &mut extractor, &frame, 0.5)?;
        tracker.predict();
        let summary = tracker.update(observations)?;

        println!(
            "Frame {:2}: matched {}, failed {}, missed {}, created {}, deleted {}",
            frame.index,
            summary.matched,
            summary.failed,
            summary.missed,
            summary.created,
            summary.deleted
        );
        for output in tracker.confirmed_tracks() {
            println!("  {} at {}", output.label(), output.bbox);
        }
    }

    println!(
        "\n{} tracks alive after {} frames",
        tracker.len(),
        tracker.frame_count()
    );
    Ok(())
}
