/// Interfaces to the detection and appearance stages feeding the tracker
///
/// The tracker never looks inside these; any detector or embedding model can
/// drive it as long as it implements the traits below.
use crate::bbox::Bbox;
use crate::error::{Result, TrackerError};
use crate::types::{filter_by_confidence, Observation, RawDetection};

/// Common interface for object detectors
pub trait Detector {
    type Frame;

    /// Detect objects in a single frame
    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<RawDetection>>;

    /// Get the detector name (for logging/debugging)
    fn name(&self) -> &str;
}

/// Common interface for appearance embedding models
pub trait FeatureExtractor {
    type Frame;

    /// One embedding per box, in the same order as `boxes`
    fn extract(&mut self, frame: &Self::Frame, boxes: &[Bbox]) -> Result<Vec<Vec<f32>>>;

    /// Length of every embedding this extractor produces
    fn embedding_dim(&self) -> usize;
}

/// Run both stages on one frame and bind their outputs into observations.
///
/// Only detections with confidence strictly above `min_confidence` are kept.
pub fn observe<F, D, E>(
    detector: &mut D,
    extractor: &mut E,
    frame: &F,
    min_confidence: f32,
) -> Result<Vec<Observation>>
where
    D: Detector<Frame = F>,
    E: FeatureExtractor<Frame = F>,
{
    let detections = filter_by_confidence(detector.detect(frame)?, min_confidence);
    let boxes: Vec<Bbox> = detections.iter().map(|det| det.bbox).collect();
    let embeddings = extractor.extract(frame, &boxes)?;

    log::debug!(
        "{}: {} detections above {:.2}, {} embeddings",
        detector.name(),
        detections.len(),
        min_confidence,
        embeddings.len()
    );

    if let Some((index, bad)) = embeddings
        .iter()
        .enumerate()
        .find(|(_, e)| e.len() != extractor.embedding_dim())
    {
        return Err(TrackerError::EmbeddingDimension {
            index,
            expected: extractor.embedding_dim(),
            actual: bad.len(),
        });
    }

    Observation::bind(detections, embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassId;

    struct FixedDetector(Vec<RawDetection>);

    impl Detector for FixedDetector {
        type Frame = ();

        fn detect(&mut self, _frame: &()) -> Result<Vec<RawDetection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Encodes the box position as a 2-d embedding; can be told to drop one
    struct PositionExtractor {
        drop_last: bool,
    }

    impl FeatureExtractor for PositionExtractor {
        type Frame = ();

        fn extract(&mut self, _frame: &(), boxes: &[Bbox]) -> Result<Vec<Vec<f32>>> {
            let mut out: Vec<Vec<f32>> = boxes.iter().map(|b| vec![b.x, b.y]).collect();
            if self.drop_last {
                out.pop();
            }
            Ok(out)
        }

        fn embedding_dim(&self) -> usize {
            2
        }
    }

    fn detections() -> Vec<RawDetection> {
        vec![
            RawDetection::new(Bbox::new(1.0, 2.0, 10.0, 10.0), 0.9, ClassId(0)),
            RawDetection::new(Bbox::new(3.0, 4.0, 10.0, 10.0), 0.3, ClassId(2)),
            RawDetection::new(Bbox::new(5.0, 6.0, 10.0, 10.0), 0.7, ClassId(2)),
        ]
    }

    #[test]
    fn test_observe_filters_and_aligns() {
        let mut detector = FixedDetector(detections());
        let mut extractor = PositionExtractor { drop_last: false };
        let obs = observe(&mut detector, &mut extractor, &(), 0.5).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].embedding, vec![1.0, 2.0]);
        assert_eq!(obs[1].embedding, vec![5.0, 6.0]);
        assert_eq!(obs[1].class_id, ClassId(2));
    }

    #[test]
    fn test_observe_fails_on_count_mismatch() {
        let mut detector = FixedDetector(detections());
        let mut extractor = PositionExtractor { drop_last: true };
        let err = observe(&mut detector, &mut extractor, &(), 0.5).unwrap_err();
        assert!(matches!(err, TrackerError::LengthMismatch { .. }));
    }
}
