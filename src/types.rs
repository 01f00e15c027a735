//! Type definitions shared by the tracker and its collaborators

use crate::bbox::Bbox;
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer class label carried from the detector through to the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// COCO class names (80 classes)
    const COCO_CLASSES: &'static [&'static str] = &[
        "person",
        "bicycle",
        "car",
        "motorcycle",
        "airplane",
        "bus",
        "train",
        "truck",
        "boat",
        "traffic light",
        "fire hydrant",
        "stop sign",
        "parking meter",
        "bench",
        "bird",
        "cat",
        "dog",
        "horse",
        "sheep",
        "cow",
        "elephant",
        "bear",
        "zebra",
        "giraffe",
        "backpack",
        "umbrella",
        "handbag",
        "tie",
        "suitcase",
        "frisbee",
        "skis",
        "snowboard",
        "sports ball",
        "kite",
        "baseball bat",
        "baseball glove",
        "skateboard",
        "surfboard",
        "tennis racket",
        "bottle",
        "wine glass",
        "cup",
        "fork",
        "knife",
        "spoon",
        "bowl",
        "banana",
        "apple",
        "sandwich",
        "orange",
        "broccoli",
        "carrot",
        "hot dog",
        "pizza",
        "donut",
        "cake",
        "chair",
        "couch",
        "potted plant",
        "bed",
        "dining table",
        "toilet",
        "tv",
        "laptop",
        "mouse",
        "remote",
        "keyboard",
        "cell phone",
        "microwave",
        "oven",
        "toaster",
        "sink",
        "refrigerator",
        "book",
        "clock",
        "vase",
        "scissors",
        "teddy bear",
        "hair drier",
        "toothbrush",
    ];

    /// Human-readable label, resolved only for presentation
    pub fn name(&self) -> String {
        let id = self.0 as usize;
        match Self::COCO_CLASSES.get(id) {
            Some(name) => name.to_string(),
            None => format!("class_{}", id),
        }
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Detector output for one object, before appearance features are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: Bbox,
    /// Detection confidence score (0-1)
    pub confidence: f32,
    pub class_id: ClassId,
}

impl RawDetection {
    pub fn new(bbox: Bbox, confidence: f32, class_id: ClassId) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// Keep detections whose confidence is strictly above `threshold`
pub fn filter_by_confidence(mut detections: Vec<RawDetection>, threshold: f32) -> Vec<RawDetection> {
    detections.retain(|det| det.confidence > threshold);
    detections
}

/// One frame's observation of an object: box, score, class and appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub bbox: Bbox,
    pub confidence: f32,
    pub class_id: ClassId,
    pub embedding: Vec<f32>,
}

impl Observation {
    pub fn new(bbox: Bbox, confidence: f32, class_id: ClassId, embedding: Vec<f32>) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            embedding,
        }
    }

    /// Pair index-aligned detector and feature-extractor outputs
    pub fn bind(detections: Vec<RawDetection>, embeddings: Vec<Vec<f32>>) -> Result<Vec<Self>> {
        if detections.len() != embeddings.len() {
            return Err(TrackerError::LengthMismatch {
                detections: detections.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(detections
            .into_iter()
            .zip(embeddings)
            .map(|(det, embedding)| Self::new(det.bbox, det.confidence, det.class_id, embedding))
            .collect())
    }

    /// Check the observation against the tracker's input contract
    pub fn validate(&self, index: usize, embedding_dim: Option<usize>) -> Result<()> {
        if !self.bbox.is_well_formed() {
            return Err(TrackerError::malformed_box(
                index,
                format!("{} has a negative or non-finite extent", self.bbox),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(TrackerError::ConfidenceOutOfRange {
                index,
                confidence: self.confidence,
            });
        }
        if let Some(expected) = embedding_dim {
            if self.embedding.len() != expected {
                return Err(TrackerError::EmbeddingDimension {
                    index,
                    expected,
                    actual: self.embedding.len(),
                });
            }
        }
        if !self.embedding.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::NonFiniteEmbedding { index });
        }
        Ok(())
    }
}

/// What downstream consumers see of a confirmed, recently updated track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackOutput {
    pub track_id: u32,
    pub class_id: ClassId,
    /// Box in the same top-left/width/height convention as the input
    pub bbox: Bbox,
}

impl TrackOutput {
    /// Corner format [xmin, ymin, xmax, ymax]
    pub fn to_tlbr(&self) -> [f32; 4] {
        self.bbox.to_tlbr()
    }

    /// Label text in the form used for on-screen annotation
    pub fn label(&self) -> String {
        format!("ID: {} - {}", self.track_id, self.class_id.name())
    }
}
