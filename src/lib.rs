//! Appearance-aware multi-object tracking library
//!
//! Each frame, a detector supplies boxes with class and confidence and a
//! feature extractor supplies one embedding per box. The tracker keeps a set
//! of tracks with a constant-velocity Kalman filter and a bounded gallery of
//! past embeddings each, and matches new detections to them in two stages:
//! a matching cascade on gated cosine distance (most recently seen tracks
//! first), then IoU on whatever is left.
//!
//! ```rust,ignore
//! use deeptrack::{Observation, TrackerConfig, TrackerCore};
//!
//! let mut tracker = TrackerCore::new(TrackerConfig::default())?;
//!
//! for frame in frames {
//!     let observations: Vec<Observation> = observe(&mut detector, &mut extractor, &frame, 0.5)?;
//!     tracker.predict();
//!     tracker.update(observations)?;
//!     for track in tracker.confirmed_tracks() {
//!         println!("{} at {}", track.label(), track.bbox);
//!     }
//! }
//! ```

pub mod association; // Matching cascade + IoU fallback
pub mod bbox;
pub mod config;
pub mod detector_trait;
pub mod error;
pub mod gallery;
pub mod hungarian; // Hungarian algorithm for optimal assignment
pub mod kalman;
pub mod lifecycle;
pub mod track;
pub mod tracker;
pub mod types;

pub use association::{Association, AssociationEngine, Match, MatchStage};
pub use bbox::{calculate_iou, Bbox};
pub use config::{MotionConfig, TrackerConfig};
pub use detector_trait::{observe, Detector, FeatureExtractor};
pub use error::{Result, TrackerError};
pub use gallery::{cosine_distance, AppearanceGallery};
pub use hungarian::{AssignmentResult, HungarianSolver};
pub use kalman::KalmanFilter;
pub use lifecycle::{FrameSummary, TrackLifecycleManager};
pub use track::{Track, TrackState};
pub use tracker::TrackerCore;
pub use types::{filter_by_confidence, ClassId, Observation, RawDetection, TrackOutput};
