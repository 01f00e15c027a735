//! Bounding box operations and IoU calculations

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in pixel units, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bbox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create from corner format [xmin, ymin, xmax, ymax]
    pub fn from_tlbr(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self::new(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    /// Convert to [x, y, width, height]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }

    /// Convert to corner format [xmin, ymin, xmax, ymax]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.xmax(), self.ymax()]
    }

    /// Convert to measurement format [center_x, center_y, aspect_ratio, height]
    /// Used for Kalman filter state representation
    pub fn to_xyah(&self) -> [f32; 4] {
        let aspect_ratio = if self.height != 0.0 {
            self.width / self.height
        } else {
            1.0
        };
        [self.center_x(), self.center_y(), aspect_ratio, self.height]
    }

    /// Create from measurement format [center_x, center_y, aspect_ratio, height]
    pub fn from_xyah(z: &[f32; 4]) -> Self {
        let width = z[2] * z[3];
        let height = z[3];
        Self {
            x: z[0] - width / 2.0,
            y: z[1] - height / 2.0,
            width,
            height,
        }
    }

    /// True when every coordinate is finite and the extent is non-negative
    pub fn is_well_formed(&self) -> bool {
        self.to_tlwh().iter().all(|v| v.is_finite()) && self.width >= 0.0 && self.height >= 0.0
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bbox({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Calculate IoU between two bounding boxes
pub fn calculate_iou(bbox1: &Bbox, bbox2: &Bbox) -> f32 {
    let x1 = bbox1.x.max(bbox2.x);
    let y1 = bbox1.y.max(bbox2.y);
    let x2 = bbox1.xmax().min(bbox2.xmax());
    let y2 = bbox1.ymax().min(bbox2.ymax());

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let union = bbox1.area() + bbox2.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Compute IoU matrix between tracks and detections with parallel processing
/// Returns: (n_tracks, n_detections) IoU matrix
pub fn ious(tracks: &[Bbox], detections: &[Bbox]) -> Array2<f32> {
    let n_tracks = tracks.len();
    let n_dets = detections.len();

    if n_tracks == 0 || n_dets == 0 {
        return Array2::zeros((n_tracks, n_dets));
    }

    // Parallel computation of IoU rows, one per track
    let iou_data: Vec<f32> = tracks
        .par_iter()
        .flat_map_iter(|track_box| {
            detections
                .iter()
                .map(move |det_box| calculate_iou(track_box, det_box))
        })
        .collect();

    Array2::from_shape_vec((n_tracks, n_dets), iou_data)
        .unwrap_or_else(|_| Array2::zeros((n_tracks, n_dets)))
}
