/// Hungarian algorithm implementation for optimal assignment
///
/// Solves rectangular minimum-cost assignment problems between tracks (rows)
/// and detections (columns) with the Kuhn-Munkres solver from `pathfinding`.
use ndarray::ArrayView2;
use pathfinding::prelude::{kuhn_munkres_min, Matrix};
use rayon::prelude::*;

/// Costs are quantised to this many steps per unit before solving
const COST_SCALE: f64 = 1_000_000.0;

/// Upper bound on quantised units, so huge thresholds cannot overflow
const MAX_UNITS: f64 = 1e12;

/// Result of Hungarian assignment algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentResult {
    /// Assignments as (row_idx, col_idx) pairs, sorted by row
    pub assignments: Vec<(usize, usize)>,
    /// Indices of unassigned rows
    pub unassigned_rows: Vec<usize>,
    /// Indices of unassigned columns
    pub unassigned_cols: Vec<usize>,
    /// Total cost of the accepted assignments
    pub total_cost: f32,
}

/// Hungarian assignment solver
pub struct HungarianSolver;

impl HungarianSolver {
    /// Solve assignment problem using Hungarian algorithm
    ///
    /// # Arguments
    /// * `cost_matrix` - Cost matrix where cost_matrix\[i\]\[j\] is the cost of assigning row i to column j.
    ///   Infinite or NaN entries are never accepted.
    /// * `threshold` - Maximum allowed cost for a valid assignment (assignments above this are rejected)
    ///
    /// # Returns
    /// AssignmentResult containing optimal assignments and unassigned indices.
    ///
    /// Among assignments of equal quantised cost, the solver prefers the one
    /// that pairs rows and columns in the same relative order, so with a tie
    /// the lower-indexed row takes the lower-indexed column.
    pub fn solve(cost_matrix: ArrayView2<f32>, threshold: f32) -> AssignmentResult {
        let num_rows = cost_matrix.nrows();
        let num_cols = cost_matrix.ncols();

        if num_rows == 0 || num_cols == 0 {
            return AssignmentResult {
                assignments: Vec::new(),
                unassigned_rows: (0..num_rows).collect(),
                unassigned_cols: (0..num_cols).collect(),
                total_cost: 0.0,
            };
        }

        // Ensure matrix is square by padding with dummy entries
        let size = num_rows.max(num_cols);
        let size_i = size as i64;

        // Everything above the threshold is equally unacceptable to the solver
        let to_units = |cost: f32| -> i64 {
            (f64::from(cost) * COST_SCALE)
                .round()
                .clamp(-MAX_UNITS, MAX_UNITS) as i64
        };
        let reject_units = to_units(threshold) + 1;
        let quantise = |cost: f32| -> i64 {
            if !cost.is_finite() || cost > threshold {
                reject_units
            } else {
                to_units(cost).min(reject_units)
            }
        };

        // One quantised cost step outweighs any difference in the ordering
        // term. When the padded total could overflow, ties are left to the
        // solver.
        let tie_span = size_i
            .checked_pow(3)
            .and_then(|cube| cube.checked_add(1))
            .filter(|&span| {
                (reject_units + 1)
                    .checked_mul(span)
                    .and_then(|row_max| row_max.checked_mul(size_i))
                    .is_some()
            });
        let ordering = tie_span.is_some();
        let tie_span = tie_span.unwrap_or(1);

        let mut int_cost_matrix = Matrix::new(size, size, 0i64);

        // Parallel quantisation of the padded cost rows
        let rows: Vec<Vec<i64>> = (0..size)
            .into_par_iter()
            .map(|i| {
                (0..size)
                    .map(|j| {
                        let units = if i < num_rows && j < num_cols {
                            quantise(cost_matrix[[i, j]])
                        } else {
                            reject_units
                        };
                        if ordering {
                            units * tie_span - (i as i64) * (j as i64)
                        } else {
                            units
                        }
                    })
                    .collect()
            })
            .collect();

        for (i, row) in rows.into_iter().enumerate() {
            for (j, value) in row.into_iter().enumerate() {
                int_cost_matrix[(i, j)] = value;
            }
        }

        let (_, raw_assignments) = kuhn_munkres_min(&int_cost_matrix);

        // Drop padding and anything over the threshold
        let assignments: Vec<(usize, usize)> = raw_assignments
            .iter()
            .enumerate()
            .filter(|&(row, &col)| {
                row < num_rows
                    && col < num_cols
                    && cost_matrix[[row, col]].is_finite()
                    && cost_matrix[[row, col]] <= threshold
            })
            .map(|(row, &col)| (row, col))
            .collect();

        let mut assigned_rows = vec![false; num_rows];
        let mut assigned_cols = vec![false; num_cols];
        for &(row, col) in &assignments {
            assigned_rows[row] = true;
            assigned_cols[col] = true;
        }

        let total_cost = assignments
            .iter()
            .map(|&(row, col)| cost_matrix[[row, col]])
            .sum();

        AssignmentResult {
            assignments,
            unassigned_rows: (0..num_rows).filter(|&i| !assigned_rows[i]).collect(),
            unassigned_cols: (0..num_cols).filter(|&j| !assigned_cols[j]).collect(),
            total_cost,
        }
    }

    /// Solve assignment problem with IoU cost matrix
    ///
    /// # Arguments
    /// * `iou_matrix` - IoU matrix where iou_matrix\[i\]\[j\] is the IoU between row i and column j
    /// * `iou_threshold` - Minimum IoU for a valid assignment
    ///
    /// # Returns
    /// AssignmentResult containing optimal assignments based on IoU
    pub fn solve_iou(iou_matrix: ArrayView2<f32>, iou_threshold: f32) -> AssignmentResult {
        // Convert IoU to cost (higher IoU = lower cost)
        let cost_matrix = iou_matrix.mapv(|iou| 1.0 - iou);
        let cost_threshold = 1.0 - iou_threshold;

        Self::solve(cost_matrix.view(), cost_threshold)
    }
}
