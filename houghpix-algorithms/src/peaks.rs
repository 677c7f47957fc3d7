//! Sliding-window local maximum detection.
//!
//! A cell is a candidate when it equals the maximum of the square window
//! centered on it and reaches the absolute threshold. Only cells whose full
//! window fits inside the grid are considered. Candidates closer than the
//! minimum distance are then merged, keeping the higher one (the earlier one
//! on ties).
#![allow(clippy::cast_precision_loss)]

use houghpix_core::{BinEdges, Peak, PeakDetectionConfig};
use ndarray::ArrayView2;
use rayon::prelude::*;

/// Local maximum finder over a 2D accumulator.
#[derive(Debug, Clone, Copy)]
pub struct PeakFinder {
    threshold_abs: f64,
    min_distance: usize,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self::from_config(&PeakDetectionConfig::default())
    }
}

impl PeakFinder {
    /// Creates a finder.
    #[must_use]
    pub fn new(threshold_abs: f64, min_distance: usize) -> Self {
        Self {
            threshold_abs,
            min_distance,
        }
    }

    /// Creates a finder from the detection settings.
    #[must_use]
    pub fn from_config(config: &PeakDetectionConfig) -> Self {
        Self::new(config.threshold_abs, config.min_distance)
    }

    /// Half-width of the comparison window.
    ///
    /// The window side is `2 * min_distance` bumped to the next odd number.
    #[must_use]
    pub fn half_window(&self) -> usize {
        let mut window = 2 * self.min_distance;
        if window % 2 == 0 {
            window += 1;
        }
        window / 2
    }

    /// Peak bin indices `(row, col)` in row-major order.
    #[must_use]
    pub fn find_coords(&self, grid: ArrayView2<'_, f64>) -> Vec<(usize, usize)> {
        let candidates = self.candidates(grid);
        self.merge(grid, candidates)
    }

    /// Peaks in physical coordinates, in row-major order.
    ///
    /// `x` is the column (curvature) bin center and `y` the row (angular) bin
    /// center taken from `edges`.
    #[must_use]
    pub fn find_peaks(&self, grid: ArrayView2<'_, f64>, edges: &BinEdges) -> Vec<Peak> {
        let row_centers = edges.row_centers();
        let col_centers = edges.col_centers();
        self.find_coords(grid)
            .into_iter()
            .map(|(r, c)| Peak::new(col_centers[c], row_centers[r], grid[[r, c]]))
            .collect()
    }

    fn candidates(&self, grid: ArrayView2<'_, f64>) -> Vec<(usize, usize)> {
        let half = self.half_window();
        let (rows, cols) = grid.dim();
        if rows < 2 * half + 1 || cols < 2 * half + 1 {
            return Vec::new();
        }

        (half..rows - half)
            .into_par_iter()
            .flat_map_iter(|r| {
                (half..cols - half)
                    .filter(move |&c| self.is_window_max(grid, r, c, half))
                    .map(move |c| (r, c))
            })
            .collect()
    }

    fn is_window_max(&self, grid: ArrayView2<'_, f64>, r: usize, c: usize, half: usize) -> bool {
        let center = grid[[r, c]];
        if center < self.threshold_abs {
            return false;
        }
        for rr in r - half..=r + half {
            for cc in c - half..=c + half {
                if grid[[rr, cc]] > center {
                    return false;
                }
            }
        }
        true
    }

    fn merge(&self, grid: ArrayView2<'_, f64>, candidates: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
        let n = candidates.len();
        if n < 2 {
            return candidates;
        }
        let md = self.min_distance as f64;
        let values: Vec<f64> = candidates.iter().map(|&(r, c)| grid[[r, c]]).collect();
        let mut keep = vec![true; n];

        for i in 0..n {
            let (ri, ci) = candidates[i];
            for j in i + 1..n {
                let (rj, cj) = candidates[j];
                // Candidates are row-sorted, so later rows are only farther away.
                if rj - ri > self.min_distance {
                    break;
                }
                if !(keep[i] && keep[j]) {
                    continue;
                }
                let d = (rj as f64 - ri as f64).hypot(cj as f64 - ci as f64);
                if d > 0.0 && d <= md {
                    if values[i] >= values[j] {
                        keep[j] = false;
                    } else {
                        keep[i] = false;
                    }
                }
            }
        }

        candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(coord, kept)| kept.then_some(coord))
            .collect()
    }
}
