//! Peak-to-track matching and square extraction.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use houghpix_core::{
    ClassifiedSquare, HoughConfig, Peak, SquareClassification, TrackId, TrackTable,
};
use log::debug;
use ndarray::{s, ArrayView2};

/// Squares and assignment mask from one matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// Extracted squares in peak order; clipped windows are omitted.
    pub squares: Vec<ClassifiedSquare>,
    /// One entry per admitted track: 1 if claimed by a peak, else 0.
    pub mask: Vec<u8>,
}

impl MatchResult {
    /// Number of true-positive squares.
    #[must_use]
    pub fn true_positive_count(&self) -> usize {
        self.squares.iter().filter(|s| s.is_true_positive()).count()
    }

    /// Number of false-positive squares.
    #[must_use]
    pub fn false_positive_count(&self) -> usize {
        self.squares.len() - self.true_positive_count()
    }

    /// Number of claimed tracks.
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m > 0).count()
    }
}

/// Pairs peaks with admitted tracks and cuts the training squares.
///
/// Each peak claims the first unclaimed track whose `(curv_bin, phi_bin)` lies
/// within the tolerance of the peak center. A track is claimed at most once
/// per pass.
#[derive(Debug, Clone, Copy)]
pub struct PeakTrackMatcher {
    square_size: usize,
    tolerance: f64,
}

impl Default for PeakTrackMatcher {
    fn default() -> Self {
        Self::from_config(&HoughConfig::default())
    }
}

impl PeakTrackMatcher {
    /// Creates a matcher with half-width `square_size`.
    #[must_use]
    pub fn new(square_size: usize, tolerance: f64) -> Self {
        Self {
            square_size,
            tolerance,
        }
    }

    /// Creates a matcher from the Hough settings.
    #[must_use]
    pub fn from_config(config: &HoughConfig) -> Self {
        Self::new(config.square_size, config.tolerance)
    }

    /// Side length of the extracted squares.
    #[must_use]
    pub fn side(&self) -> usize {
        2 * self.square_size
    }

    /// Matches `peaks` against the `admitted` tracks of `table`.
    ///
    /// `grid` must be the sanitized accumulator the squares are copied from.
    /// The table is only read; apply the mask with [`Self::apply`].
    #[must_use]
    pub fn match_peaks(
        &self,
        grid: ArrayView2<'_, f64>,
        peaks: &[Peak],
        table: &TrackTable,
        admitted: &[TrackId],
    ) -> MatchResult {
        let mut mask = vec![0u8; admitted.len()];
        let mut squares = Vec::with_capacity(peaks.len());

        for peak in peaks {
            let Some(window) = self.window(grid, peak) else {
                debug!("discarding clipped window around ({}, {})", peak.x, peak.y);
                continue;
            };

            let claimed = admitted.iter().enumerate().position(|(idx, &id)| {
                mask[idx] == 0
                    && table.get(id).is_some_and(|track| {
                        peak.distance_to_point(track.curv_bin, track.phi_bin) <= self.tolerance
                    })
            });

            let classification = if let Some(idx) = claimed {
                mask[idx] = 1;
                SquareClassification::TruePositive
            } else {
                SquareClassification::FalsePositive
            };

            squares.push(ClassifiedSquare {
                data: window.to_owned(),
                classification,
                center_x: peak.x,
                center_y: peak.y,
            });
        }

        MatchResult { squares, mask }
    }

    /// Matches and OR-merges the claimed flags into `table`.
    ///
    /// Returns the result together with the number of newly reconstructed tracks.
    pub fn match_and_apply(
        &self,
        grid: ArrayView2<'_, f64>,
        peaks: &[Peak],
        table: &mut TrackTable,
        admitted: &[TrackId],
    ) -> (MatchResult, usize) {
        let result = self.match_peaks(grid, peaks, table, admitted);
        let newly = Self::apply(table, admitted, &result);
        (result, newly)
    }

    /// Marks the tracks claimed in `result` as reconstructed.
    pub fn apply(table: &mut TrackTable, admitted: &[TrackId], result: &MatchResult) -> usize {
        table.apply_assignment(admitted, &result.mask)
    }

    /// The `2S x 2S` window whose top-left corner is `(peak.x - S, peak.y - S)`,
    /// or `None` if the grid clips it.
    fn window<'a>(&self, grid: ArrayView2<'a, f64>, peak: &Peak) -> Option<ArrayView2<'a, f64>> {
        let size = self.square_size as f64;
        let side = self.side();
        let (rows, cols) = grid.dim();

        let row_start = (peak.y - size).trunc().max(0.0) as usize;
        let row_end = ((peak.y + size).trunc().max(0.0) as usize).min(rows);
        let col_start = (peak.x - size).trunc().max(0.0) as usize;
        let col_end = ((peak.x + size).trunc().max(0.0) as usize).min(cols);

        if row_end <= row_start || col_end <= col_start {
            return None;
        }
        if row_end - row_start != side || col_end - col_start != side {
            return None;
        }
        Some(grid.slice_move(s![row_start..row_end, col_start..col_end]))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use houghpix_core::TrueTrack;
    use ndarray::Array2;

    fn grid() -> Array2<f64> {
        Array2::from_shape_fn((100, 100), |(r, c)| (r * 100 + c) as f64)
    }

    fn table(positions: &[(f64, f64)]) -> (TrackTable, Vec<TrackId>) {
        let table: TrackTable = positions
            .iter()
            .map(|&(phi, curv)| TrueTrack::new(0, phi, curv, 0.0, 0.0))
            .collect();
        let view = table.event_tracks(0).to_vec();
        (table, view)
    }

    #[test]
    fn test_interior_square_matches_grid() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (table, view) = table(&[]);
        let result = matcher.match_peaks(grid.view(), &[Peak::new(60.0, 50.0, 1.0)], &table, &view);

        assert_eq!(result.squares.len(), 1);
        let square = &result.squares[0];
        assert_eq!(square.data.dim(), (32, 32));
        assert_eq!(square.data, grid.slice(s![34..66, 44..76]));
        assert_eq!((square.center_x, square.center_y), (60.0, 50.0));
        assert_eq!(square.classification, SquareClassification::FalsePositive);
    }

    #[test]
    fn test_clipped_windows_are_discarded() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (table, view) = table(&[(5.0, 5.0)]);
        let peaks = [
            Peak::new(5.0, 5.0, 1.0),
            Peak::new(90.0, 50.0, 1.0),
            Peak::new(50.0, 99.0, 1.0),
        ];
        let result = matcher.match_peaks(grid.view(), &peaks, &table, &view);
        assert!(result.squares.is_empty());
        assert_eq!(result.mask, vec![0]);
    }

    #[test]
    fn test_clipped_window_leaves_track_unclaimed() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (table, view) = table(&[(20.0, 14.0)]);
        let peaks = [Peak::new(10.0, 20.0, 2.0), Peak::new(17.0, 20.0, 1.0)];
        let result = matcher.match_peaks(grid.view(), &peaks, &table, &view);
        assert_eq!(result.squares.len(), 1);
        assert_eq!((result.squares[0].center_x, result.squares[0].center_y), (17.0, 20.0));
        assert_eq!(
            result.squares[0].classification,
            SquareClassification::TruePositive
        );
        assert_eq!(result.mask, vec![1]);
    }

    #[test]
    fn test_window_at_exact_border_is_kept() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (table, view) = table(&[]);
        let peaks = [Peak::new(16.0, 84.0, 1.0)];
        let result = matcher.match_peaks(grid.view(), &peaks, &table, &view);
        assert_eq!(result.squares.len(), 1);
        assert_eq!(result.squares[0].data, grid.slice(s![68..100, 0..32]));
    }

    #[test]
    fn test_first_fit_not_nearest() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        // The first track is farther from the peak but still within tolerance.
        let (table, view) = table(&[(50.0, 65.0), (50.0, 60.5)]);
        let result = matcher.match_peaks(grid.view(), &[Peak::new(60.0, 50.0, 1.0)], &table, &view);
        assert_eq!(result.mask, vec![1, 0]);
        assert_eq!(result.true_positive_count(), 1);
    }

    #[test]
    fn test_track_claimed_once_per_pass() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (table, view) = table(&[(50.0, 60.0)]);
        let peaks = [Peak::new(60.0, 50.0, 1.0), Peak::new(61.0, 50.0, 1.0)];
        let result = matcher.match_peaks(grid.view(), &peaks, &table, &view);

        assert_eq!(result.squares.len(), 2);
        assert!(result.squares[0].is_true_positive());
        assert!(!result.squares[1].is_true_positive());
        assert_eq!(result.claimed_count(), 1);
        assert!(result.claimed_count() <= result.squares.len());
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let grid = grid();
        let (table, view) = table(&[(54.0, 63.0)]);
        let peaks = [Peak::new(60.0, 50.0, 1.0)];

        let result = PeakTrackMatcher::new(16, 5.0).match_peaks(grid.view(), &peaks, &table, &view);
        assert_eq!(result.mask, vec![1]);

        let result = PeakTrackMatcher::new(16, 4.99).match_peaks(grid.view(), &peaks, &table, &view);
        assert_eq!(result.mask, vec![0]);
    }

    #[test]
    fn test_match_and_apply_sets_flags() {
        let grid = grid();
        let matcher = PeakTrackMatcher::new(16, 6.0);
        let (mut table, view) = table(&[(50.0, 62.0), (10.0, 10.0)]);
        let peaks = [Peak::new(60.0, 50.0, 1.0)];

        let (result, newly) = matcher.match_and_apply(grid.view(), &peaks, &mut table, &view);
        assert_eq!(result.mask, vec![1, 0]);
        assert_eq!(newly, 1);
        assert!(table.get(view[0]).unwrap().reconstructed);
        assert!(!table.get(view[1]).unwrap().reconstructed);

        // A second pass that matches nothing leaves the flag set.
        let (_, newly) = matcher.match_and_apply(grid.view(), &[], &mut table, &view);
        assert_eq!(newly, 0);
        assert!(table.get(view[0]).unwrap().reconstructed);
    }

    #[test]
    fn test_empty_peaks() {
        let grid = grid();
        let (table, view) = table(&[(50.0, 60.0)]);
        let result = PeakTrackMatcher::default().match_peaks(grid.view(), &[], &table, &view);
        assert!(result.squares.is_empty());
        assert_eq!(result.mask, vec![0]);
    }
}
