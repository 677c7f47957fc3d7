//! Run-level counters.
#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Cumulative counts for an analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct AnalysisStatistics {
    /// Histogram files scheduled for processing.
    pub total_files: usize,
    /// Histogram files fully read.
    pub processed_files: usize,
    /// Histograms visited, including skipped slices.
    pub processed_histograms: usize,
    /// Admitted tracks summed over all processed slices.
    pub true_tracks_total: usize,
    /// True-positive squares.
    pub true_squares: usize,
    /// False-positive squares.
    pub false_squares: usize,
    event_ids: Vec<u64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    seen: HashSet<u64>,
}

impl AnalysisStatistics {
    /// Creates zeroed statistics for `total_files` files.
    #[must_use]
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    /// Records an event. Returns true the first time an id is seen.
    pub fn add_event(&mut self, event_id: u64) -> bool {
        if self.seen.insert(event_id) {
            self.event_ids.push(event_id);
            true
        } else {
            false
        }
    }

    /// Event ids in first-seen order.
    #[must_use]
    pub fn event_ids(&self) -> &[u64] {
        &self.event_ids
    }

    /// Number of distinct events.
    #[must_use]
    pub fn total_events(&self) -> usize {
        self.event_ids.len()
    }

    pub fn add_true_tracks(&mut self, count: usize) {
        self.true_tracks_total += count;
    }

    pub fn add_squares(&mut self, true_count: usize, false_count: usize) {
        self.true_squares += true_count;
        self.false_squares += false_count;
    }

    pub fn increment_files(&mut self) {
        self.processed_files += 1;
    }

    pub fn increment_histograms(&mut self) {
        self.processed_histograms += 1;
    }

    /// Counts one visited histogram and registers its event.
    ///
    /// Returns true the first time the event is seen.
    pub fn visit_histogram(&mut self, event_id: u64) -> bool {
        self.increment_histograms();
        self.add_event(event_id)
    }

    /// True plus false squares.
    #[must_use]
    pub fn total_squares(&self) -> usize {
        self.true_squares + self.false_squares
    }

    /// True squares per admitted track; 0 when no tracks were admitted.
    #[must_use]
    pub fn reconstruction_efficiency(&self) -> f64 {
        if self.true_tracks_total == 0 {
            return 0.0;
        }
        self.true_squares as f64 / self.true_tracks_total as f64
    }
}
