//! High-level pipeline that combines detection, slicing, and matching.

use crate::matching::{MatchResult, PeakTrackMatcher};
use crate::peaks::PeakFinder;
use crate::slicing::{SliceBoundsCalculator, TrackSliceFilter};
use crate::smoothing::gaussian_filter;
use houghpix_core::{
    AnalysisConfig, AnalysisStatistics, HoughHistogram, Peak, Result, SquareCollection, TrackId,
    TrackTable,
};
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;

/// One histogram tagged with the event and slice it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct HistogramJob<'a> {
    /// Accumulator to process.
    pub histogram: &'a HoughHistogram,
    /// Event the accumulator was filled from.
    pub event_id: u64,
    /// Cotangent slice, `-1` for the full-range pass.
    pub slice_num: i32,
}

impl<'a> HistogramJob<'a> {
    /// Tags a histogram.
    #[must_use]
    pub fn new(histogram: &'a HoughHistogram, event_id: u64, slice_num: i32) -> Self {
        Self {
            histogram,
            event_id,
            slice_num,
        }
    }
}

/// Peaks found in a histogram together with the grid squares are cut from.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Sanitized, unsmoothed accumulator values.
    pub grid: Array2<f64>,
    /// Peaks in row-major discovery order.
    pub peaks: Vec<Peak>,
}

/// Everything produced by one slice pass.
#[derive(Debug, Clone)]
pub struct SliceOutcome {
    /// Event of the pass.
    pub event_id: u64,
    /// Slice of the pass.
    pub slice_num: i32,
    /// Detected peaks, including those whose window was clipped.
    pub peaks: Vec<Peak>,
    /// Tracks admitted to this pass, aligned with `result.mask`.
    pub admitted: Vec<TrackId>,
    /// Squares and assignment mask.
    pub result: MatchResult,
    /// Tracks whose flag was set for the first time by this pass.
    pub newly_reconstructed: usize,
}

impl SliceOutcome {
    /// Adds the track and square counts of this pass to `stats`.
    pub fn record(&self, stats: &mut AnalysisStatistics) {
        stats.add_true_tracks(self.admitted.len());
        stats.add_squares(
            self.result.true_positive_count(),
            self.result.false_positive_count(),
        );
    }
}

/// Configured detection and matching pipeline.
#[derive(Debug, Clone)]
pub struct HoughPipeline {
    config: AnalysisConfig,
    finder: PeakFinder,
    slice_filter: TrackSliceFilter,
    matcher: PeakTrackMatcher,
}

impl HoughPipeline {
    /// Validates `config` and builds the pipeline stages.
    ///
    /// # Errors
    /// Returns the configuration error reported by [`AnalysisConfig::validate`].
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let slice_filter = TrackSliceFilter::new(
            SliceBoundsCalculator::new(config.easing),
            config.processing.vz_range,
            config.hough.square_size,
            config.hough.nbin_qpt,
        );
        Ok(Self {
            config: config.clone(),
            finder: PeakFinder::from_config(&config.peak_detection),
            slice_filter,
            matcher: PeakTrackMatcher::from_config(&config.hough),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns true if `slice_num` is in the configured slice list.
    #[must_use]
    pub fn wants_slice(&self, slice_num: i32) -> bool {
        self.config.processing.slice_list.contains(&slice_num)
    }

    /// Sanitizes the grid and finds its peaks.
    ///
    /// Smoothing, when enabled, only affects detection; the returned grid is
    /// the unsmoothed one.
    #[must_use]
    pub fn detect(&self, histogram: &HoughHistogram) -> Detection {
        let grid = histogram.sanitized();
        let sigma = self.config.peak_detection.smooth_sigma;
        let peaks = if sigma > 0.0 {
            let smoothed = gaussian_filter(grid.view(), sigma);
            self.finder.find_peaks(smoothed.view(), histogram.edges())
        } else {
            self.finder.find_peaks(grid.view(), histogram.edges())
        };
        Detection { grid, peaks }
    }

    /// Runs one slice pass for one event.
    ///
    /// Returns `Ok(None)` when the slice is not configured or the event is not
    /// in the track table.
    ///
    /// # Errors
    /// Returns [`houghpix_core::Error::InvalidSlice`] for a slice outside `[-1, 32]`.
    pub fn process_histogram(
        &self,
        job: HistogramJob<'_>,
        table: &mut TrackTable,
    ) -> Result<Option<SliceOutcome>> {
        if !self.accepts(job, table) {
            return Ok(None);
        }
        let detection = self.detect(job.histogram);
        self.finish(job, detection, table).map(Some)
    }

    /// Runs a batch of slice passes.
    ///
    /// Detection runs in parallel; matching is applied sequentially in input
    /// order so flags from earlier jobs are visible to later ones. The output
    /// is aligned with `jobs`.
    ///
    /// # Errors
    /// Stops at the first invalid-slice error.
    pub fn process_batch(
        &self,
        jobs: &[HistogramJob<'_>],
        table: &mut TrackTable,
    ) -> Result<Vec<Option<SliceOutcome>>> {
        let detections: Vec<Option<Detection>> = {
            let table = &*table;
            jobs.par_iter()
                .map(|&job| self.accepts(job, table).then(|| self.detect(job.histogram)))
                .collect()
        };

        jobs.iter()
            .zip(detections)
            .map(|(&job, detection)| match detection {
                Some(detection) => self.finish(job, detection, table).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    /// Processes a batch and folds the results into run-level accumulators.
    ///
    /// Every job counts as a visited histogram and registers its event, even
    /// when its slice is skipped.
    ///
    /// # Errors
    /// Propagates errors from [`Self::process_batch`].
    pub fn run_batch(
        &self,
        jobs: &[HistogramJob<'_>],
        table: &mut TrackTable,
        stats: &mut AnalysisStatistics,
        squares: &mut SquareCollection,
    ) -> Result<usize> {
        for job in jobs {
            if stats.visit_histogram(job.event_id) {
                debug!("discovered event {}", job.event_id);
            }
        }
        self.fold_batch(jobs, table, stats, squares)
    }

    /// Processes a batch and folds the outcomes into `stats` and `squares`
    /// without counting the jobs as visits.
    ///
    /// Used by callers that record visits themselves, for example when
    /// unwanted slices are skipped before their grids are decoded.
    ///
    /// # Errors
    /// Propagates errors from [`Self::process_batch`].
    pub fn fold_batch(
        &self,
        jobs: &[HistogramJob<'_>],
        table: &mut TrackTable,
        stats: &mut AnalysisStatistics,
        squares: &mut SquareCollection,
    ) -> Result<usize> {
        let outcomes = self.process_batch(jobs, table)?;
        let mut newly = 0;
        for outcome in outcomes.into_iter().flatten() {
            outcome.record(stats);
            newly += outcome.newly_reconstructed;
            squares.extend(outcome.result.squares);
        }
        Ok(newly)
    }

    fn accepts(&self, job: HistogramJob<'_>, table: &TrackTable) -> bool {
        if !self.wants_slice(job.slice_num) {
            return false;
        }
        if !table.contains_event(job.event_id) {
            debug!(
                "event {} ({}) has no particle record, skipping",
                job.event_id, job.histogram.name
            );
            return false;
        }
        true
    }

    fn finish(
        &self,
        job: HistogramJob<'_>,
        detection: Detection,
        table: &mut TrackTable,
    ) -> Result<SliceOutcome> {
        let admitted =
            self.slice_filter
                .filter(table, table.event_tracks(job.event_id), job.slice_num)?;
        let (result, newly_reconstructed) =
            self.matcher
                .match_and_apply(detection.grid.view(), &detection.peaks, table, &admitted);

        info!(
            "event {} slice {}: {} peaks, {} tracks, {} matched, {} squares",
            job.event_id,
            job.slice_num,
            detection.peaks.len(),
            admitted.len(),
            result.claimed_count(),
            result.squares.len()
        );

        Ok(SliceOutcome {
            event_id: job.event_id,
            slice_num: job.slice_num,
            peaks: detection.peaks,
            admitted,
            result,
            newly_reconstructed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use houghpix_core::{BinEdges, HoughConfig, PeakDetectionConfig, ProcessingConfig, TrueTrack};

    fn histogram(value: f64) -> HoughHistogram {
        let mut values = Array2::<f64>::zeros((100, 100));
        values[[50, 60]] = value;
        HoughHistogram::new("h_1_-1", values, BinEdges::unit(100, 100)).unwrap()
    }

    fn table() -> TrackTable {
        std::iter::once(TrueTrack::new(1, 50.0, 62.0, 0.0, 0.0).with_hits(8)).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AnalysisConfig::new().with_hough(HoughConfig::default().with_square_size(0));
        assert!(HoughPipeline::new(&config).is_err());
    }

    #[test]
    fn test_unconfigured_slice_skipped() {
        let pipeline = HoughPipeline::new(&AnalysisConfig::default()).unwrap();
        let hist = histogram(12.0);
        let mut table = table();
        let outcome = pipeline
            .process_histogram(HistogramJob::new(&hist, 1, 4), &mut table)
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(table.count_reconstructed(), 0);
    }

    #[test]
    fn test_event_without_tracks_skipped() {
        let pipeline = HoughPipeline::new(&AnalysisConfig::default()).unwrap();
        let hist = histogram(12.0);
        let mut table = table();
        let outcome = pipeline
            .process_histogram(HistogramJob::new(&hist, 2, -1), &mut table)
            .unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_smoothing_keeps_raw_square_data() {
        let config = AnalysisConfig::new()
            .with_peak_detection(PeakDetectionConfig::default().with_smooth_sigma(0.5));
        let pipeline = HoughPipeline::new(&config).unwrap();
        let mut values = Array2::<f64>::zeros((100, 100));
        for r in 49..=51 {
            for c in 59..=61 {
                values[[r, c]] = 20.0;
            }
        }
        values[[50, 60]] = 40.0;
        let hist = HoughHistogram::new("h", values.clone(), BinEdges::unit(100, 100)).unwrap();

        let detection = pipeline.detect(&hist);
        assert_eq!(detection.grid, values);
        assert_eq!(detection.peaks.len(), 1);
        assert!(detection.peaks[0].height < 40.0);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let config = AnalysisConfig::new()
            .with_processing(ProcessingConfig::default().with_slices(vec![-1, 3]));
        let pipeline = HoughPipeline::new(&config).unwrap();
        let first = histogram(12.0);
        let second = histogram(15.0);
        let jobs = [
            HistogramJob::new(&first, 1, -1),
            HistogramJob::new(&second, 1, 3),
            HistogramJob::new(&second, 1, 9),
        ];

        let mut table = table();
        let outcomes = pipeline.process_batch(&jobs, &mut table).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[2].is_none());

        let first = outcomes[0].as_ref().unwrap();
        assert_eq!(first.result.mask, vec![1]);
        assert_eq!(first.newly_reconstructed, 1);

        // The track is claimed again in the second pass but was already set.
        let second = outcomes[1].as_ref().unwrap();
        assert_eq!(second.result.mask, vec![1]);
        assert_eq!(second.newly_reconstructed, 0);
        assert_eq!(table.count_reconstructed(), 1);
    }

    #[test]
    fn test_run_batch_statistics() {
        let pipeline = HoughPipeline::new(&AnalysisConfig::default()).unwrap();
        let hist = histogram(12.0);
        let jobs = [
            HistogramJob::new(&hist, 1, -1),
            HistogramJob::new(&hist, 5, 2),
        ];
        let mut table = table();
        let mut stats = AnalysisStatistics::new(1);
        let mut squares = SquareCollection::new();

        let newly = pipeline
            .run_batch(&jobs, &mut table, &mut stats, &mut squares)
            .unwrap();
        assert_eq!(newly, 1);
        assert_eq!(stats.event_ids(), &[1, 5]);
        assert_eq!(stats.processed_histograms, 2);
        assert_eq!(stats.true_tracks_total, 1);
        assert_eq!(stats.true_squares, 1);
        assert_eq!(squares.true_positives().len(), 1);
    }

    #[test]
    fn test_fold_batch_leaves_visits_to_caller() {
        let pipeline = HoughPipeline::new(&AnalysisConfig::default()).unwrap();
        let hist = histogram(12.0);
        let jobs = [HistogramJob::new(&hist, 1, -1)];
        let mut table = table();
        let mut stats = AnalysisStatistics::new(1);
        let mut squares = SquareCollection::new();

        let newly = pipeline
            .fold_batch(&jobs, &mut table, &mut stats, &mut squares)
            .unwrap();
        assert_eq!(newly, 1);
        assert_eq!(stats.processed_histograms, 0);
        assert_eq!(stats.total_events(), 0);
        assert_eq!(stats.true_squares, 1);
    }
}
