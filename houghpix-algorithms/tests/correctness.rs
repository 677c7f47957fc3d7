#![allow(clippy::uninlined_format_args, clippy::float_cmp)]
use houghpix_algorithms::{HistogramJob, HoughPipeline, PeakFinder, PeakTrackMatcher};
use houghpix_core::{
    AnalysisConfig, BinEdges, HoughConfig, HoughHistogram, Peak, ProcessingConfig,
    SquareClassification, TrackTable, TrueTrack,
};
use ndarray::{s, Array2};

fn single_peak_histogram() -> HoughHistogram {
    let mut values = Array2::<f64>::zeros((100, 100));
    values[[50, 60]] = 12.0;
    HoughHistogram::new("hough_7_-1", values, BinEdges::unit(100, 100)).unwrap()
}

fn one_track_table() -> TrackTable {
    std::iter::once(TrueTrack::new(7, 50.0, 62.0, 0.0, 0.0).with_hits(10)).collect()
}

fn config(tolerance: f64) -> AnalysisConfig {
    AnalysisConfig::new().with_hough(
        HoughConfig::default()
            .with_square_size(16)
            .with_tolerance(tolerance),
    )
}

#[test]
fn test_end_to_end_true_positive() {
    let hist = single_peak_histogram();
    let mut table = one_track_table();
    let pipeline = HoughPipeline::new(&config(6.0)).unwrap();

    let outcome = pipeline
        .process_histogram(HistogramJob::new(&hist, 7, -1), &mut table)
        .unwrap()
        .expect("slice -1 with known event is processed");

    assert_eq!(outcome.peaks, vec![Peak::new(60.0, 50.0, 12.0)]);
    assert_eq!(outcome.admitted.len(), 1);
    assert_eq!(outcome.result.squares.len(), 1);

    let square = &outcome.result.squares[0];
    assert_eq!(square.classification, SquareClassification::TruePositive);
    assert_eq!(square.data.dim(), (32, 32));
    assert_eq!((square.center_x, square.center_y), (60.0, 50.0));
    assert_eq!(square.data, hist.values().slice(s![34..66, 44..76]));

    assert_eq!(outcome.result.mask, vec![1]);
    assert!(table.get(outcome.admitted[0]).unwrap().reconstructed);
}

#[test]
fn test_end_to_end_true_positive_concrete_slice() {
    let hist = single_peak_histogram();
    let mut table = one_track_table();
    let config =
        config(6.0).with_processing(ProcessingConfig::default().with_slices(vec![0]));
    let pipeline = HoughPipeline::new(&config).unwrap();

    let outcome = pipeline
        .process_histogram(HistogramJob::new(&hist, 7, 0), &mut table)
        .unwrap()
        .expect("configured slice with known event is processed");

    assert_eq!(outcome.peaks, vec![Peak::new(60.0, 50.0, 12.0)]);
    assert_eq!(outcome.admitted.len(), 1);
    assert_eq!(outcome.result.mask, vec![1]);
    assert_eq!(
        outcome.result.squares[0].classification,
        SquareClassification::TruePositive
    );
    assert_eq!(table.count_reconstructed(), 1);

    // The full-range pass is not configured.
    assert!(pipeline
        .process_histogram(HistogramJob::new(&hist, 7, -1), &mut table)
        .unwrap()
        .is_none());
}

#[test]
fn test_end_to_end_false_positive() {
    let hist = single_peak_histogram();
    let mut table = one_track_table();
    let pipeline = HoughPipeline::new(&config(1.0)).unwrap();

    let outcome = pipeline
        .process_histogram(HistogramJob::new(&hist, 7, -1), &mut table)
        .unwrap()
        .expect("slice -1 with known event is processed");

    assert_eq!(outcome.result.squares.len(), 1);
    assert_eq!(
        outcome.result.squares[0].classification,
        SquareClassification::FalsePositive
    );
    assert_eq!(outcome.result.mask, vec![0]);
    assert_eq!(table.count_reconstructed(), 0);
}

#[test]
fn test_non_finite_cells_are_sanitized() {
    let mut values = Array2::<f64>::zeros((100, 100));
    values[[50, 60]] = 12.0;
    values[[40, 50]] = f64::NAN;
    values[[45, 70]] = f64::INFINITY;
    let hist = HoughHistogram::new("h", values, BinEdges::unit(100, 100)).unwrap();
    let mut table = one_track_table();
    let pipeline = HoughPipeline::new(&config(6.0)).unwrap();

    let outcome = pipeline
        .process_histogram(HistogramJob::new(&hist, 7, -1), &mut table)
        .unwrap()
        .unwrap();
    assert_eq!(outcome.peaks.len(), 1);
    let square = &outcome.result.squares[0];
    assert!(square.data.iter().all(|v| v.is_finite()));
    assert_eq!(square.data[[40 - 34, 50 - 44]], 0.0);
    assert_eq!(square.data[[45 - 34, 70 - 44]], 0.0);
}

#[test]
fn test_assignment_is_injective() {
    // A row of equal, well-separated peaks over a cluster of tracks.
    let mut values = Array2::<f64>::zeros((120, 120));
    for c in [40, 44, 48, 52, 56] {
        values[[60, c]] = 9.0;
    }
    let edges = BinEdges::unit(120, 120);
    let peaks = PeakFinder::new(5.0, 2).find_peaks(values.view(), &edges);
    assert_eq!(peaks.len(), 5);

    let table: TrackTable = [(60.0, 41.0), (60.0, 45.0), (61.0, 50.0)]
        .into_iter()
        .map(|(phi, curv)| TrueTrack::new(0, phi, curv, 0.0, 0.0))
        .collect();
    let view = table.event_tracks(0).to_vec();

    let result = PeakTrackMatcher::new(16, 6.0).match_peaks(values.view(), &peaks, &table, &view);
    let claimed: usize = result.mask.iter().map(|&m| usize::from(m)).sum();

    assert_eq!(result.mask.len(), view.len());
    assert!(result.mask.iter().all(|&m| m <= 1));
    assert!(claimed <= result.squares.len());
    assert_eq!(claimed, result.true_positive_count());
    assert_eq!(claimed, 3);
}

#[test]
fn test_flags_accumulate_across_slices() {
    let hist = single_peak_histogram();
    let mut table: TrackTable = [
        TrueTrack::new(7, 50.0, 62.0, 0.0, 0.0),
        TrueTrack::new(7, 20.0, 20.0, 0.0, 0.0),
    ]
    .into_iter()
    .collect();

    let mut values = Array2::<f64>::zeros((100, 100));
    values[[20, 20]] = 12.0;
    let second = HoughHistogram::new("h", values, BinEdges::unit(100, 100)).unwrap();

    let config = config(6.0).with_processing(
        houghpix_core::ProcessingConfig::default().with_slices(vec![-1, 0]),
    );
    let pipeline = HoughPipeline::new(&config).unwrap();

    pipeline
        .process_histogram(HistogramJob::new(&hist, 7, -1), &mut table)
        .unwrap();
    pipeline
        .process_histogram(HistogramJob::new(&second, 7, 0), &mut table)
        .unwrap();

    assert_eq!(table.count_reconstructed(), 2);
}
