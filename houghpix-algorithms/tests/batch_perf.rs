#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::unreadable_literal
)]
use houghpix_algorithms::{HistogramJob, HoughPipeline};
use houghpix_core::{AnalysisConfig, BinEdges, HoughHistogram, TrackTable, TrueTrack};
use ndarray::Array2;
use std::time::Instant;

/// Full-size accumulators with scattered spikes over a low noise floor.
fn synthetic_histograms(count: usize) -> Vec<HoughHistogram> {
    let (rows, cols) = (7000, 216);
    let mut rng_seed: u64 = 12345;
    let mut rand = || {
        rng_seed = (rng_seed.wrapping_mul(1103515245).wrapping_add(12345)) & 0x7fffffff;
        rng_seed as usize
    };

    (0..count)
        .map(|i| {
            let mut values = Array2::<f64>::zeros((rows, cols));
            for v in &mut values {
                *v = (rand() % 4) as f64;
            }
            for _ in 0..200 {
                let r = 20 + rand() % (rows - 40);
                let c = 20 + rand() % (cols - 40);
                values[[r, c]] = 10.0 + (rand() % 20) as f64;
            }
            HoughHistogram::new(format!("hough_{}_-1", i), values, BinEdges::unit(rows, cols))
                .unwrap()
        })
        .collect()
}

fn tracks(count: usize) -> TrackTable {
    (0..count as u64)
        .flat_map(|event| {
            (0..50).map(move |k| {
                TrueTrack::new(event, 100.0 * f64::from(k) + 50.0, 108.0, 0.0, 0.0).with_hits(8)
            })
        })
        .collect()
}

#[test]
fn test_batch_matches_sequential_processing() {
    let histograms = synthetic_histograms(4);
    let pipeline = HoughPipeline::new(&AnalysisConfig::default()).unwrap();
    let jobs: Vec<_> = histograms
        .iter()
        .enumerate()
        .map(|(i, h)| HistogramJob::new(h, i as u64, -1))
        .collect();

    let mut sequential_table = tracks(histograms.len());
    let start_seq = Instant::now();
    let sequential: Vec<_> = jobs
        .iter()
        .map(|&job| pipeline.process_histogram(job, &mut sequential_table).unwrap())
        .collect();
    println!("Sequential time: {:?}", start_seq.elapsed());

    let mut batch_table = tracks(histograms.len());
    let start_batch = Instant::now();
    let batch = pipeline.process_batch(&jobs, &mut batch_table).unwrap();
    println!("Batch time: {:?}", start_batch.elapsed());

    assert_eq!(sequential.len(), batch.len());
    for (seq, par) in sequential.iter().zip(&batch) {
        let (seq, par) = (seq.as_ref().unwrap(), par.as_ref().unwrap());
        assert_eq!(seq.peaks, par.peaks);
        assert_eq!(seq.result.mask, par.result.mask);
        assert_eq!(seq.result.squares.len(), par.result.squares.len());
    }
    assert_eq!(
        sequential_table.count_reconstructed(),
        batch_table.count_reconstructed()
    );
}
