//! houghpix-algorithms: Detection and truth matching for Hough accumulators.
//!
//! This crate provides the processing stages:
//! - **Peaks** - sliding-window local maxima with close-pair merging
//! - **Smoothing** - separable Gaussian filter applied before detection
//! - **Slicing** - easing-based cotangent bands and track admission
//! - **Matching** - first-fit peak-to-track assignment and square extraction
//!
#![warn(missing_docs)]

mod matching;
mod peaks;
mod processing;
pub mod slicing;
pub mod smoothing;

pub use matching::{MatchResult, PeakTrackMatcher};
pub use peaks::PeakFinder;
pub use processing::{Detection, HistogramJob, HoughPipeline, SliceOutcome};
pub use slicing::{SliceBounds, SliceBoundsCalculator, TrackSliceFilter};
pub use smoothing::gaussian_filter;

// Re-export core configuration types
pub use houghpix_core::config::{AnalysisConfig, HoughConfig, PeakDetectionConfig};
