//! houghpix-core: Core types for Hough-space track candidate analysis.
//!
//! This crate provides the accumulator grid, peaks, ground-truth tracks,
//! classified squares, easing strategies, and configuration shared by the
//! detection, I/O, and command-line crates.
//!

pub mod charge;
pub mod config;
pub mod easing;
pub mod error;
pub mod grid;
pub mod peak;
pub mod square;
pub mod statistics;
pub mod track;

pub use charge::ChargeRegistry;
pub use config::{AnalysisConfig, HoughConfig, PeakDetectionConfig, ProcessingConfig};
pub use easing::{Easing, EASING_RANGE};
pub use error::{Error, Result};
pub use grid::{sanitize, BinEdges, HoughHistogram};
pub use peak::Peak;
pub use square::{ClassifiedSquare, SquareClassification, SquareCollection, SquareSummary};
pub use statistics::AnalysisStatistics;
pub use track::{TrackId, TrackTable, TrueTrack};
