//! houghpix-io: file I/O for houghpix.
//!
//! Reads Hough accumulator histograms (memory-mapped binary containers, or
//! HDF5 with the `hdf5` feature) and simulated particle records, and writes
//! training squares and the ground-truth track table.
//!

mod config_file;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod histogram;
pub mod particles;
mod writer;

pub use config_file::{load_config, save_config};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{
    read_histograms_hdf5, read_histograms_hdf5_where, write_training_hdf5, TrainingWriteOptions,
};
pub use histogram::{
    find_histogram_files, parse_histogram_name, HistogramEntry, HistogramFileReader,
    HistogramFileWriter, TaggedEntry,
};
pub use particles::{load_track_table, read_particle_records, ParticleRecord, TrackBuilder};
pub use writer::{read_training_data, TrackCsvWriter, TrainingDataWriter, TRACK_CSV_HEADER};
