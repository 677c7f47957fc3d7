//! Simulated particle records and their conversion into ground-truth tracks.
//!
//! Particle files are JSON lines: one object per event holding parallel
//! per-particle arrays.
//!
//! ```text
//! {"event_id": 3, "particle_type": [13, -211], "pt": [1.2, 0.8], "phi": [0.1, -2.0],
//!  "eta": [0.4, -1.1], "vz": [2.5, -7.0], "pz": [0.5, -1.0], "number_of_hits": [9, 6]}
//! ```
#![allow(clippy::cast_precision_loss)]

use crate::{Error, Result};
use houghpix_core::{AnalysisConfig, ChargeRegistry, TrackTable, TrueTrack};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One event of simulated particles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleRecord {
    pub event_id: u64,
    pub particle_type: Vec<i32>,
    pub pt: Vec<f64>,
    pub phi: Vec<f64>,
    pub eta: Vec<f64>,
    pub vz: Vec<f64>,
    pub pz: Vec<f64>,
    pub number_of_hits: Vec<u32>,
}

impl ParticleRecord {
    /// Number of particles, taking the shortest array.
    #[must_use]
    pub fn len(&self) -> usize {
        [
            self.particle_type.len(),
            self.pt.len(),
            self.phi.len(),
            self.eta.len(),
            self.vz.len(),
            self.pz.len(),
            self.number_of_hits.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0)
    }

    /// Returns true if the record has no complete particle.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if all arrays have the same length.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let n = self.particle_type.len();
        [
            self.pt.len(),
            self.phi.len(),
            self.eta.len(),
            self.vz.len(),
            self.pz.len(),
            self.number_of_hits.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }
}

/// Reads every record of a JSON-lines particle file.
///
/// Blank lines are ignored.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a valid record.
pub fn read_particle_records<P: AsRef<Path>>(path: P) -> Result<Vec<ParticleRecord>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidFormat(format!("{}:{}: {e}", path.display(), line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Converts particles into binned tracks.
#[derive(Debug, Clone, Copy)]
pub struct TrackBuilder {
    nbin_phi: u32,
    nbin_qpt: u32,
    min_hits: u32,
}

impl TrackBuilder {
    /// Creates a builder for the given binning and hit cut.
    #[must_use]
    pub fn new(nbin_phi: u32, nbin_qpt: u32, min_hits: u32) -> Self {
        Self {
            nbin_phi,
            nbin_qpt,
            min_hits,
        }
    }

    /// Creates a builder from the analysis settings.
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.hough.nbin_phi,
            config.hough.nbin_qpt,
            config.processing.min_hits,
        )
    }

    /// Angular bin of azimuth `phi` in `[-pi, pi)`.
    #[must_use]
    pub fn phi_bin(&self, phi: f64) -> f64 {
        (phi + PI) * f64::from(self.nbin_phi) / (2.0 * PI)
    }

    /// Curvature bin of charge over transverse momentum.
    #[must_use]
    pub fn curv_bin(&self, charge: f64, pt: f64) -> f64 {
        let half = f64::from(self.nbin_qpt / 2);
        half + (charge / pt) * half
    }

    /// Tracks of charged particles with more than `min_hits` hits.
    ///
    /// Unknown species count as neutral. A record with arrays of unequal
    /// length is reported and truncated to the shortest array.
    #[must_use]
    pub fn tracks(&self, record: &ParticleRecord, registry: &ChargeRegistry) -> Vec<TrueTrack> {
        if !record.is_consistent() {
            warn!(
                "event {}: particle arrays differ in length; using the first {}",
                record.event_id,
                record.len()
            );
        }

        (0..record.len())
            .filter_map(|i| {
                let charge = registry.charge_or(record.particle_type[i], 0.0);
                let hits = record.number_of_hits[i];
                if charge == 0.0 || hits <= self.min_hits {
                    return None;
                }
                let pt = record.pt[i];
                let pz = record.pz[i];
                Some(TrueTrack {
                    event_id: record.event_id,
                    phi_bin: self.phi_bin(record.phi[i]),
                    curv_bin: self.curv_bin(charge, pt),
                    eta: record.eta[i],
                    vz: record.vz[i],
                    number_of_hits: hits,
                    cot: pz / pt,
                    particle_type: record.particle_type[i],
                    phi: record.phi[i],
                    pt,
                    pz,
                    reconstructed: false,
                })
            })
            .collect()
    }

    /// Builds the track table for a set of records.
    ///
    /// Every event is registered, including events whose particles were all
    /// rejected.
    #[must_use]
    pub fn build_table(&self, records: &[ParticleRecord], registry: &ChargeRegistry) -> TrackTable {
        let mut table = TrackTable::new();
        for record in records {
            table.register_event(record.event_id);
            for track in self.tracks(record, registry) {
                table.push(track);
            }
        }
        table
    }
}

/// Reads a particle file straight into a track table.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_track_table<P: AsRef<Path>>(
    path: P,
    builder: &TrackBuilder,
    registry: &ChargeRegistry,
) -> Result<TrackTable> {
    let path = path.as_ref();
    let records = read_particle_records(path)?;
    let table = builder.build_table(&records, registry);
    info!(
        "{}: {} events, {} tracks",
        path.display(),
        table.event_ids().len(),
        table.len()
    );
    Ok(table)
}
