//! Ground-truth tracks and the owning track table.
//!
//! All tracks of a run live in one [`TrackTable`]. Per-event and per-slice
//! views are slices of [`TrackId`]s into that table, so marking a track as
//! reconstructed through any view updates the single canonical record.

use log::warn;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable handle to a track inside a [`TrackTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackId(usize);

impl TrackId {
    /// Position of the track in its table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A ground-truth track expressed in accumulator bins.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrueTrack {
    /// Event identifier.
    pub event_id: u64,
    /// Angular (row) bin position, fractional.
    pub phi_bin: f64,
    /// Curvature (column) bin position, fractional.
    pub curv_bin: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Vertex z position.
    pub vz: f64,
    /// Number of detector hits.
    pub number_of_hits: u32,
    /// Cotangent of the polar angle (`pz / pt`).
    pub cot: f64,
    /// PDG particle identifier.
    pub particle_type: i32,
    /// Azimuthal angle.
    pub phi: f64,
    /// Transverse momentum.
    pub pt: f64,
    /// Longitudinal momentum.
    pub pz: f64,
    /// Set once any slice pass matched this track to a peak.
    pub reconstructed: bool,
}

impl TrueTrack {
    /// Creates a track from its binned coordinates; kinematic extras default to zero.
    #[must_use]
    pub fn new(event_id: u64, phi_bin: f64, curv_bin: f64, vz: f64, cot: f64) -> Self {
        Self {
            event_id,
            phi_bin,
            curv_bin,
            vz,
            cot,
            ..Self::default()
        }
    }

    /// Sets the hit count.
    #[must_use]
    pub fn with_hits(mut self, number_of_hits: u32) -> Self {
        self.number_of_hits = number_of_hits;
        self
    }

    /// True if `lo < vz < hi`.
    #[inline]
    #[must_use]
    pub fn is_in_vz_range(&self, lo: f64, hi: f64) -> bool {
        lo < self.vz && self.vz < hi
    }

    /// True if `lo < cot < hi`.
    #[inline]
    #[must_use]
    pub fn is_in_cot_range(&self, lo: f64, hi: f64) -> bool {
        lo < self.cot && self.cot < hi
    }
}

/// Owning store of tracks, indexed by event.
#[derive(Debug, Clone, Default)]
pub struct TrackTable {
    tracks: Vec<TrueTrack>,
    by_event: HashMap<u64, Vec<TrackId>>,
    event_order: Vec<u64>,
}

impl TrackTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a track, returning its handle.
    pub fn push(&mut self, track: TrueTrack) -> TrackId {
        let id = TrackId(self.tracks.len());
        let event_id = track.event_id;
        self.tracks.push(track);
        if !self.by_event.contains_key(&event_id) {
            self.event_order.push(event_id);
        }
        self.by_event.entry(event_id).or_default().push(id);
        id
    }

    /// Registers an event that may end up with no tracks.
    ///
    /// Histograms of a registered event are processed even when every
    /// particle was rejected, so all their peaks count as false positives.
    pub fn register_event(&mut self, event_id: u64) {
        if !self.by_event.contains_key(&event_id) {
            self.event_order.push(event_id);
            self.by_event.insert(event_id, Vec::new());
        }
    }

    /// Number of tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Returns true if the table holds no tracks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Looks up a track.
    #[must_use]
    pub fn get(&self, id: TrackId) -> Option<&TrueTrack> {
        self.tracks.get(id.0)
    }

    /// Looks up a track mutably.
    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut TrueTrack> {
        self.tracks.get_mut(id.0)
    }

    /// Tracks of one event in insertion order; empty for unknown events.
    #[must_use]
    pub fn event_tracks(&self, event_id: u64) -> &[TrackId] {
        self.by_event
            .get(&event_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns true if the event was registered or has tracks.
    #[must_use]
    pub fn contains_event(&self, event_id: u64) -> bool {
        self.by_event.contains_key(&event_id)
    }

    /// Event ids in first-seen order.
    #[must_use]
    pub fn event_ids(&self) -> &[u64] {
        &self.event_order
    }

    /// Iterates over all tracks with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &TrueTrack)> {
        self.tracks.iter().enumerate().map(|(i, t)| (TrackId(i), t))
    }

    /// Resolves a view into track references, skipping stale handles.
    pub fn resolve<'a>(&'a self, view: &'a [TrackId]) -> impl Iterator<Item = &'a TrueTrack> + 'a {
        view.iter().filter_map(move |&id| self.get(id))
    }

    /// Marks a track reconstructed. Returns true if the flag was newly set.
    ///
    /// The flag is never cleared.
    pub fn mark_reconstructed(&mut self, id: TrackId) -> bool {
        match self.tracks.get_mut(id.0) {
            Some(track) if !track.reconstructed => {
                track.reconstructed = true;
                true
            }
            _ => false,
        }
    }

    /// OR-merges an assignment mask into the tracks of `view`.
    ///
    /// A length mismatch between mask and view is reported and the shorter
    /// length is applied. Returns the number of newly reconstructed tracks.
    pub fn apply_assignment(&mut self, view: &[TrackId], mask: &[u8]) -> usize {
        if view.len() != mask.len() {
            warn!(
                "assignment mask length {} differs from track view length {}; applying {}",
                mask.len(),
                view.len(),
                view.len().min(mask.len())
            );
        }
        let mut newly = 0;
        for (&id, &claimed) in view.iter().zip(mask) {
            if claimed > 0 && self.mark_reconstructed(id) {
                newly += 1;
            }
        }
        newly
    }

    /// Number of reconstructed tracks in the whole table.
    #[must_use]
    pub fn count_reconstructed(&self) -> usize {
        self.tracks.iter().filter(|t| t.reconstructed).count()
    }

    /// Number of reconstructed tracks within a view.
    #[must_use]
    pub fn count_reconstructed_in(&self, view: &[TrackId]) -> usize {
        self.resolve(view).filter(|t| t.reconstructed).count()
    }

    /// Keeps the handles of tracks with more than `min_hits` hits.
    #[must_use]
    pub fn filter_by_min_hits(&self, view: &[TrackId], min_hits: u32) -> Vec<TrackId> {
        view.iter()
            .copied()
            .filter(|&id| self.get(id).is_some_and(|t| t.number_of_hits > min_hits))
            .collect()
    }
}

impl FromIterator<TrueTrack> for TrackTable {
    fn from_iter<I: IntoIterator<Item = TrueTrack>>(iter: I) -> Self {
        let mut table = Self::new();
        for track in iter {
            table.push(track);
        }
        table
    }
}
