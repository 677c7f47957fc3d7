//! Cotangent slice bounds and per-slice track admission.
#![allow(clippy::cast_precision_loss)]

use houghpix_core::{Easing, Error, Result, TrackId, TrackTable, EASING_RANGE};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of the full-range pass.
pub const FULL_RANGE_SLICE: i32 = -1;
/// Highest concrete slice index.
pub const MAX_SLICE: i32 = 32;

/// Cotangent interval of a slice; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SliceBounds {
    /// Lower cotangent bound.
    pub lo: Option<f64>,
    /// Upper cotangent bound.
    pub hi: Option<f64>,
}

impl SliceBounds {
    /// Returns true if `cot` lies strictly inside the bounds.
    #[must_use]
    pub fn contains(&self, cot: f64) -> bool {
        self.lo.is_none_or(|lo| lo < cot) && self.hi.is_none_or(|hi| cot < hi)
    }
}

/// Maps slice numbers to cotangent bounds through an easing curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceBoundsCalculator {
    easing: Easing,
}

impl SliceBoundsCalculator {
    /// Creates a calculator for the given easing.
    #[must_use]
    pub fn new(easing: Easing) -> Self {
        Self { easing }
    }

    /// Easing in use.
    #[must_use]
    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Bounds of `slice_num`.
    ///
    /// Slice `-1` is unbounded. Slice `k` spans `ease(-32 + 2k)` to
    /// `ease(-32 + 2·min(k + 1, 32))`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSlice`] outside `[-1, 32]`.
    pub fn bounds(&self, slice_num: i32) -> Result<SliceBounds> {
        if slice_num == FULL_RANGE_SLICE {
            return Ok(SliceBounds::default());
        }
        if !(0..=MAX_SLICE).contains(&slice_num) {
            return Err(Error::InvalidSlice(slice_num));
        }
        let lo = self.easing.ease(-EASING_RANGE + 2.0 * f64::from(slice_num.max(0)));
        let hi = self
            .easing
            .ease(-EASING_RANGE + 2.0 * f64::from((slice_num + 1).min(MAX_SLICE)));
        Ok(SliceBounds {
            lo: Some(lo),
            hi: Some(hi),
        })
    }
}

/// Selects the tracks of an event that take part in one slice pass.
#[derive(Debug, Clone)]
pub struct TrackSliceFilter {
    calculator: SliceBoundsCalculator,
    vz_range: (f64, f64),
    square_size: usize,
    nbin_qpt: u32,
}

impl TrackSliceFilter {
    /// Creates a filter.
    #[must_use]
    pub fn new(
        calculator: SliceBoundsCalculator,
        vz_range: (f64, f64),
        square_size: usize,
        nbin_qpt: u32,
    ) -> Self {
        Self {
            calculator,
            vz_range,
            square_size,
            nbin_qpt,
        }
    }

    /// Cotangent band applied for `slice_num`.
    ///
    /// Every concrete slice shares the band from the low edge of slice 0 to
    /// the high edge of slice 32. The full-range pass uses slices 10 to 22.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSlice`] outside `[-1, 32]`.
    pub fn cot_band(&self, slice_num: i32) -> Result<SliceBounds> {
        let (first, last) = match slice_num {
            FULL_RANGE_SLICE => (10, 22),
            0..=MAX_SLICE => (0, MAX_SLICE),
            _ => return Err(Error::InvalidSlice(slice_num)),
        };
        Ok(SliceBounds {
            lo: self.calculator.bounds(first)?.lo,
            hi: self.calculator.bounds(last)?.hi,
        })
    }

    /// Admitted subset of `view`, in input order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSlice`] outside `[-1, 32]`.
    pub fn filter(&self, table: &TrackTable, view: &[TrackId], slice_num: i32) -> Result<Vec<TrackId>> {
        let band = self.cot_band(slice_num)?;
        let (vz_lo, vz_hi) = self.vz_range;
        let size = self.square_size as f64;
        let curv_hi = f64::from(self.nbin_qpt) - size;

        Ok(view
            .iter()
            .copied()
            .filter(|&id| {
                table.get(id).is_some_and(|track| {
                    track.is_in_vz_range(vz_lo, vz_hi)
                        && band.contains(track.cot)
                        && (slice_num != FULL_RANGE_SLICE
                            || (size < track.curv_bin && track.curv_bin < curv_hi))
                })
            })
            .collect())
    }
}
