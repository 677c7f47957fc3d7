//! Hough accumulator grids and their bin edges.
//!
//! Rows index the angular (phi) axis and columns the curvature (q/pT) axis.
//! Physical coordinates follow the same convention everywhere: `y` is the
//! row (angular) coordinate and `x` the column (curvature) coordinate.
#![allow(clippy::cast_precision_loss, clippy::doc_markdown)]

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bin edges for both grid axes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinEdges {
    /// Angular (row) edges, `rows + 1` entries.
    pub row: Vec<f64>,
    /// Curvature (column) edges, `cols + 1` entries.
    pub col: Vec<f64>,
}

impl BinEdges {
    /// Creates edges from explicit sequences.
    #[must_use]
    pub fn new(row: Vec<f64>, col: Vec<f64>) -> Self {
        Self { row, col }
    }

    /// Unit-width edges `[-0.5, 0.5, ...]` so that bin centers equal bin indices.
    #[must_use]
    pub fn unit(rows: usize, cols: usize) -> Self {
        let axis = |n: usize| (0..=n).map(|i| i as f64 - 0.5).collect();
        Self {
            row: axis(rows),
            col: axis(cols),
        }
    }

    /// Midpoints of the row edges.
    #[must_use]
    pub fn row_centers(&self) -> Vec<f64> {
        centers(&self.row)
    }

    /// Midpoints of the column edges.
    #[must_use]
    pub fn col_centers(&self) -> Vec<f64> {
        centers(&self.col)
    }

    /// Checks the edge lengths against a grid of `rows x cols` bins.
    ///
    /// # Errors
    /// Returns [`Error::EdgeMismatch`] if either axis has the wrong number of edges.
    pub fn validate(&self, rows: usize, cols: usize) -> Result<()> {
        check_axis("row", rows, self.row.len())?;
        check_axis("column", cols, self.col.len())
    }
}

fn centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

fn check_axis(axis: &'static str, bins: usize, edges: usize) -> Result<()> {
    if edges.checked_sub(1) != Some(bins) {
        return Err(Error::EdgeMismatch {
            axis,
            bins,
            expected: bins.saturating_add(1),
            edges,
        });
    }
    Ok(())
}

/// Replaces NaN and infinities with zero in place.
///
/// Returns the number of replaced cells.
pub fn sanitize(values: &mut Array2<f64>) -> usize {
    let mut replaced = 0;
    values.mapv_inplace(|v| {
        if v.is_finite() {
            v
        } else {
            replaced += 1;
            0.0
        }
    });
    replaced
}

/// A 2D Hough accumulator with its bin edges.
#[derive(Debug, Clone, PartialEq)]
pub struct HoughHistogram {
    /// Histogram name as stored in the source file.
    pub name: String,
    values: Array2<f64>,
    edges: BinEdges,
}

impl HoughHistogram {
    /// Creates a histogram, validating the edges against the grid shape.
    ///
    /// # Errors
    /// Returns [`Error::EdgeMismatch`] if the edges do not fit the grid.
    pub fn new(name: impl Into<String>, values: Array2<f64>, edges: BinEdges) -> Result<Self> {
        let (rows, cols) = values.dim();
        edges.validate(rows, cols)?;
        Ok(Self {
            name: name.into(),
            values,
            edges,
        })
    }

    /// Creates a histogram from row-major data.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `data` does not hold `rows * cols` values
    /// and [`Error::EdgeMismatch`] if the edges do not fit.
    pub fn from_row_major(
        name: impl Into<String>,
        rows: usize,
        cols: usize,
        data: Vec<f64>,
        edges: BinEdges,
    ) -> Result<Self> {
        let actual = data.len();
        let values = Array2::from_shape_vec((rows, cols), data).map_err(|_| Error::ShapeMismatch {
            rows,
            cols,
            expected: rows * cols,
            actual,
        })?;
        Self::new(name, values, edges)
    }

    /// Raw accumulator values.
    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Bin edges.
    #[must_use]
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Grid shape as `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Returns a copy of the values with non-finite cells set to zero.
    #[must_use]
    pub fn sanitized(&self) -> Array2<f64> {
        let mut values = self.values.clone();
        sanitize(&mut values);
        values
    }

    /// Consumes the histogram, returning values and edges.
    #[must_use]
    pub fn into_parts(self) -> (Array2<f64>, BinEdges) {
        (self.values, self.edges)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use ndarray::array;

    #[test]
    fn test_unit_edges_centers() {
        let edges = BinEdges::unit(3, 2);
        assert_eq!(edges.row.len(), 4);
        assert_eq!(edges.row_centers(), vec![0.0, 1.0, 2.0]);
        assert_eq!(edges.col_centers(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_centers_are_midpoints() {
        let edges = BinEdges::new(vec![0.0, 2.0, 6.0], vec![-1.0, 1.0]);
        assert_eq!(edges.row_centers(), vec![1.0, 4.0]);
        assert_eq!(edges.col_centers(), vec![0.0]);
    }

    #[test]
    fn test_edge_validation() {
        let values = Array2::<f64>::zeros((3, 4));
        let bad = BinEdges::new(vec![0.0; 4], vec![0.0; 4]);
        let err = HoughHistogram::new("h", values.clone(), bad).unwrap_err();
        assert!(matches!(err, Error::EdgeMismatch { axis: "column", .. }));

        let ok = HoughHistogram::new("h", values, BinEdges::unit(3, 4)).unwrap();
        assert_eq!(ok.shape(), (3, 4));
    }

    #[test]
    fn test_edge_validation_with_huge_bin_count() {
        let edges = BinEdges::new(Vec::new(), vec![0.0]);
        assert!(matches!(
            edges.validate(usize::MAX, 0),
            Err(Error::EdgeMismatch { axis: "row", .. })
        ));
        assert!(BinEdges::unit(0, 0).validate(0, 0).is_ok());
    }

    #[test]
    fn test_from_row_major_shape_mismatch() {
        let err =
            HoughHistogram::from_row_major("h", 2, 2, vec![1.0; 3], BinEdges::unit(2, 2)).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                rows: 2,
                cols: 2,
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn test_sanitize() {
        let mut values = array![[1.0, f64::NAN], [f64::INFINITY, f64::NEG_INFINITY]];
        let replaced = sanitize(&mut values);
        assert_eq!(replaced, 3);
        assert_eq!(values, array![[1.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_sanitized_leaves_source_untouched() {
        let values = array![[f64::NAN, 2.0]];
        let hist = HoughHistogram::new("h", values, BinEdges::unit(1, 2)).unwrap();
        let clean = hist.sanitized();
        assert_eq!(clean[[0, 0]], 0.0);
        assert!(hist.values()[[0, 0]].is_nan());
    }
}
