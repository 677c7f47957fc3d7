//! Classified windows ("squares") cut around detected peaks.
#![allow(clippy::cast_precision_loss)]

use ndarray::{Array1, Array2, Array3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Label attached to an extracted square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SquareClassification {
    /// A ground-truth track lies within tolerance of the peak.
    TruePositive,
    /// No unclaimed ground-truth track within tolerance.
    FalsePositive,
}

impl SquareClassification {
    /// Training label: 1.0 for true positives, 0.0 otherwise.
    #[must_use]
    pub fn label(self) -> f64 {
        match self {
            SquareClassification::TruePositive => 1.0,
            SquareClassification::FalsePositive => 0.0,
        }
    }
}

/// A square window copied from the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSquare {
    /// Window contents, always `side x side`.
    pub data: Array2<f64>,
    /// Classification of the window.
    pub classification: SquareClassification,
    /// Curvature coordinate of the window center.
    pub center_x: f64,
    /// Angular coordinate of the window center.
    pub center_y: f64,
}

impl ClassifiedSquare {
    /// Side length of the window.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    /// Returns true for true-positive squares.
    #[must_use]
    pub fn is_true_positive(&self) -> bool {
        self.classification == SquareClassification::TruePositive
    }

    /// Maximum value in the window.
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Mean value of the window.
    #[must_use]
    pub fn mean_value(&self) -> f64 {
        self.data.mean().unwrap_or(0.0)
    }
}

/// Summary counts for a [`SquareCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SquareSummary {
    pub true_positives: usize,
    pub false_positives: usize,
    pub total: usize,
    pub true_positive_ratio: f64,
}

/// Accumulated training squares, true and false positives kept apart.
#[derive(Debug, Clone, Default)]
pub struct SquareCollection {
    true_positives: Vec<ClassifiedSquare>,
    false_positives: Vec<ClassifiedSquare>,
}

impl SquareCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a square to the list matching its classification.
    pub fn push(&mut self, square: ClassifiedSquare) {
        match square.classification {
            SquareClassification::TruePositive => self.true_positives.push(square),
            SquareClassification::FalsePositive => self.false_positives.push(square),
        }
    }

    /// True-positive squares in insertion order.
    #[must_use]
    pub fn true_positives(&self) -> &[ClassifiedSquare] {
        &self.true_positives
    }

    /// False-positive squares in insertion order.
    #[must_use]
    pub fn false_positives(&self) -> &[ClassifiedSquare] {
        &self.false_positives
    }

    /// Number of squares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.true_positives.len() + self.false_positives.len()
    }

    /// Returns true if no squares were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates true positives first, then false positives.
    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedSquare> {
        self.true_positives.iter().chain(self.false_positives.iter())
    }

    /// Removes all squares.
    pub fn clear(&mut self) {
        self.true_positives.clear();
        self.false_positives.clear();
    }

    /// Counts and ratio of true positives.
    #[must_use]
    pub fn summary(&self) -> SquareSummary {
        let total = self.len();
        SquareSummary {
            true_positives: self.true_positives.len(),
            false_positives: self.false_positives.len(),
            total,
            true_positive_ratio: if total > 0 {
                self.true_positives.len() as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Stacks the squares into `(X, y)` training arrays.
    ///
    /// `X` has shape `(n, side, side)`, true positives first. Returns `None`
    /// for an empty collection or when square sizes disagree.
    #[must_use]
    pub fn training_data(&self) -> Option<(Array3<f64>, Array1<f64>)> {
        let views: Vec<_> = self.iter().map(|s| s.data.view()).collect();
        if views.is_empty() {
            return None;
        }
        let x = ndarray::stack(Axis(0), &views).ok()?;
        let y = self.iter().map(|s| s.classification.label()).collect();
        Some((x, y))
    }
}

impl Extend<ClassifiedSquare> for SquareCollection {
    fn extend<I: IntoIterator<Item = ClassifiedSquare>>(&mut self, iter: I) {
        for square in iter {
            self.push(square);
        }
    }
}
