//! Peaks detected in a Hough accumulator.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A local maximum in physical grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    /// Curvature (column) coordinate.
    pub x: f64,
    /// Angular (row) coordinate.
    pub y: f64,
    /// Accumulator value at the peak bin.
    pub height: f64,
}

impl Peak {
    /// Creates a new peak.
    #[must_use]
    pub fn new(x: f64, y: f64, height: f64) -> Self {
        Self { x, y, height }
    }

    /// Euclidean distance to a point `(x, y)`.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    /// Euclidean distance to another peak, ignoring heights.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Peak) -> f64 {
        self.distance_to_point(other.x, other.y)
    }

    /// Returns true if `other` lies within `tolerance` (inclusive).
    #[inline]
    #[must_use]
    pub fn is_within_tolerance(&self, other: &Peak, tolerance: f64) -> bool {
        self.distance_to(other) <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Peak::new(0.0, 0.0, 1.0);
        let b = Peak::new(3.0, 4.0, 9.0);
        assert!((a.distance_to(&b) - 5.0).abs() < f64::EPSILON);
        assert!(a.is_within_tolerance(&b, 5.0));
        assert!(!a.is_within_tolerance(&b, 4.99));
    }
}
