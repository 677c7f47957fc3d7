//! Easing functions mapping slice positions to cotangent bounds.
//!
//! Every variant is defined on `[-32, 32]` and fixes the points
//! `-32 -> -32`, `0 -> 0` and `32 -> 32`.

use crate::error::{Error, Result};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-width of the easing domain.
pub const EASING_RANGE: f64 = 32.0;

/// Easing strategy used to shape the cotangent slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Easing {
    /// Identity.
    Linear,
    /// `sign(x) * 32 * (1 - cos(x * pi / 64))`
    InSine,
    /// `sign(x) * 32 * x^2 / 1024`
    #[default]
    InSquare,
    /// `32 * x^3 / 32768`
    InCubic,
    /// `sign(x) * (32 - sqrt(1024 - x^2))`
    InCirc,
}

impl Easing {
    /// All strategies in registration order.
    pub const ALL: [Easing; 5] = [
        Easing::Linear,
        Easing::InSine,
        Easing::InSquare,
        Easing::InCubic,
        Easing::InCirc,
    ];

    /// Applies the easing function.
    ///
    /// `InCirc` is only defined for `|x| <= 32`; outside that range it returns NaN.
    #[must_use]
    pub fn ease(self, x: f64) -> f64 {
        match self {
            Easing::Linear => x,
            Easing::InSine => sign(x) * EASING_RANGE * (1.0 - (x * PI / 64.0).cos()),
            Easing::InSquare => sign(x) * EASING_RANGE * (x * x / 1024.0),
            Easing::InCubic => EASING_RANGE * (x * x * x / 32768.0),
            Easing::InCirc => sign(x) * (EASING_RANGE - (1024.0 - x * x).sqrt()),
        }
    }

    /// Returns the configuration name of the strategy.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "Linear",
            Easing::InSine => "InSine",
            Easing::InSquare => "InSquare",
            Easing::InCubic => "InCubic",
            Easing::InCirc => "InCirc",
        }
    }

    /// Comma separated list of the accepted names.
    #[must_use]
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Sign with `sign(0) == 0`, unlike `f64::signum`.
#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Easing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| Error::UnknownEasing {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}
