//! Analysis configuration.

use crate::easing::Easing;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hough accumulator binning and square extraction parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HoughConfig {
    /// Number of angular (phi) bins.
    pub nbin_phi: u32,
    /// Number of curvature (q/pT) bins.
    pub nbin_qpt: u32,
    /// Half-width of the extracted squares (side is `2 * square_size`).
    pub square_size: usize,
    /// Maximum peak-to-track distance for a match (bins).
    pub tolerance: f64,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            nbin_phi: 7000,
            nbin_qpt: 216,
            square_size: 16,
            tolerance: 6.0,
        }
    }
}

impl HoughConfig {
    /// Sets the square half-width.
    #[must_use]
    pub fn with_square_size(mut self, size: usize) -> Self {
        self.square_size = size;
        self
    }

    /// Sets the matching tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the accumulator binning.
    #[must_use]
    pub fn with_binning(mut self, nbin_phi: u32, nbin_qpt: u32) -> Self {
        self.nbin_phi = nbin_phi;
        self.nbin_qpt = nbin_qpt;
        self
    }
}

/// Peak detection parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeakDetectionConfig {
    /// Minimum accumulator value of a peak.
    pub threshold_abs: f64,
    /// Minimum separation between peaks (bins).
    pub min_distance: usize,
    /// Gaussian smoothing applied before detection (0 = disabled).
    pub smooth_sigma: f64,
}

impl Default for PeakDetectionConfig {
    fn default() -> Self {
        Self {
            threshold_abs: 5.0,
            min_distance: 2,
            smooth_sigma: 0.0,
        }
    }
}

impl PeakDetectionConfig {
    /// Sets the absolute threshold.
    #[must_use]
    pub fn with_threshold_abs(mut self, threshold: f64) -> Self {
        self.threshold_abs = threshold;
        self
    }

    /// Sets the minimum peak distance.
    #[must_use]
    pub fn with_min_distance(mut self, distance: usize) -> Self {
        self.min_distance = distance;
        self
    }

    /// Sets the smoothing sigma.
    #[must_use]
    pub fn with_smooth_sigma(mut self, sigma: f64) -> Self {
        self.smooth_sigma = sigma;
        self
    }
}

/// Run-level processing parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcessingConfig {
    /// Slices to process; `-1` is the full-range pass.
    pub slice_list: Vec<i32>,
    /// Maximum number of histogram files to read.
    pub num_files: usize,
    /// Tracks need strictly more hits than this.
    pub min_hits: u32,
    /// Open vertex-z window `(lo, hi)`.
    pub vz_range: (f64, f64),
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            slice_list: vec![-1],
            num_files: 8,
            min_hits: 4,
            vz_range: (-200.0, 200.0),
        }
    }
}

impl ProcessingConfig {
    /// Sets the slice list.
    #[must_use]
    pub fn with_slices(mut self, slices: Vec<i32>) -> Self {
        self.slice_list = slices;
        self
    }

    /// Sets the file limit.
    #[must_use]
    pub fn with_num_files(mut self, num_files: usize) -> Self {
        self.num_files = num_files;
        self
    }

    /// Sets the vertex-z window.
    #[must_use]
    pub fn with_vz_range(mut self, lo: f64, hi: f64) -> Self {
        self.vz_range = (lo, hi);
        self
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    pub hough: HoughConfig,
    pub peak_detection: PeakDetectionConfig,
    pub processing: ProcessingConfig,
    pub easing: Easing,
}

impl AnalysisConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the Hough settings.
    #[must_use]
    pub fn with_hough(mut self, hough: HoughConfig) -> Self {
        self.hough = hough;
        self
    }

    /// Replaces the peak detection settings.
    #[must_use]
    pub fn with_peak_detection(mut self, peak_detection: PeakDetectionConfig) -> Self {
        self.peak_detection = peak_detection;
        self
    }

    /// Replaces the processing settings.
    #[must_use]
    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = processing;
        self
    }

    /// Sets the easing strategy.
    #[must_use]
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Sets the easing strategy by name.
    ///
    /// # Errors
    /// Returns [`Error::UnknownEasing`] for an unrecognized name.
    pub fn with_easing_name(self, name: &str) -> Result<Self> {
        Ok(self.with_easing(name.parse()?))
    }

    /// Checks the configuration before any processing starts.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] describing the first invalid value, or
    /// [`Error::InvalidSlice`] for a slice outside `[-1, 32]`.
    pub fn validate(&self) -> Result<()> {
        if self.hough.square_size == 0 {
            return Err(Error::ConfigError("square_size must be positive".into()));
        }
        if self.hough.tolerance.is_nan() || self.hough.tolerance < 0.0 {
            return Err(Error::ConfigError(format!(
                "tolerance must be non-negative, got {}",
                self.hough.tolerance
            )));
        }
        if self.hough.nbin_phi == 0 || self.hough.nbin_qpt == 0 {
            return Err(Error::ConfigError("bin counts must be positive".into()));
        }
        if self.peak_detection.min_distance == 0 {
            return Err(Error::ConfigError("min_distance must be positive".into()));
        }
        let sigma = self.peak_detection.smooth_sigma;
        if sigma.is_nan() || sigma < 0.0 {
            return Err(Error::ConfigError(format!(
                "smooth_sigma must be non-negative, got {sigma}"
            )));
        }
        if self.peak_detection.threshold_abs.is_nan() {
            return Err(Error::ConfigError("threshold_abs must be a number".into()));
        }
        let (lo, hi) = self.processing.vz_range;
        if lo.is_nan() || hi.is_nan() || lo >= hi {
            return Err(Error::ConfigError(format!(
                "vz_range ({lo}, {hi}) is empty"
            )));
        }
        if let Some(&slice) = self
            .processing
            .slice_list
            .iter()
            .find(|&&s| !(-1..=32).contains(&s))
        {
            return Err(Error::InvalidSlice(slice));
        }
        Ok(())
    }
}
