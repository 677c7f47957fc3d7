//! Separable Gaussian smoothing with mirrored borders.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Kernel extent in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Smooths `grid` with an isotropic Gaussian of standard deviation `sigma`.
///
/// The kernel radius is `round(4·sigma)`; samples beyond the border mirror
/// back including the edge cell (`d c b a | a b c d`). A non-positive sigma
/// returns an unchanged copy.
#[must_use]
pub fn gaussian_filter(grid: ArrayView2<'_, f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 || grid.is_empty() {
        return grid.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_axis(grid, &kernel, Axis(0));
    convolve_axis(rows.view(), &kernel, Axis(1))
}

fn gaussian_kernel(sigma: f64) -> Array1<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as i64;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Array1<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / denom).exp())
        .collect();
    let sum = kernel.sum();
    kernel /= sum;
    kernel
}

fn reflect(index: i64, len: usize) -> usize {
    let len = len as i64;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    (if m < len { m } else { period - 1 - m }) as usize
}

fn convolve_axis(input: ArrayView2<'_, f64>, kernel: &Array1<f64>, axis: Axis) -> Array2<f64> {
    let radius = (kernel.len() / 2) as i64;
    let mut output = Array2::zeros(input.raw_dim());
    for (src, mut dst) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let n = src.len();
        for (i, out) in dst.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * src[reflect(i as i64 + k as i64 - radius, n)])
                .sum();
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_sigma_is_identity() {
        let grid = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f64);
        assert_eq!(gaussian_filter(grid.view(), 0.0), grid);
    }

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect(-1, 4), 0);
        assert_eq!(reflect(-2, 4), 1);
        assert_eq!(reflect(4, 4), 3);
        assert_eq!(reflect(5, 4), 2);
        assert_eq!(reflect(9, 4), 1);
        assert_eq!(reflect(2, 4), 2);
    }

    #[test]
    fn test_kernel_normalized() {
        let kernel = gaussian_kernel(1.5);
        assert_eq!(kernel.len(), 13);
        assert_relative_eq!(kernel.sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(kernel[0], kernel[12]);
    }

    #[test]
    fn test_constant_grid_unchanged() {
        let grid = Array2::from_elem((6, 7), 3.0);
        let smoothed = gaussian_filter(grid.view(), 2.0);
        for v in &smoothed {
            assert_relative_eq!(*v, 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mass_preserved_and_peak_kept() {
        let mut grid = Array2::<f64>::zeros((41, 41));
        grid[[20, 20]] = 100.0;
        let smoothed = gaussian_filter(grid.view(), 1.0);
        assert_relative_eq!(smoothed.sum(), 100.0, epsilon = 1e-9);

        let max = smoothed.iter().copied().fold(f64::MIN, f64::max);
        assert_relative_eq!(smoothed[[20, 20]], max);
        assert!(smoothed[[20, 20]] < 100.0);
        assert_relative_eq!(smoothed[[19, 20]], smoothed[[21, 20]]);
        assert_relative_eq!(smoothed[[20, 19]], smoothed[[19, 20]]);
    }
}
