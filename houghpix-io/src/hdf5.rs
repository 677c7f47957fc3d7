//! HDF5 histogram input and training-sample output.
//!
//! Histogram files hold one group per accumulator under `/histograms`, each
//! with a 2-D `counts` dataset and `phi_edges` / `qpt_edges` axis datasets.
//! Training files hold `/training/X` (n, side, side), `/training/y` (n) and
//! `/training/centers` (n, 2) as `(x, y)` pairs.
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use houghpix_core::{BinEdges, HoughHistogram, SquareCollection};
use ndarray::Array2;
use std::path::Path;
use std::str::FromStr;

const FORMAT_VERSION: &str = "0.1";
const HISTOGRAM_GROUP: &str = "histograms";
const TRAINING_GROUP: &str = "training";

/// Options for training-sample HDF5 output.
#[derive(Clone, Debug)]
pub struct TrainingWriteOptions {
    /// Squares per chunk along the sample axis.
    pub chunk_squares: usize,
    /// Gzip level, if any.
    pub compression: Option<u8>,
    /// Enables the shuffle filter.
    pub shuffle: bool,
}

impl Default for TrainingWriteOptions {
    fn default() -> Self {
        Self {
            chunk_squares: 256,
            compression: Some(4),
            shuffle: true,
        }
    }
}

/// Writes the squares as `X`/`y` training arrays, true positives first.
///
/// An empty collection produces a file with zero-length datasets.
///
/// # Errors
/// Returns an error if the squares differ in size or HDF5 I/O fails.
pub fn write_training_hdf5<P: AsRef<Path>>(
    path: P,
    squares: &SquareCollection,
    options: &TrainingWriteOptions,
) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "houghpix_format_version", FORMAT_VERSION)?;

    let group = file.create_group(TRAINING_GROUP)?;
    set_attr_str_group(&group, "signal", "X")?;
    let summary = squares.summary();
    set_attr_u64(&group, "true_positives", summary.true_positives as u64)?;
    set_attr_u64(&group, "false_positives", summary.false_positives as u64)?;

    let side = squares.iter().next().map_or(0, |s| s.size());
    let n = squares.len();
    let chunk = options.chunk_squares.clamp(1, n.max(1));

    let chunked = n > 0 && side > 0;
    let x_ds = create_fixed_dataset::<f64, _>(
        &group,
        "X",
        (n, side, side),
        chunked.then_some([chunk, side, side]),
        options.compression.filter(|_| chunked),
        options.shuffle && chunked,
    )?;
    let y_ds = create_fixed_dataset::<f64, _>(&group, "y", (n,), None, None, false)?;
    let centers_ds = create_fixed_dataset::<f64, _>(&group, "centers", (n, 2), None, None, false)?;
    if n == 0 {
        return Ok(());
    }

    let (x, y) = squares
        .training_data()
        .ok_or_else(|| Error::InvalidFormat("training squares differ in size".to_string()))?;
    x_ds.write(x.view())?;
    y_ds.write(y.view())?;

    let centers: Vec<f64> = squares
        .iter()
        .flat_map(|s| [s.center_x, s.center_y])
        .collect();
    centers_ds.write_raw(&centers)?;

    Ok(())
}

/// Reads training arrays written by [`write_training_hdf5`].
///
/// # Errors
/// Returns an error if HDF5 I/O fails or the datasets are inconsistent.
pub fn read_training_hdf5<P: AsRef<Path>>(
    path: P,
) -> Result<(ndarray::Array3<f64>, ndarray::Array1<f64>)> {
    let file = File::open(path)?;
    let group = file.group(TRAINING_GROUP)?;
    let x = group.dataset("X")?.read::<f64, ndarray::Ix3>()?;
    let y = group.dataset("y")?.read_1d::<f64>()?;
    if x.dim().0 != y.len() {
        return Err(Error::InvalidFormat(format!(
            "X holds {} squares but y holds {} labels",
            x.dim().0,
            y.len()
        )));
    }
    Ok((x, y))
}

/// Writes histograms into an HDF5 file, one group per histogram.
///
/// # Errors
/// Returns an error if a name is not a valid group name or HDF5 I/O fails.
pub fn write_histograms_hdf5<'a, P, I>(path: P, histograms: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a HoughHistogram>,
{
    let file = File::create(path)?;
    set_attr_str_file(&file, "houghpix_format_version", FORMAT_VERSION)?;
    let root = file.create_group(HISTOGRAM_GROUP)?;

    for histogram in histograms {
        if histogram.name.is_empty() || histogram.name.contains('/') {
            return Err(Error::InvalidFormat(format!(
                "'{}' is not a valid HDF5 group name",
                histogram.name
            )));
        }
        let group = root.create_group(&histogram.name)?;
        set_attr_str_group(&group, "signal", "counts")?;

        let (rows, cols) = histogram.shape();
        let counts = create_fixed_dataset::<f64, _>(&group, "counts", (rows, cols), None, None, false)?;
        counts.write(histogram.values())?;

        let edges = histogram.edges();
        create_fixed_dataset::<f64, _>(&group, "phi_edges", (edges.row.len(),), None, None, false)?
            .write_raw(&edges.row)?;
        create_fixed_dataset::<f64, _>(&group, "qpt_edges", (edges.col.len(),), None, None, false)?
            .write_raw(&edges.col)?;
    }
    Ok(())
}

/// Reads every histogram of an HDF5 file in group-name order.
///
/// Missing edge datasets fall back to unit-width edges.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or a group is malformed.
pub fn read_histograms_hdf5<P: AsRef<Path>>(path: P) -> Result<Vec<HoughHistogram>> {
    read_histograms_hdf5_where(path, |_| true)
}

/// Reads the histograms whose group name passes `keep`; other groups are
/// never loaded.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or a kept group is malformed.
pub fn read_histograms_hdf5_where<P, F>(path: P, mut keep: F) -> Result<Vec<HoughHistogram>>
where
    P: AsRef<Path>,
    F: FnMut(&str) -> bool,
{
    let file = File::open(path)?;
    let root = file.group(HISTOGRAM_GROUP)?;
    let mut names = root.member_names()?;
    names.sort();

    names
        .iter()
        .filter(|name| keep(name.as_str()))
        .map(|name| read_histogram_group(&root.group(name)?, name))
        .collect()
}

fn read_histogram_group(group: &Group, name: &str) -> Result<HoughHistogram> {
    let counts_ds = group.dataset("counts")?;
    if counts_ds.ndim() != 2 {
        return Err(Error::InvalidFormat(format!(
            "{name}: counts dataset must be 2-D (phi, qpt)"
        )));
    }
    let values: Array2<f64> = counts_ds.read_2d()?;
    let (rows, cols) = values.dim();

    let edges = match (
        read_dataset_vec_opt::<f64>(group, "phi_edges")?,
        read_dataset_vec_opt::<f64>(group, "qpt_edges")?,
    ) {
        (Some(row), Some(col)) => BinEdges::new(row, col),
        _ => BinEdges::unit(rows, cols),
    };

    Ok(HoughHistogram::new(name, values, edges)?)
}

fn create_fixed_dataset<T: H5Type, S>(
    group: &Group,
    name: &str,
    shape: S,
    chunk: Option<[usize; 3]>,
    compression: Option<u8>,
    shuffle: bool,
) -> Result<Dataset>
where
    S: Into<hdf5::Extents>,
{
    let mut builder = group.new_dataset::<T>().shape(shape);

    if let Some(chunk_shape) = chunk {
        builder = builder.chunk(chunk_shape);
    }

    if let Some(level) = compression {
        builder = builder.deflate(level);
    }

    if shuffle {
        builder = builder.shuffle();
    }

    Ok(builder.create(name)?)
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_u64(group: &Group, name: &str, value: u64) -> Result<()> {
    group.new_attr::<u64>().create(name)?.write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec_opt<T: H5Type>(group: &Group, name: &str) -> Result<Option<Vec<T>>> {
    match group.dataset(name) {
        Ok(dataset) => Ok(Some(dataset.read_raw::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
