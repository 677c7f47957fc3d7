//! Binary histogram container.
//!
//! Layout (little-endian):
//!
//! ```text
//! "HGRM" | version: u32 | count: u32
//! count x { name_len: u32 | name: utf-8 | rows: u64 | cols: u64
//!           | row_edges: (rows + 1) x f64 | col_edges: (cols + 1) x f64
//!           | values: rows * cols x f64, row-major }
//! ```
//!
//! Rows are the angular axis and columns the curvature axis.
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use houghpix_core::{BinEdges, HoughHistogram};
use log::warn;
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// File magic.
pub const HISTOGRAM_MAGIC: &[u8; 4] = b"HGRM";
/// Current format version.
pub const HISTOGRAM_VERSION: u32 = 1;

const HEADER_LEN: usize = 12;

/// Extracts `(event_id, slice_num)` from a histogram name.
///
/// Names look like `<prefix>_<event>_<slice>`; `;` is accepted as a separator
/// too, so a trailing cycle number (`h_12_-1;1`) is ignored.
///
/// # Errors
/// Returns [`Error::InvalidHistogramName`] if either field is missing or not
/// an integer.
pub fn parse_histogram_name(name: &str) -> Result<(u64, i32)> {
    let invalid = || Error::InvalidHistogramName(name.to_string());
    let mut parts = name.split(['_', ';']).skip(1);
    let event_id = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    let slice_num = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
    Ok((event_id, slice_num))
}

/// Lists files in `dir` named `<prefix>*.<extension>`, sorted by path.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn find_histogram_files<P: AsRef<Path>>(
    dir: P,
    prefix: &str,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(prefix));
        let ext_matches = path.extension().and_then(|e| e.to_str()) == Some(extension);
        if name_matches && ext_matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Location and shape of one record inside a mapped file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramEntry {
    /// Histogram name.
    pub name: String,
    /// Number of angular bins.
    pub rows: usize,
    /// Number of curvature bins.
    pub cols: usize,
    offset: usize,
}

/// Index of a record whose name parsed to an event and slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedEntry {
    /// Position in [`HistogramFileReader::entries`].
    pub index: usize,
    /// Event the histogram belongs to.
    pub event_id: u64,
    /// Slice of the histogram.
    pub slice_num: i32,
}

struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "unexpected end of data at offset {} (need {} bytes)",
                    self.pos, len
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn len_u64(&mut self) -> Result<usize> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        usize::try_from(u64::from_le_bytes(buf))
            .map_err(|_| Error::InvalidFormat("dimension does not fit in memory".to_string()))
    }

    fn f64s(&mut self, count: usize) -> Result<Vec<f64>> {
        let len = count
            .checked_mul(8)
            .ok_or_else(|| Error::InvalidFormat("array length overflow".to_string()))?;
        Ok(self
            .take(len)?
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect())
    }

    fn skip_f64s(&mut self, count: usize) -> Result<()> {
        let len = count
            .checked_mul(8)
            .ok_or_else(|| Error::InvalidFormat("array length overflow".to_string()))?;
        self.take(len).map(|_| ())
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::InvalidFormat(format!("histogram name is not utf-8: {e}")))
    }
}

/// Memory-mapped reader for histogram container files.
///
/// Opening a file only indexes the records; grids are decoded on demand.
pub struct HistogramFileReader {
    mmap: Mmap,
    path: PathBuf,
    entries: Vec<HistogramEntry>,
    decoded: AtomicUsize,
}

impl HistogramFileReader {
    /// Opens and indexes a histogram file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or its header or record
    /// table is malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        let entries = index_records(&mmap)?;
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
            entries,
            decoded: AtomicUsize::new(0),
        })
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapped file in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }

    /// Record index.
    #[must_use]
    pub fn entries(&self) -> &[HistogramEntry] {
        &self.entries
    }

    /// Number of histograms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the file holds no histograms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decodes histogram `index`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for an out-of-range index or a corrupt
    /// record.
    pub fn read(&self, index: usize) -> Result<HoughHistogram> {
        let entry = self.entries.get(index).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "histogram index {index} out of range ({} records)",
                self.entries.len()
            ))
        })?;
        self.decoded.fetch_add(1, Ordering::Relaxed);
        let mut cursor = ByteCursor::new(&self.mmap, entry.offset);
        let name = cursor.name()?;
        let rows = cursor.len_u64()?;
        let cols = cursor.len_u64()?;
        let (row_edge_count, col_edge_count, cells) = record_lengths(&name, rows, cols)?;
        let row_edges = cursor.f64s(row_edge_count)?;
        let col_edges = cursor.f64s(col_edge_count)?;
        let values = cursor.f64s(cells)?;
        Ok(HoughHistogram::from_row_major(
            name,
            rows,
            cols,
            values,
            BinEdges::new(row_edges, col_edges),
        )?)
    }

    /// Iterates over all histograms in file order.
    pub fn iter(&self) -> impl Iterator<Item = Result<HoughHistogram>> + '_ {
        (0..self.entries.len()).map(move |i| self.read(i))
    }

    /// Number of records decoded so far through [`Self::read`].
    #[must_use]
    pub fn decoded_count(&self) -> usize {
        self.decoded.load(Ordering::Relaxed)
    }

    /// Event and slice of every record, without decoding any grid.
    ///
    /// Records whose name cannot be parsed are logged and skipped.
    #[must_use]
    pub fn tagged_entries(&self) -> Vec<TaggedEntry> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match parse_histogram_name(&entry.name) {
                Ok((event_id, slice_num)) => Some(TaggedEntry {
                    index,
                    event_id,
                    slice_num,
                }),
                Err(e) => {
                    warn!("{}: skipping record {index}: {e}", self.path.display());
                    None
                }
            })
            .collect()
    }

    /// Iterates over histograms tagged with their parsed event and slice.
    ///
    /// Records whose name cannot be parsed are logged and skipped.
    pub fn iter_tagged(&self) -> impl Iterator<Item = Result<(HoughHistogram, u64, i32)>> + '_ {
        self.tagged_entries().into_iter().map(move |tag| {
            self.read(tag.index)
                .map(|h| (h, tag.event_id, tag.slice_num))
        })
    }
}

/// Edge and cell counts of a `rows x cols` record.
fn record_lengths(name: &str, rows: usize, cols: usize) -> Result<(usize, usize, usize)> {
    let overflow = || Error::InvalidFormat(format!("{name}: grid size overflow"));
    Ok((
        rows.checked_add(1).ok_or_else(overflow)?,
        cols.checked_add(1).ok_or_else(overflow)?,
        rows.checked_mul(cols).ok_or_else(overflow)?,
    ))
}

fn index_records(data: &[u8]) -> Result<Vec<HistogramEntry>> {
    let mut cursor = ByteCursor::new(data, 0);
    let magic = cursor.take(4).map_err(|_| {
        Error::InvalidFormat("file too short for histogram header".to_string())
    })?;
    if magic != HISTOGRAM_MAGIC {
        return Err(Error::InvalidFormat("missing HGRM magic".to_string()));
    }
    let version = cursor.u32()?;
    if version != HISTOGRAM_VERSION {
        return Err(Error::InvalidFormat(format!(
            "unsupported histogram format version {version}"
        )));
    }
    let count = cursor.u32()? as usize;

    let mut entries = Vec::with_capacity(count.min(data.len() / HEADER_LEN));
    for _ in 0..count {
        let offset = cursor.pos;
        let name = cursor.name()?;
        let rows = cursor.len_u64()?;
        let cols = cursor.len_u64()?;
        let (row_edges, col_edges, cells) = record_lengths(&name, rows, cols)?;
        cursor.skip_f64s(row_edges)?;
        cursor.skip_f64s(col_edges)?;
        cursor.skip_f64s(cells)?;
        entries.push(HistogramEntry {
            name,
            rows,
            cols,
            offset,
        });
    }
    if cursor.pos != data.len() {
        warn!(
            "{} trailing bytes after {count} histogram records",
            data.len() - cursor.pos
        );
    }
    Ok(entries)
}

/// Writer for histogram container files.
pub struct HistogramFileWriter {
    writer: BufWriter<File>,
    count: u32,
}

impl HistogramFileWriter {
    /// Creates a file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(HISTOGRAM_MAGIC)?;
        writer.write_all(&HISTOGRAM_VERSION.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self { writer, count: 0 })
    }

    /// Appends one histogram.
    ///
    /// # Errors
    /// Returns an error on write failure or if the record count overflows.
    pub fn write(&mut self, histogram: &HoughHistogram) -> Result<()> {
        let name = histogram.name.as_bytes();
        let name_len = u32::try_from(name.len())
            .map_err(|_| Error::InvalidFormat("histogram name too long".to_string()))?;
        self.count = self
            .count
            .checked_add(1)
            .ok_or_else(|| Error::InvalidFormat("too many histograms".to_string()))?;

        let (rows, cols) = histogram.shape();
        self.writer.write_all(&name_len.to_le_bytes())?;
        self.writer.write_all(name)?;
        self.writer.write_all(&(rows as u64).to_le_bytes())?;
        self.writer.write_all(&(cols as u64).to_le_bytes())?;
        for v in histogram.edges().row.iter().chain(&histogram.edges().col) {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        for v in histogram.values() {
            self.writer.write_all(&v.to_le_bytes())?;
        }
        Ok(())
    }

    /// Writes the record count and flushes.
    ///
    /// # Errors
    /// Returns an error if the header cannot be updated.
    pub fn finish(mut self) -> Result<()> {
        self.writer.seek(SeekFrom::Start(8))?;
        self.writer.write_all(&self.count.to_le_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}
