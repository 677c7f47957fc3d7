//! Output writers for training squares and ground-truth tracks.
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use houghpix_core::{ClassifiedSquare, SquareClassification, SquareCollection, TrackTable};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Training file magic.
pub const TRAINING_MAGIC: &[u8; 4] = b"HSQR";
/// Training file version.
pub const TRAINING_VERSION: u32 = 1;

/// CSV header of the track table.
pub const TRACK_CSV_HEADER: &str =
    "event_id,phi_bin,curv_bin,eta,vz,number_of_hits,pz_over_pt,particle_type,phi,pt,pz,reco";

/// Writer for the binary training-sample format.
///
/// Format: "HSQR" | version: u32 | count: u64 | side: u32, then for each
/// square: label: u8 (1 = true positive) + center_x: f64 + center_y: f64 +
/// side * side f64 values in row-major order. True positives come first.
pub struct TrainingDataWriter {
    writer: BufWriter<File>,
}

impl TrainingDataWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes the whole collection.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if square sizes differ, or an I/O error.
    pub fn write_squares(&mut self, squares: &SquareCollection) -> Result<()> {
        let side = squares.iter().next().map_or(0, ClassifiedSquare::size);
        if let Some(bad) = squares.iter().find(|s| s.data.dim() != (side, side)) {
            return Err(Error::InvalidFormat(format!(
                "square of shape {:?} in a {side}x{side} training set",
                bad.data.dim()
            )));
        }
        let side_u32 = u32::try_from(side)
            .map_err(|_| Error::InvalidFormat(format!("square side {side} too large")))?;

        self.writer.write_all(TRAINING_MAGIC)?;
        self.writer.write_all(&TRAINING_VERSION.to_le_bytes())?;
        self.writer.write_all(&(squares.len() as u64).to_le_bytes())?;
        self.writer.write_all(&side_u32.to_le_bytes())?;

        for square in squares.iter() {
            self.writer.write_all(&[u8::from(square.is_true_positive())])?;
            self.writer.write_all(&square.center_x.to_le_bytes())?;
            self.writer.write_all(&square.center_y.to_le_bytes())?;
            for v in &square.data {
                self.writer.write_all(&v.to_le_bytes())?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a file produced by [`TrainingDataWriter`].
///
/// # Errors
/// Returns an error if the file is unreadable or malformed.
pub fn read_training_data<P: AsRef<Path>>(path: P) -> Result<SquareCollection> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let mut input = bytes.as_slice();

    let mut magic = [0u8; 4];
    input.read_exact(&mut magic)?;
    if &magic != TRAINING_MAGIC {
        return Err(Error::InvalidFormat("missing HSQR magic".to_string()));
    }
    let version = read_u32(&mut input)?;
    if version != TRAINING_VERSION {
        return Err(Error::InvalidFormat(format!(
            "unsupported training format version {version}"
        )));
    }
    let count = read_u64(&mut input)?;
    let side = read_u32(&mut input)? as usize;

    let mut squares = SquareCollection::new();
    for _ in 0..count {
        let mut label = [0u8; 1];
        input.read_exact(&mut label)?;
        let center_x = read_f64(&mut input)?;
        let center_y = read_f64(&mut input)?;
        let values = (0..side * side)
            .map(|_| read_f64(&mut input))
            .collect::<Result<Vec<_>>>()?;
        let data = Array2::from_shape_vec((side, side), values)
            .map_err(|e| Error::InvalidFormat(e.to_string()))?;
        squares.push(ClassifiedSquare {
            data,
            classification: if label[0] == 1 {
                SquareClassification::TruePositive
            } else {
                SquareClassification::FalsePositive
            },
            center_x,
            center_y,
        });
    }
    Ok(squares)
}

fn read_u32(input: &mut &[u8]) -> Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(input: &mut &[u8]) -> Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(input: &mut &[u8]) -> Result<f64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Writer for the ground-truth track table as CSV.
pub struct TrackCsvWriter {
    writer: BufWriter<File>,
}

impl TrackCsvWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes the tracks of `events`, in that order, with their final flags.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an I/O error if writing fails.
    pub fn write_tracks(&mut self, table: &TrackTable, events: &[u64]) -> Result<usize> {
        writeln!(self.writer, "{TRACK_CSV_HEADER}")?;

        let mut rows = 0;
        for &event_id in events {
            for t in table.resolve(table.event_tracks(event_id)) {
                writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{},{},{},{},{},{}",
                    t.event_id,
                    t.phi_bin,
                    t.curv_bin,
                    t.eta,
                    t.vz,
                    t.number_of_hits,
                    t.cot,
                    t.particle_type,
                    t.phi,
                    t.pt,
                    t.pz,
                    u8::from(t.reconstructed)
                )?;
                rows += 1;
            }
        }

        self.writer.flush()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use houghpix_core::TrueTrack;
    use tempfile::NamedTempFile;

    fn square(value: f64, classification: SquareClassification) -> ClassifiedSquare {
        ClassifiedSquare {
            data: Array2::from_elem((4, 4), value),
            classification,
            center_x: value,
            center_y: value + 1.0,
        }
    }

    #[test]
    fn test_training_file_layout() {
        let file = NamedTempFile::new().unwrap();
        let mut squares = SquareCollection::new();
        squares.push(square(1.0, SquareClassification::FalsePositive));
        squares.push(square(2.0, SquareClassification::TruePositive));

        TrainingDataWriter::create(file.path())
            .unwrap()
            .write_squares(&squares)
            .unwrap();

        let data = std::fs::read(file.path()).unwrap();
        // header 4 + 4 + 8 + 4, then 2 x (1 + 8 + 8 + 16 * 8)
        assert_eq!(data.len(), 20 + 2 * 145);
        assert_eq!(&data[..4], b"HSQR");
        // True positives are written first.
        assert_eq!(data[20], 1);
        assert_eq!(data[20 + 145], 0);

        let read = read_training_data(file.path()).unwrap();
        assert_eq!(read.true_positives()[0].center_x, 2.0);
        assert_eq!(read.false_positives()[0].data[[3, 3]], 1.0);
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn test_mixed_square_sizes_rejected() {
        let file = NamedTempFile::new().unwrap();
        let mut squares = SquareCollection::new();
        squares.push(square(1.0, SquareClassification::TruePositive));
        squares.push(ClassifiedSquare {
            data: Array2::zeros((2, 2)),
            classification: SquareClassification::FalsePositive,
            center_x: 0.0,
            center_y: 0.0,
        });
        let err = TrainingDataWriter::create(file.path())
            .unwrap()
            .write_squares(&squares)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_write_tracks_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut table: TrackTable = [
            TrueTrack::new(5, 10.5, 20.0, 1.0, 0.25).with_hits(7),
            TrueTrack::new(9, 1.0, 2.0, 0.0, 0.0),
            TrueTrack::new(5, 11.0, 21.0, 0.0, -1.0),
        ]
        .into_iter()
        .collect();
        let first = table.event_tracks(5)[0];
        table.mark_reconstructed(first);

        let rows = TrackCsvWriter::create(file.path())
            .unwrap()
            .write_tracks(&table, &[5])
            .unwrap();
        assert_eq!(rows, 2);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], TRACK_CSV_HEADER);
        assert_eq!(lines[1], "5,10.5,20,0,1,7,0.25,0,0,0,0,1");
        assert!(lines[2].ends_with(",0"));
        assert_eq!(lines.len(), 3);
    }
}
