//! JSON analysis configuration files.

use crate::Result;
use houghpix_core::AnalysisConfig;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Loads and validates a configuration file.
///
/// Missing keys take their default values.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid JSON, or holds
/// invalid settings.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnalysisConfig> {
    let reader = BufReader::new(File::open(path)?);
    let config: AnalysisConfig = serde_json::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

/// Writes a configuration as pretty-printed JSON.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save_config<P: AsRef<Path>>(path: P, config: &AnalysisConfig) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, config)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use houghpix_core::{Easing, HoughConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"hough": {{"square_size": 8}}, "easing": "InCubic"}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.hough.square_size, 8);
        assert_eq!(config.hough.nbin_phi, 7000);
        assert_eq!(config.easing, Easing::InCubic);
        assert_eq!(config.processing.slice_list, vec![-1]);
    }

    #[test]
    fn test_save_then_load() {
        let file = NamedTempFile::new().unwrap();
        let config = AnalysisConfig::new().with_hough(HoughConfig::default().with_tolerance(3.5));
        save_config(file.path(), &config).unwrap();
        assert_eq!(load_config(file.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"processing": {{"slice_list": [40]}}}}"#).unwrap();
        file.flush().unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(Error::CoreError(_))
        ));

        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "{{ not json").unwrap();
        bad.flush().unwrap();
        assert!(matches!(load_config(bad.path()), Err(Error::Json(_))));
    }
}
