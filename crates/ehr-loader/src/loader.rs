//! Input file discovery and reading.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::parser::{reorder_columns, split_lines};
use crate::types::{EhrFiles, LoaderConfig, LoaderError, LoaderResult};

/// File name prefix of the patient demographics table.
pub const SUBJECTS_FILE_PREFIX: &str = "PatientCorePopulatedTable";

/// File name prefix of the lab results table.
pub const LABS_FILE_PREFIX: &str = "LabsCorePopulatedTable";

/// Discovers the subject and lab files in a data directory.
///
/// Matches `PatientCorePopulatedTable*.txt` and `LabsCorePopulatedTable*.txt`.
/// When several files share a prefix, the lexicographically greatest name
/// is used.
pub fn discover_ehr_files<P: AsRef<Path>>(path: P) -> LoaderResult<EhrFiles> {
    let path = path.as_ref();

    if !path.is_dir() {
        return Err(LoaderError::DirectoryNotFound {
            path: path.display().to_string(),
        });
    }

    let mut files = EhrFiles::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let filename = entry.file_name();
        let filename_str = filename.to_string_lossy();

        if !filename_str.ends_with(".txt") {
            continue;
        }

        let slot = if filename_str.starts_with(SUBJECTS_FILE_PREFIX) {
            &mut files.subjects_file
        } else if filename_str.starts_with(LABS_FILE_PREFIX) {
            &mut files.labs_file
        } else {
            continue;
        };

        // Several matches: keep the greatest name so the choice is stable.
        let path = entry.path();
        if slot.as_ref().map_or(true, |current| path.file_name() > current.file_name()) {
            if let Some(current) = slot.as_ref() {
                debug!("Multiple matches, ignoring {}", current.display());
            }
            *slot = Some(path);
        } else {
            debug!("Multiple matches, ignoring {}", path.display());
        }
    }

    if !files.has_required_files() {
        return Err(LoaderError::RequiredFileMissing {
            file_type: files.missing_files().join(", "),
            directory: path.display().to_string(),
        });
    }

    Ok(files)
}

/// Reads all lines from a file.
///
/// The file is closed before this returns.
pub fn read_lines<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> LoaderResult<Vec<String>> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(LoaderError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let file = File::open(path)?;
    read_lines_from(file, config)
}

/// Reads all lines from a reader, dropping a leading UTF-8 byte-order mark.
pub fn read_lines_from<R: Read>(reader: R, config: &LoaderConfig) -> LoaderResult<Vec<String>> {
    let mut lines = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        let line = if index == 0 {
            line.trim_start_matches('\u{feff}').to_string()
        } else {
            line
        };

        if config.skip_blank_lines && line.trim().is_empty() {
            continue;
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Splits and reorders raw lines into canonical data rows.
///
/// The header is validated against `expected_columns` and then dropped.
pub fn canonical_rows<S: AsRef<str>>(
    expected_columns: &[&str],
    lines: &[S],
) -> LoaderResult<Vec<StringRecord>> {
    let mut rows = reorder_columns(expected_columns, &split_lines(lines))?;
    rows.remove(0);
    Ok(rows)
}

/// Reads a table file into canonical data rows.
pub fn read_table<P: AsRef<Path>>(
    path: P,
    expected_columns: &[&str],
    config: &LoaderConfig,
) -> LoaderResult<Vec<StringRecord>> {
    let lines = read_lines(path, config)?;
    canonical_rows(expected_columns, &lines)
}
