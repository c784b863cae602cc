//! Loader-specific types: errors, configuration, statistics and file sets.

use std::path::{Path, PathBuf};

use ehr_types::ModelError;
use thiserror::Error;

/// Errors that can occur while loading or querying a cohort.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// I/O error reading an input file.
    #[error("IO error reading input file: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error in the persistent store.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A patient or lab value violated a model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Directory not found.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Required input file missing from a data directory.
    #[error("Required input file not found: {file_type} in {directory}")]
    RequiredFileMissing {
        /// The kind of file that was missing.
        file_type: String,
        /// The directory that was searched.
        directory: String,
    },

    /// The input has no header row.
    #[error("Input has no header row")]
    EmptyInput,

    /// Header names differ from the expected columns.
    #[error("Header does not match expected columns: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        /// Expected columns absent from the header.
        missing: Vec<String>,
        /// Header columns that were not expected.
        unexpected: Vec<String>,
    },

    /// The header names a column more than once.
    #[error("Header names column '{column}' more than once")]
    DuplicateColumn {
        /// The repeated column name.
        column: String,
    },

    /// A row does not have a field at a required position.
    #[error("Row {row} has {width} fields, column index {required} is out of range")]
    RowTooShort {
        /// Zero-based row position in the input.
        row: usize,
        /// Number of fields in the row.
        width: usize,
        /// The column index that was required.
        required: usize,
    },

    /// Two subject rows share the same patient id.
    #[error("Duplicate subject row for patient {patient_id}")]
    DuplicatePatient {
        /// The repeated patient id.
        patient_id: String,
    },

    /// A lab row references a patient with no subject row.
    #[error("Lab row references unknown patient {patient_id}")]
    ReferentialIntegrity {
        /// The unresolved patient id.
        patient_id: String,
    },

    /// A query named a patient that is not loaded.
    #[error("Patient not found: {patient_id}")]
    PatientNotFound {
        /// The requested patient id.
        patient_id: String,
    },
}

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Configuration for reading and assembling input files.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Drop lines that are empty after trimming before splitting.
    pub skip_blank_lines: bool,
    /// Keep the first subject row for a repeated patient id instead of failing.
    pub allow_duplicate_patients: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            skip_blank_lines: true,
            allow_duplicate_patients: false,
        }
    }
}

impl LoaderConfig {
    /// Creates a config that keeps every input line, blank or not.
    pub fn keep_blank_lines() -> Self {
        Self {
            skip_blank_lines: false,
            ..Self::default()
        }
    }
}

/// Statistics from building a cohort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Subject data rows read (header excluded).
    pub subject_rows: usize,
    /// Lab data rows read (header excluded).
    pub lab_rows: usize,
    /// Patients in the cohort.
    pub patients: usize,
    /// Observations attached across all patients.
    pub observations: usize,
    /// Subject rows ignored as duplicates.
    pub duplicate_subjects: usize,
    /// Time taken to build in milliseconds.
    pub parse_time_ms: u64,
}

impl LoadStats {
    /// Average number of observations per patient.
    pub fn observations_per_patient(&self) -> f64 {
        if self.patients == 0 {
            0.0
        } else {
            self.observations as f64 / self.patients as f64
        }
    }
}

/// Subject and lab files discovered in a data directory.
#[derive(Debug, Clone, Default)]
pub struct EhrFiles {
    /// Path to the patient demographics file.
    pub subjects_file: Option<PathBuf>,
    /// Path to the lab results file.
    pub labs_file: Option<PathBuf>,
}

impl EhrFiles {
    /// Creates a new empty EhrFiles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if both input files are present.
    pub fn has_required_files(&self) -> bool {
        self.subjects_file.is_some() && self.labs_file.is_some()
    }

    /// Directory holding whichever input file was found first.
    pub fn directory(&self) -> Option<&Path> {
        self.subjects_file
            .as_deref()
            .or(self.labs_file.as_deref())
            .and_then(Path::parent)
    }

    /// Returns a list of missing input files.
    pub fn missing_files(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.subjects_file.is_none() {
            missing.push("Subjects");
        }
        if self.labs_file.is_none() {
            missing.push("Labs");
        }
        missing
    }
}
