//! # ehr-loader
//!
//! Loader for tab-delimited patient demographics and lab result files.
//!
//! Each input file is split into rows, validated against its canonical
//! schema (column order in the file does not matter), and permuted into
//! canonical order. Lab rows are then grouped by patient and attached to the
//! matching [`Patient`](ehr_types::Patient), producing a [`Cohort`].
//!
//! ```ignore
//! use ehr_loader::{Cohort, PatientRepository};
//!
//! let cohort = Cohort::parse("PatientCorePopulatedTable.txt", "LabsCorePopulatedTable.txt")?;
//! let sick = cohort.patient_is_sick("1A", "METABOLIC: ALBUMIN", ">", 4.0)?;
//! ```

#![warn(missing_docs)]

mod lab;
mod loader;
mod parser;
mod repository;
mod sqlite;
mod store;
mod subject;
mod types;

// Re-export ehr-types for convenience
pub use ehr_types;

pub use lab::{LAB_COLUMNS, PATIENT_ID_INDEX};
pub use loader::{
    canonical_rows, discover_ehr_files, read_lines, read_lines_from, read_table,
    LABS_FILE_PREFIX, SUBJECTS_FILE_PREFIX,
};
pub use parser::{filter_rows, group_rows, reorder_columns, split_lines, EhrRecord, RowGroup};
pub use repository::PatientRepository;
pub use sqlite::SqliteStore;
pub use store::{Cohort, CohortBuilder};
pub use subject::SUBJECT_COLUMNS;
pub use types::{EhrFiles, LoadStats, LoaderConfig, LoaderError, LoaderResult};
