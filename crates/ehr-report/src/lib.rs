//! # ehr-report
//!
//! Derived per-patient facts for a loaded cohort, serialized as JSON by the
//! `ehr-report` binary.

#![warn(missing_docs)]

mod summary;

pub use summary::{CohortSummary, PatientSummary};
