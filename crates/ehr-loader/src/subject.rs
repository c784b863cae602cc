//! Patient demographics table.
//!
//! Decodes rows of `PatientCorePopulatedTable` files.

use csv::StringRecord;
use ehr_types::Patient;

use crate::parser::EhrRecord;
use crate::types::LoaderResult;

/// Canonical column order of the subjects table.
pub const SUBJECT_COLUMNS: &[&str] = &[
    "PatientID",
    "PatientGender",
    "PatientDateOfBirth",
    "PatientRace",
    "PatientMaritalStatus",
    "PatientLanguage",
    "PatientPopulationPercentageBelowPoverty",
];

impl EhrRecord for Patient {
    const EXPECTED_COLUMNS: &'static [&'static str] = SUBJECT_COLUMNS;

    // Marital status, language and poverty percentage are not retained.
    fn from_record(record: &StringRecord) -> LoaderResult<Self> {
        Ok(Patient::new(
            record.get(0).unwrap_or(""),
            record.get(1).unwrap_or(""),
            record.get(2).unwrap_or(""),
            record.get(3).unwrap_or(""),
        )?)
    }
}
