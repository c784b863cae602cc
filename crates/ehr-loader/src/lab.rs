//! Lab results table.
//!
//! Decodes rows of `LabsCorePopulatedTable` files.

use csv::StringRecord;
use ehr_types::Observation;

use crate::parser::EhrRecord;
use crate::types::LoaderResult;

/// Canonical column order of the labs table.
pub const LAB_COLUMNS: &[&str] = &[
    "PatientID",
    "AdmissionID",
    "LabName",
    "LabValue",
    "LabUnits",
    "LabDateTime",
];

/// Position of the join key in both tables.
pub const PATIENT_ID_INDEX: usize = 0;

impl EhrRecord for Observation {
    const EXPECTED_COLUMNS: &'static [&'static str] = LAB_COLUMNS;

    // Values stay as text; AdmissionID is not retained.
    fn from_record(record: &StringRecord) -> LoaderResult<Self> {
        Ok(Observation::new(
            record.get(0).unwrap_or(""),
            record.get(2).unwrap_or(""),
            record.get(3).unwrap_or(""),
            record.get(4).unwrap_or(""),
            record.get(5).unwrap_or(""),
        ))
    }
}
