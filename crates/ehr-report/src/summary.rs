//! JSON cohort summary.

use std::collections::BTreeMap;

use ehr_loader::{Cohort, LoaderResult};
use ehr_types::{ModelError, Patient};
use serde::Serialize;

/// Per-patient derived facts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    /// Patient id.
    pub patient_id: String,
    /// Recorded gender.
    pub gender: String,
    /// Recorded race.
    pub race: String,
    /// Age in whole years today.
    pub age: i64,
    /// Age at the earliest lab, `None` when there are no labs.
    pub age_at_first_lab: Option<i64>,
    /// Number of observations per test name.
    pub lab_counts: BTreeMap<String, usize>,
}

impl PatientSummary {
    /// Summarizes one patient.
    ///
    /// # Errors
    /// Fails if any lab timestamp is malformed.
    pub fn from_patient(patient: &Patient) -> Result<Self, ModelError> {
        let age_at_first_lab = match patient.age_at_first_lab() {
            Ok(age) => Some(age),
            Err(ModelError::NoObservations { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            patient_id: patient.patient_id().to_string(),
            gender: patient.gender().to_string(),
            race: patient.race().to_string(),
            age: patient.age(),
            age_at_first_lab,
            lab_counts: patient
                .labs()
                .iter()
                .map(|(name, observations)| (name.clone(), observations.len()))
                .collect(),
        })
    }
}

/// Summary of a whole cohort, patients sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    /// Number of patients.
    pub patient_count: usize,
    /// Number of observations across all patients.
    pub observation_count: usize,
    /// One entry per patient.
    pub patients: Vec<PatientSummary>,
}

impl CohortSummary {
    /// Summarizes every patient in the cohort.
    pub fn from_cohort(cohort: &Cohort) -> LoaderResult<Self> {
        let mut patients = cohort
            .patients()
            .map(PatientSummary::from_patient)
            .collect::<Result<Vec<_>, _>>()?;
        patients.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));

        Ok(Self {
            patient_count: cohort.len(),
            observation_count: cohort.observation_count(),
            patients,
        })
    }
}
