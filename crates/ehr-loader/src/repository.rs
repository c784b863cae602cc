//! Patient repository abstraction.
//!
//! Queries load a whole patient aggregate once and then work on the
//! in-memory value, so the same code runs against a [`Cohort`] or a
//! persistent store.

use std::borrow::Cow;

use ehr_types::{ComparisonOperator, Observation, Patient};

use crate::store::Cohort;
use crate::types::{LoaderError, LoaderResult};

/// Source of patient aggregates.
pub trait PatientRepository {
    /// Ids of every stored patient, sorted.
    fn patient_ids(&self) -> LoaderResult<Vec<String>>;

    /// Loads a patient together with all of its observations.
    fn load_patient(&self, patient_id: &str) -> LoaderResult<Option<Cow<'_, Patient>>>;

    /// Loads a patient's observations ordered by test name, then insertion.
    fn load_observations(&self, patient_id: &str) -> LoaderResult<Vec<Observation>>;

    /// Loads a patient, failing if it does not exist.
    fn require_patient(&self, patient_id: &str) -> LoaderResult<Cow<'_, Patient>> {
        self.load_patient(patient_id)?
            .ok_or_else(|| LoaderError::PatientNotFound {
                patient_id: patient_id.to_string(),
            })
    }

    /// Age of a patient in whole years as of now.
    fn patient_age(&self, patient_id: &str) -> LoaderResult<i64> {
        Ok(self.require_patient(patient_id)?.age())
    }

    /// Returns true if any `test_name` result satisfies `value <operator> threshold`.
    ///
    /// `operator` is one of `<`, `<=`, `>`, `>=`, `==`, `!=`.
    fn patient_is_sick(
        &self,
        patient_id: &str,
        test_name: &str,
        operator: &str,
        threshold: f64,
    ) -> LoaderResult<bool> {
        let operator: ComparisonOperator = operator.parse()?;
        let patient = self.require_patient(patient_id)?;
        Ok(patient.is_sick(test_name, operator, threshold)?)
    }

    /// Age of a patient at their earliest lab.
    fn patient_age_at_first_lab(&self, patient_id: &str) -> LoaderResult<i64> {
        Ok(self.require_patient(patient_id)?.age_at_first_lab()?)
    }

    /// Numeric values of one test, `None` if the patient never had it.
    fn patient_lab_test_values(
        &self,
        patient_id: &str,
        test_name: &str,
    ) -> LoaderResult<Option<Vec<f64>>> {
        Ok(self.require_patient(patient_id)?.lab_test_values(test_name)?)
    }
}

impl PatientRepository for Cohort {
    fn patient_ids(&self) -> LoaderResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .patients()
            .map(|patient| patient.patient_id().to_string())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn load_patient(&self, patient_id: &str) -> LoaderResult<Option<Cow<'_, Patient>>> {
        Ok(self.get(patient_id).map(Cow::Borrowed))
    }

    fn load_observations(&self, patient_id: &str) -> LoaderResult<Vec<Observation>> {
        Ok(self
            .get(patient_id)
            .map(|patient| patient.labs().values().flatten().cloned().collect())
            .unwrap_or_default())
    }
}
