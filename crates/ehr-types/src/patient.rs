//! Patient type and its derived lab queries.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};

use crate::{parse_timestamp, years_between, ComparisonOperator, ModelError, ModelResult, Observation};

/// A patient and the lab observations recorded for them.
///
/// Observations are grouped by test name; within a test they keep the order
/// in which they were added. Derived values are computed on every call and
/// never cached.
///
/// # Examples
///
/// ```
/// use ehr_types::{ComparisonOperator, Observation, Patient};
///
/// let mut patient = Patient::new("1A", "Male", "2000-06-15 02:45:40.547", "White").unwrap();
/// patient
///     .add_labs(Observation::new("1A", "POTASSIUM", "37", "mg/dL", "2001-07-01 03:20:24.070"))
///     .unwrap();
///
/// assert!(patient.is_sick("POTASSIUM", ComparisonOperator::Greater, 36.0).unwrap());
/// assert!(!patient.is_sick("POTASSIUM", ComparisonOperator::Greater, 100.0).unwrap());
/// assert_eq!(patient.age_at_first_lab().unwrap(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PatientRecord"))]
pub struct Patient {
    patient_id: String,
    gender: String,
    date_of_birth: NaiveDateTime,
    race: String,
    labs: BTreeMap<String, Vec<Observation>>,
}

impl Patient {
    /// Creates a patient with no observations.
    ///
    /// # Errors
    /// Returns [`ModelError::MalformedTimestamp`] if `date_of_birth` is not in
    /// `YYYY-MM-DD HH:MM:SS.ffffff` form.
    pub fn new(
        patient_id: impl Into<String>,
        gender: impl Into<String>,
        date_of_birth: &str,
        race: impl Into<String>,
    ) -> ModelResult<Self> {
        Ok(Self {
            patient_id: patient_id.into(),
            gender: gender.into(),
            date_of_birth: parse_timestamp(date_of_birth)?,
            race: race.into(),
            labs: BTreeMap::new(),
        })
    }

    /// Unique patient identifier.
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Recorded gender.
    pub fn gender(&self) -> &str {
        &self.gender
    }

    /// Parsed date of birth.
    pub fn date_of_birth(&self) -> NaiveDateTime {
        self.date_of_birth
    }

    /// Recorded race.
    pub fn race(&self) -> &str {
        &self.race
    }

    /// All observations keyed by test name.
    pub fn labs(&self) -> &BTreeMap<String, Vec<Observation>> {
        &self.labs
    }

    /// Observations recorded under one test name, in insertion order.
    pub fn observations(&self, test_name: &str) -> Option<&[Observation]> {
        self.labs.get(test_name).map(Vec::as_slice)
    }

    /// Test names with at least one observation, sorted.
    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.labs.keys().map(String::as_str)
    }

    /// Total number of observations across all tests.
    pub fn observation_count(&self) -> usize {
        self.labs.values().map(Vec::len).sum()
    }

    /// Appends an observation under its test name.
    ///
    /// # Errors
    /// Returns [`ModelError::PatientMismatch`] if the observation names a
    /// different patient.
    pub fn add_labs(&mut self, observation: Observation) -> ModelResult<()> {
        if observation.patient_id() != self.patient_id {
            return Err(ModelError::PatientMismatch {
                patient_id: self.patient_id.clone(),
                observation_patient_id: observation.patient_id().to_string(),
            });
        }

        self.labs
            .entry(observation.test_name().to_string())
            .or_default()
            .push(observation);
        Ok(())
    }

    /// Age in whole years as of now (local time).
    pub fn age(&self) -> i64 {
        self.age_at(Local::now().naive_local())
    }

    /// Age in whole years as of `now`.
    pub fn age_at(&self, now: NaiveDateTime) -> i64 {
        years_between(self.date_of_birth, now)
    }

    /// Returns true if any `test_name` result satisfies `value <op> threshold`.
    ///
    /// Every value is converted before any comparison is made, so a single
    /// non-numeric value fails the query even when another value matches.
    ///
    /// # Errors
    /// - [`ModelError::UnknownTest`] if the patient has no such test.
    /// - [`ModelError::NonNumericValue`] if any value is not a number.
    pub fn is_sick(
        &self,
        test_name: &str,
        operator: ComparisonOperator,
        threshold: f64,
    ) -> ModelResult<bool> {
        let observations = self
            .labs
            .get(test_name)
            .ok_or_else(|| ModelError::UnknownTest {
                patient_id: self.patient_id.clone(),
                test_name: test_name.to_string(),
            })?;

        let values = numeric_values(observations)?;
        Ok(values.into_iter().any(|value| operator.evaluate(value, threshold)))
    }

    /// Age in whole years at the earliest lab across all tests.
    ///
    /// # Errors
    /// - [`ModelError::MalformedTimestamp`] if any collection time fails to
    ///   parse, even if it would not have been the earliest.
    /// - [`ModelError::NoObservations`] if the patient has no labs.
    pub fn age_at_first_lab(&self) -> ModelResult<i64> {
        let mut first: Option<NaiveDateTime> = None;
        for observation in self.labs.values().flatten() {
            let collected = observation.collected_at_time()?;
            first = Some(match first {
                Some(current) if current <= collected => current,
                _ => collected,
            });
        }

        let first = first.ok_or_else(|| ModelError::NoObservations {
            patient_id: self.patient_id.clone(),
        })?;
        Ok(years_between(self.date_of_birth, first))
    }

    /// Numeric values recorded for `test_name`.
    ///
    /// Unlike [`Patient::is_sick`], an unknown test is not an error here:
    /// it yields `Ok(None)`.
    ///
    /// # Errors
    /// Returns [`ModelError::NonNumericValue`] if any stored value is not a
    /// number.
    pub fn lab_test_values(&self, test_name: &str) -> ModelResult<Option<Vec<f64>>> {
        match self.labs.get(test_name) {
            Some(observations) => numeric_values(observations).map(Some),
            None => Ok(None),
        }
    }
}

/// Serialized form of a [`Patient`], checked on the way in.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct PatientRecord {
    patient_id: String,
    gender: String,
    date_of_birth: NaiveDateTime,
    race: String,
    labs: BTreeMap<String, Vec<Observation>>,
}

#[cfg(feature = "serde")]
impl TryFrom<PatientRecord> for Patient {
    type Error = ModelError;

    // Labs are re-added one by one, so they are filed under their own test
    // name and must belong to this patient.
    fn try_from(record: PatientRecord) -> ModelResult<Self> {
        let mut patient = Patient {
            patient_id: record.patient_id,
            gender: record.gender,
            date_of_birth: record.date_of_birth,
            race: record.race,
            labs: BTreeMap::new(),
        };
        for observation in record.labs.into_values().flatten() {
            patient.add_labs(observation)?;
        }
        Ok(patient)
    }
}

fn numeric_values(observations: &[Observation]) -> ModelResult<Vec<f64>> {
    observations.iter().map(Observation::numeric_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(dob: &str) -> Patient {
        Patient::new("1A", "Male", dob, "White").unwrap()
    }

    fn lab(test: &str, value: &str, collected_at: &str) -> Observation {
        Observation::new("1A", test, value, "mg/dL", collected_at)
    }

    fn at(value: &str) -> NaiveDateTime {
        parse_timestamp(value).unwrap()
    }

    #[test]
    fn test_new_rejects_date_without_time() {
        let err = Patient::new("1A", "Male", "2000-06-15", "White").unwrap_err();
        assert_eq!(
            err,
            ModelError::MalformedTimestamp {
                value: "2000-06-15".to_string()
            }
        );
    }

    #[test]
    fn test_age_at() {
        let p = patient("2000-06-15 02:45:40.547");
        assert_eq!(p.age_at(at("2022-06-16 00:00:00.0")), 22);
        assert_eq!(p.age_at(at("2022-06-14 00:00:00.0")), 21);
    }

    #[test]
    fn test_age_uses_current_time() {
        let p = patient("2000-06-15 02:45:40.547");
        assert!(p.age() >= 26);
    }

    #[test]
    fn test_add_labs_groups_by_test_in_order() {
        let mut p = patient("2000-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "37", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("A1C", "5", "2001-07-02 03:20:24.070")).unwrap();
        p.add_labs(lab("POTASSIUM", "38", "2001-07-03 03:20:24.070")).unwrap();
        p.add_labs(lab("POTASSIUM", "37", "2001-07-01 03:20:24.070")).unwrap();

        let values: Vec<&str> = p
            .observations("POTASSIUM")
            .unwrap()
            .iter()
            .map(Observation::value)
            .collect();
        assert_eq!(values, vec!["37", "38", "37"]);
        assert_eq!(p.observation_count(), 4);
        assert_eq!(p.test_names().collect::<Vec<_>>(), vec!["A1C", "POTASSIUM"]);
    }

    #[test]
    fn test_add_labs_rejects_other_patient() {
        let mut p = patient("2000-06-15 02:45:40.547");
        let other = Observation::new("2A", "POTASSIUM", "37", "mg/dL", "2001-07-01 03:20:24.070");
        assert!(matches!(
            p.add_labs(other),
            Err(ModelError::PatientMismatch { .. })
        ));
        assert_eq!(p.observation_count(), 0);
    }

    #[test]
    fn test_is_sick_any_value() {
        let mut p = patient("2000-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "10", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("POTASSIUM", "37", "2001-07-02 03:20:24.070")).unwrap();

        assert!(p.is_sick("POTASSIUM", ComparisonOperator::Greater, 36.0).unwrap());
        assert!(!p.is_sick("POTASSIUM", ComparisonOperator::Greater, 100.0).unwrap());
        assert!(p.is_sick("POTASSIUM", ComparisonOperator::Less, 11.0).unwrap());
        assert!(p.is_sick("POTASSIUM", ComparisonOperator::Equal, 10.0).unwrap());
    }

    #[test]
    fn test_is_sick_unknown_test() {
        let p = patient("2000-06-15 02:45:40.547");
        assert_eq!(
            p.is_sick("SODIUM", ComparisonOperator::Greater, 1.0),
            Err(ModelError::UnknownTest {
                patient_id: "1A".to_string(),
                test_name: "SODIUM".to_string(),
            })
        );
    }

    #[test]
    fn test_is_sick_non_numeric_is_not_skipped() {
        let mut p = patient("2000-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "37", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("POTASSIUM", "n/a", "2001-07-02 03:20:24.070")).unwrap();

        assert_eq!(
            p.is_sick("POTASSIUM", ComparisonOperator::Greater, 36.0),
            Err(ModelError::NonNumericValue {
                value: "n/a".to_string()
            })
        );
    }

    #[test]
    fn test_age_at_first_lab_uses_earliest_across_tests() {
        let mut p = patient("1980-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "10", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("A1C", "15", "2000-07-01 03:20:24.070")).unwrap();
        assert_eq!(p.age_at_first_lab().unwrap(), 20);
    }

    #[test]
    fn test_age_at_first_lab_fails_on_any_bad_timestamp() {
        let mut p = patient("1980-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "10", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("A1C", "15", "WRONG")).unwrap();
        assert_eq!(
            p.age_at_first_lab(),
            Err(ModelError::MalformedTimestamp {
                value: "WRONG".to_string()
            })
        );
    }

    #[test]
    fn test_age_at_first_lab_without_labs() {
        let p = patient("1980-06-15 02:45:40.547");
        assert_eq!(
            p.age_at_first_lab(),
            Err(ModelError::NoObservations {
                patient_id: "1A".to_string()
            })
        );
    }

    #[test]
    fn test_lab_test_values() {
        let mut p = patient("1980-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "10", "2001-07-01 03:20:24.070")).unwrap();
        p.add_labs(lab("POTASSIUM", "4.5", "2001-07-02 03:20:24.070")).unwrap();

        assert_eq!(p.lab_test_values("POTASSIUM").unwrap(), Some(vec![10.0, 4.5]));
        assert_eq!(p.lab_test_values("SODIUM").unwrap(), None);
    }

    #[test]
    fn test_lab_test_values_non_numeric() {
        let mut p = patient("1980-06-15 02:45:40.547");
        p.add_labs(lab("POTASSIUM", "high", "2001-07-01 03:20:24.070")).unwrap();
        assert!(matches!(
            p.lab_test_values("POTASSIUM"),
            Err(ModelError::NonNumericValue { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_rejects_foreign_observation() {
        let json = r#"{
            "patient_id": "1A",
            "gender": "Male",
            "date_of_birth": "2000-06-15T02:45:40.547",
            "race": "White",
            "labs": {"K": [{
                "patient_id": "ZZ",
                "test_name": "NA",
                "value": "140",
                "units": "mmol/L",
                "collected_at": "2001-07-01 03:20:24.070"
            }]}
        }"#;

        let err = serde_json::from_str::<Patient>(json).unwrap_err();
        assert!(err.to_string().contains("ZZ"), "{err}");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_refiles_under_test_name() {
        let json = r#"{
            "patient_id": "1A",
            "gender": "Male",
            "date_of_birth": "2000-06-15T02:45:40.547",
            "race": "White",
            "labs": {"K": [{
                "patient_id": "1A",
                "test_name": "NA",
                "value": "140",
                "units": "mmol/L",
                "collected_at": "2001-07-01 03:20:24.070"
            }]}
        }"#;

        let p: Patient = serde_json::from_str(json).unwrap();
        assert!(p.observations("K").is_none());
        assert_eq!(p.observations("NA").map(<[Observation]>::len), Some(1));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn widened(op: ComparisonOperator) -> Vec<ComparisonOperator> {
            match op {
                ComparisonOperator::Greater => vec![ComparisonOperator::GreaterOrEqual],
                ComparisonOperator::Less => vec![ComparisonOperator::LessOrEqual],
                ComparisonOperator::Equal => vec![
                    ComparisonOperator::GreaterOrEqual,
                    ComparisonOperator::LessOrEqual,
                ],
                _ => vec![],
            }
        }

        proptest! {
            #[test]
            fn widening_operator_never_turns_true_false(
                values in prop::collection::vec(-1000i32..1000, 1..8),
                threshold in -1000i32..1000,
            ) {
                let mut p = patient("2000-06-15 02:45:40.547");
                for value in &values {
                    p.add_labs(lab("K", &value.to_string(), "2001-07-01 03:20:24.070")).unwrap();
                }

                for op in ComparisonOperator::ALL {
                    if p.is_sick("K", op, f64::from(threshold)).unwrap() {
                        for wider in widened(op) {
                            prop_assert!(p.is_sick("K", wider, f64::from(threshold)).unwrap());
                        }
                    }
                }
            }
        }
    }
}
