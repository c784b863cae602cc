//! Lab observation type.
//!
//! This module provides the `Observation` struct representing a single
//! lab result row attached to a patient.

use chrono::NaiveDateTime;

use crate::{parse_timestamp, ModelError, ModelResult};

/// A single lab test result.
///
/// Values and timestamps are kept exactly as they appeared in the source
/// file; numeric and date conversions happen on demand and fail loudly.
///
/// # Examples
///
/// ```
/// use ehr_types::Observation;
///
/// let obs = Observation::new("1A", "POTASSIUM", "37", "mg/dL", "2001-07-01 03:20:24.070");
/// assert_eq!(obs.value(), "37");
/// assert_eq!(obs.numeric_value().unwrap(), 37.0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    patient_id: String,
    test_name: String,
    value: String,
    units: String,
    collected_at: String,
}

impl Observation {
    /// Creates an observation from its raw fields.
    pub fn new(
        patient_id: impl Into<String>,
        test_name: impl Into<String>,
        value: impl Into<String>,
        units: impl Into<String>,
        collected_at: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            test_name: test_name.into(),
            value: value.into(),
            units: units.into(),
            collected_at: collected_at.into(),
        }
    }

    /// The patient this result belongs to.
    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Name of the lab test, e.g. `METABOLIC: ALBUMIN`.
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Raw result value as recorded.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Units of the result value.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Raw collection timestamp as recorded.
    pub fn collected_at(&self) -> &str {
        &self.collected_at
    }

    /// Returns the value as a float.
    ///
    /// # Errors
    /// Returns [`ModelError::NonNumericValue`] if the value is not a number.
    pub fn numeric_value(&self) -> ModelResult<f64> {
        self.value
            .trim()
            .parse::<f64>()
            .map_err(|_| ModelError::NonNumericValue {
                value: self.value.clone(),
            })
    }

    /// Returns the parsed collection timestamp.
    ///
    /// # Errors
    /// Returns [`ModelError::MalformedTimestamp`] if the timestamp does not
    /// match the fixed input format.
    pub fn collected_at_time(&self) -> ModelResult<NaiveDateTime> {
        parse_timestamp(&self.collected_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn potassium(value: &str, collected_at: &str) -> Observation {
        Observation::new("1A", "POTASSIUM", value, "mg/dL", collected_at)
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(potassium("37", "").numeric_value().unwrap(), 37.0);
        assert_eq!(potassium("4.25", "").numeric_value().unwrap(), 4.25);
        assert_eq!(potassium("-1", "").numeric_value().unwrap(), -1.0);
    }

    #[test]
    fn test_non_numeric_value() {
        let obs = potassium("high", "");
        assert_eq!(
            obs.numeric_value(),
            Err(ModelError::NonNumericValue {
                value: "high".to_string()
            })
        );
        assert!(potassium("", "").numeric_value().is_err());
    }

    #[test]
    fn test_collected_at_time() {
        assert!(potassium("37", "2001-07-01 03:20:24.070")
            .collected_at_time()
            .is_ok());
        assert!(potassium("37", "WRONG").collected_at_time().is_err());
    }
}
