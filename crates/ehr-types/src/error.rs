//! Errors raised by the patient and lab model.

use thiserror::Error;

/// Errors that can occur while building or querying a [`Patient`](crate::Patient).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A date of birth or lab timestamp is not `YYYY-MM-DD HH:MM:SS.ffffff`.
    #[error("Malformed timestamp '{value}' (expected YYYY-MM-DD HH:MM:SS.ffffff)")]
    MalformedTimestamp {
        /// The text that failed to parse.
        value: String,
    },

    /// The patient has no observations recorded under this test name.
    #[error("Patient {patient_id} has no lab results for test '{test_name}'")]
    UnknownTest {
        /// The patient that was queried.
        patient_id: String,
        /// The test name that was not found.
        test_name: String,
    },

    /// A lab value or comparison operand is not a number.
    #[error("Lab value '{value}' is not numeric")]
    NonNumericValue {
        /// The offending value.
        value: String,
    },

    /// The comparison token is not one of `<`, `<=`, `>`, `>=`, `==`, `!=`.
    #[error("Invalid comparison operator '{token}'")]
    InvalidOperator {
        /// The rejected token.
        token: String,
    },

    /// The patient has no observations, so there is no first lab.
    #[error("Patient {patient_id} has no lab observations")]
    NoObservations {
        /// The patient that was queried.
        patient_id: String,
    },

    /// An observation was attached to a patient it does not belong to.
    #[error("Observation for patient {observation_patient_id} cannot be added to patient {patient_id}")]
    PatientMismatch {
        /// The receiving patient.
        patient_id: String,
        /// The patient named on the observation.
        observation_patient_id: String,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
