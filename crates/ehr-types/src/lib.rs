//! # ehr-types
//!
//! Type definitions for patient demographics and lab observations.
//!
//! This crate provides the in-memory model the loader builds from subject
//! and lab files: a [`Patient`] owning its [`Observation`]s grouped by test
//! name, plus the derived queries (age, age at first lab, threshold checks).
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!
//! ## Usage
//!
//! ```rust
//! use ehr_types::{ComparisonOperator, Observation, Patient};
//!
//! let mut patient = Patient::new("1A", "Male", "2000-06-15 02:45:40.547", "White")?;
//! patient.add_labs(Observation::new(
//!     "1A",
//!     "POTASSIUM",
//!     "37",
//!     "mg/dL",
//!     "2001-07-01 03:20:24.070",
//! ))?;
//!
//! let op: ComparisonOperator = ">".parse()?;
//! assert!(patient.is_sick("POTASSIUM", op, 36.0)?);
//! assert_eq!(patient.lab_test_values("SODIUM")?, None);
//! # Ok::<(), ehr_types::ModelError>(())
//! ```

#![warn(missing_docs)]

mod enums;
mod error;
mod observation;
mod patient;
pub mod timestamp;

// Re-export all public types at crate root
pub use enums::ComparisonOperator;
pub use error::{ModelError, ModelResult};
pub use observation::Observation;
pub use patient::Patient;
pub use timestamp::{format_timestamp, parse_timestamp, years_between};
