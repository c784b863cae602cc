//! In-memory cohort of patients and their lab observations.
//!
//! A [`Cohort`] is built in one pass from a subjects table and a labs table:
//! every subject row becomes a [`Patient`], then lab rows are grouped by
//! patient id and attached. Any schema, timestamp or integrity error aborts
//! the whole build.
//!
//! ```ignore
//! let cohort = Cohort::parse("PatientCorePopulatedTable.txt", "LabsCorePopulatedTable.txt")?;
//!
//! if let Some(patient) = cohort.get("1A") {
//!     println!("{} is {} years old", patient.patient_id(), patient.age());
//! }
//! ```

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use csv::StringRecord;
use ehr_types::{Observation, Patient};
use tracing::{debug, info, warn};

use crate::lab::{LAB_COLUMNS, PATIENT_ID_INDEX};
use crate::loader::{canonical_rows, read_lines, read_lines_from};
use crate::parser::{group_rows, EhrRecord};
use crate::subject::SUBJECT_COLUMNS;
use crate::types::{EhrFiles, LoadStats, LoaderConfig, LoaderError, LoaderResult};

/// Patients indexed by id, each owning its observations.
#[derive(Debug, Clone, Default)]
pub struct Cohort {
    /// Patients indexed by patient id.
    patients: HashMap<String, Patient>,
    /// Statistics from the build that produced this cohort.
    stats: LoadStats,
}

impl Cohort {
    /// Creates a new empty cohort.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cohort from a subjects file and a labs file with the default
    /// configuration.
    pub fn parse<P: AsRef<Path>, Q: AsRef<Path>>(subjects_path: P, labs_path: Q) -> LoaderResult<Self> {
        CohortBuilder::default().from_paths(subjects_path, labs_path)
    }

    /// Builds a cohort from discovered input files.
    pub fn from_files(files: &EhrFiles, config: LoaderConfig) -> LoaderResult<Self> {
        match (&files.subjects_file, &files.labs_file) {
            (Some(subjects), Some(labs)) => CohortBuilder::new(config).from_paths(subjects, labs),
            _ => Err(LoaderError::RequiredFileMissing {
                file_type: files.missing_files().join(", "),
                directory: files
                    .directory()
                    .map_or_else(|| "<no input files>".to_string(), |dir| dir.display().to_string()),
            }),
        }
    }

    /// Replaces this cohort with one built from the given files.
    ///
    /// The current contents are kept if the build fails.
    pub fn reload<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        subjects_path: P,
        labs_path: Q,
        config: LoaderConfig,
    ) -> LoaderResult<&LoadStats> {
        let fresh = CohortBuilder::new(config).from_paths(subjects_path, labs_path)?;
        *self = fresh;
        Ok(&self.stats)
    }

    /// Returns a patient by id.
    pub fn get(&self, patient_id: &str) -> Option<&Patient> {
        self.patients.get(patient_id)
    }

    /// Returns true if the cohort contains the patient.
    pub fn contains(&self, patient_id: &str) -> bool {
        self.patients.contains_key(patient_id)
    }

    /// Iterates over all patients in no particular order.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// Returns the number of patients.
    pub fn len(&self) -> usize {
        self.patients.len()
    }

    /// Returns true if there are no patients.
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Returns the total number of observations across all patients.
    pub fn observation_count(&self) -> usize {
        self.patients.values().map(Patient::observation_count).sum()
    }

    /// Statistics from the build that produced this cohort.
    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }
}

/// Builds a [`Cohort`] from subject and lab sources.
#[derive(Debug, Clone, Default)]
pub struct CohortBuilder {
    config: LoaderConfig,
}

impl CohortBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Returns the builder configuration.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Builds from a subjects file and a labs file.
    ///
    /// # Errors
    /// Returns an error if either file cannot be read, fails schema
    /// validation, or holds data that violates a model invariant.
    pub fn from_paths<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        subjects_path: P,
        labs_path: Q,
    ) -> LoaderResult<Cohort> {
        debug!("Reading subjects from {}", subjects_path.as_ref().display());
        let subject_lines = read_lines(subjects_path, &self.config)?;
        debug!("Reading labs from {}", labs_path.as_ref().display());
        let lab_lines = read_lines(labs_path, &self.config)?;
        self.from_lines(&subject_lines, &lab_lines)
    }

    /// Builds from two readers.
    pub fn from_readers<R: Read, S: Read>(&self, subjects: R, labs: S) -> LoaderResult<Cohort> {
        let subject_lines = read_lines_from(subjects, &self.config)?;
        let lab_lines = read_lines_from(labs, &self.config)?;
        self.from_lines(&subject_lines, &lab_lines)
    }

    /// Builds from raw lines, each source starting with its header.
    pub fn from_lines<S: AsRef<str>, T: AsRef<str>>(
        &self,
        subject_lines: &[S],
        lab_lines: &[T],
    ) -> LoaderResult<Cohort> {
        let subject_rows = canonical_rows(SUBJECT_COLUMNS, subject_lines)?;
        let lab_rows = canonical_rows(LAB_COLUMNS, lab_lines)?;
        self.from_rows(&subject_rows, &lab_rows)
    }

    /// Builds from canonical rows with headers already removed.
    ///
    /// Subjects are indexed first so every lab row can be checked against
    /// the complete patient set.
    ///
    /// # Errors
    /// - [`LoaderError::DuplicatePatient`] for a repeated subject id, unless
    ///   duplicates are allowed by the configuration.
    /// - [`LoaderError::ReferentialIntegrity`] for a lab row whose patient
    ///   has no subject row.
    /// - [`LoaderError::Model`] for an unparseable date of birth.
    pub fn from_rows(
        &self,
        subject_rows: &[StringRecord],
        lab_rows: &[StringRecord],
    ) -> LoaderResult<Cohort> {
        let start = Instant::now();
        let mut stats = LoadStats {
            subject_rows: subject_rows.len(),
            lab_rows: lab_rows.len(),
            ..Default::default()
        };

        let mut patients: HashMap<String, Patient> = HashMap::with_capacity(subject_rows.len());
        for row in subject_rows {
            let patient = Patient::from_record(row)?;
            if patients.contains_key(patient.patient_id()) {
                if !self.config.allow_duplicate_patients {
                    return Err(LoaderError::DuplicatePatient {
                        patient_id: patient.patient_id().to_string(),
                    });
                }
                warn!("Ignoring duplicate subject row for patient {}", patient.patient_id());
                stats.duplicate_subjects += 1;
                continue;
            }
            patients.insert(patient.patient_id().to_string(), patient);
        }
        debug!("Indexed {} patients", patients.len());

        for group in group_rows(lab_rows, PATIENT_ID_INDEX, 0)? {
            let patient = patients
                .get_mut(&group.key)
                .ok_or_else(|| LoaderError::ReferentialIntegrity {
                    patient_id: group.key.clone(),
                })?;

            for row in &group.rows {
                patient.add_labs(Observation::from_record(row)?)?;
                stats.observations += 1;
            }
        }

        stats.patients = patients.len();
        stats.parse_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Built cohort of {} patients with {} observations in {} ms",
            stats.patients, stats.observations, stats.parse_time_ms
        );

        Ok(Cohort { patients, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::filter_rows;
    use std::path::PathBuf;
    use ehr_types::ModelError;

    const SUBJECT_HEADER: &str = "PatientID\tPatientGender\tPatientDateOfBirth\tPatientRace\tPatientMaritalStatus\tPatientLanguage\tPatientPopulationPercentageBelowPoverty";
    const LAB_HEADER: &str = "PatientID\tAdmissionID\tLabName\tLabValue\tLabUnits\tLabDateTime";

    fn subjects(rows: &[&str]) -> Vec<String> {
        std::iter::once(SUBJECT_HEADER)
            .chain(rows.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn labs(rows: &[&str]) -> Vec<String> {
        std::iter::once(LAB_HEADER)
            .chain(rows.iter().copied())
            .map(str::to_string)
            .collect()
    }

    fn build(subject_rows: &[&str], lab_rows: &[&str]) -> LoaderResult<Cohort> {
        CohortBuilder::default().from_lines(&subjects(subject_rows), &labs(lab_rows))
    }

    const PATIENT_1A: &str = "1A\tMale\t2000-06-15 02:45:40.547\tWhite\tSingle\tEnglish\t12.2";
    const POTASSIUM_1A: &str = "1A\t1\tPOTASSIUM\t37\tmg/dL\t2001-07-01 03:20:24.070";

    #[test]
    fn test_single_patient_single_lab() {
        let cohort = build(&[PATIENT_1A], &[POTASSIUM_1A]).unwrap();

        assert_eq!(cohort.len(), 1);
        let patient = cohort.get("1A").unwrap();
        let potassium = patient.observations("POTASSIUM").unwrap();
        assert_eq!(potassium.len(), 1);
        assert_eq!(potassium[0].value(), "37");
        assert_eq!(potassium[0].units(), "mg/dL");

        let stats = cohort.stats();
        assert_eq!(stats.subject_rows, 1);
        assert_eq!(stats.lab_rows, 1);
        assert_eq!(stats.patients, 1);
        assert_eq!(stats.observations, 1);
    }

    #[test]
    fn test_shuffled_columns_give_same_cohort() {
        let subject_lines = vec![
            "PatientID\tPatientRace\tPatientMaritalStatus\tPatientLanguage\tPatientPopulationPercentageBelowPoverty\tPatientGender\tPatientDateOfBirth".to_string(),
            "1A\tWhite\tSingle\tEnglish\t12.2\tMale\t2000-06-15 02:45:40.547".to_string(),
        ];
        let lab_lines = vec![
            "LabDateTime\tLabUnits\tLabValue\tLabName\tAdmissionID\tPatientID".to_string(),
            "2001-07-01 03:20:24.070\tmg/dL\t37\tPOTASSIUM\t1\t1A".to_string(),
        ];

        let shuffled = CohortBuilder::default().from_lines(&subject_lines, &lab_lines).unwrap();
        let canonical = build(&[PATIENT_1A], &[POTASSIUM_1A]).unwrap();

        assert_eq!(shuffled.get("1A"), canonical.get("1A"));
    }

    #[test]
    fn test_orphan_lab_fails() {
        let result = build(
            &[PATIENT_1A],
            &[POTASSIUM_1A, "2A\t1\tPOTASSIUM\t40\tmg/dL\t2001-07-01 03:20:24.070"],
        );

        match result {
            Err(LoaderError::ReferentialIntegrity { patient_id }) => assert_eq!(patient_id, "2A"),
            other => panic!("expected referential integrity error, got {other:?}"),
        }
    }

    #[test]
    fn test_subject_schema_mismatch() {
        let subject_lines = vec!["PatientID\tPatientRace".to_string()];
        let result = CohortBuilder::default().from_lines(&subject_lines, &labs(&[]));
        assert!(matches!(result, Err(LoaderError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_bad_birth_date_fails_build() {
        let result = build(&["1A\tMale\t2000-06-15\tWhite\tSingle\tEnglish\t12.2"], &[]);
        assert!(matches!(
            result,
            Err(LoaderError::Model(ModelError::MalformedTimestamp { .. }))
        ));
    }

    #[test]
    fn test_duplicate_patient() {
        let second = "1A\tFemale\t1990-01-01 00:00:00.000\tAsian\tMarried\tSpanish\t3.0";
        assert!(matches!(
            build(&[PATIENT_1A, second], &[]),
            Err(LoaderError::DuplicatePatient { patient_id }) if patient_id == "1A"
        ));

        let config = LoaderConfig {
            allow_duplicate_patients: true,
            ..Default::default()
        };
        let cohort = CohortBuilder::new(config)
            .from_lines(&subjects(&[PATIENT_1A, second]), &labs(&[]))
            .unwrap();
        assert_eq!(cohort.get("1A").unwrap().gender(), "Male");
        assert_eq!(cohort.stats().duplicate_subjects, 1);
    }

    #[test]
    fn test_patient_without_labs() {
        let cohort = build(&[PATIENT_1A], &[]).unwrap();
        let patient = cohort.get("1A").unwrap();
        assert_eq!(patient.observation_count(), 0);
        assert!(cohort.get("2A").is_none());
    }

    #[test]
    fn test_grouped_rows_round_trip_through_observations() {
        let lab_rows = [
            POTASSIUM_1A,
            "2A\t3\tPOTASSIUM\t4\tmg/dL\t2002-01-01 00:00:00.000",
            "1A\t2\tA1C\t5.5\t%\t2001-08-01 03:20:24.070",
            "1A\t2\tPOTASSIUM\t38\tmg/dL\t2001-09-01 03:20:24.070",
        ];
        let patient_2a = "2A\tFemale\t1990-01-01 00:00:00.000\tAsian\tMarried\tSpanish\t3.0";
        let cohort = build(&[PATIENT_1A, patient_2a], &lab_rows).unwrap();
        let canonical = canonical_rows(LAB_COLUMNS, &labs(&lab_rows)).unwrap();

        for patient in cohort.patients() {
            let patient_rows = filter_rows(&canonical, patient.patient_id(), 0, 1).unwrap();
            for test_name in patient.test_names() {
                let expected = filter_rows(&patient_rows, test_name, 1, 0).unwrap();
                let flattened: Vec<StringRecord> = patient
                    .observations(test_name)
                    .unwrap()
                    .iter()
                    .zip(&expected)
                    .map(|(obs, row)| {
                        StringRecord::from(vec![
                            row.get(0).unwrap_or(""),
                            obs.test_name(),
                            obs.value(),
                            obs.units(),
                            obs.collected_at(),
                        ])
                    })
                    .collect();
                assert_eq!(flattened.len(), expected.len());
                assert_eq!(flattened, expected);
            }
        }
    }

    #[test]
    fn test_from_files_names_directory_of_missing_file() {
        let mut files = EhrFiles::new();
        files.subjects_file = Some(PathBuf::from("/data/ehr/PatientCorePopulatedTable.txt"));

        match Cohort::from_files(&files, LoaderConfig::default()) {
            Err(LoaderError::RequiredFileMissing { file_type, directory }) => {
                assert_eq!(file_type, "Labs");
                assert_eq!(PathBuf::from(directory), PathBuf::from("/data/ehr"));
            }
            other => panic!("expected missing labs file, got {other:?}"),
        }
    }

    #[test]
    fn test_from_readers() {
        let subject_text = subjects(&[PATIENT_1A]).join("\n");
        let lab_text = labs(&[POTASSIUM_1A]).join("\r\n");
        let cohort = CohortBuilder::default()
            .from_readers(subject_text.as_bytes(), lab_text.as_bytes())
            .unwrap();
        assert_eq!(cohort.observation_count(), 1);
    }
}
