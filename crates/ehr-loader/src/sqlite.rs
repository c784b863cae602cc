//! SQLite-backed patient repository.
//!
//! Stores a cohort in two tables:
//!
//! - `Patients(PatientID PK, PatientGender, PatientDateOfBirth, PatientRace)`
//! - `Labs(LabID PK, PatientID, LabName, LabValue, LabUnits, LabDateTime)`
//!
//! Saving replaces both tables inside one transaction, so a reader sees
//! either the previous cohort or the new one.

use std::borrow::Cow;
use std::path::Path;

use ehr_types::{format_timestamp, Observation, Patient};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::repository::PatientRepository;
use crate::store::Cohort;
use crate::types::LoaderResult;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Patients (
        PatientID TEXT PRIMARY KEY,
        PatientGender TEXT NOT NULL,
        PatientDateOfBirth TEXT NOT NULL,
        PatientRace TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS Labs (
        LabID INTEGER PRIMARY KEY AUTOINCREMENT,
        PatientID TEXT NOT NULL REFERENCES Patients(PatientID),
        LabName TEXT NOT NULL,
        LabValue TEXT NOT NULL,
        LabUnits TEXT NOT NULL,
        LabDateTime TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_labs_patient ON Labs(PatientID);
";

/// Persistent store for a cohort.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> LoaderResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> LoaderResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> LoaderResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Replaces the stored cohort. Returns the number of lab rows written.
    pub fn save_cohort(&mut self, cohort: &Cohort) -> LoaderResult<usize> {
        let mut patients: Vec<&Patient> = cohort.patients().collect();
        patients.sort_by(|a, b| a.patient_id().cmp(b.patient_id()));

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM Labs", [])?;
        tx.execute("DELETE FROM Patients", [])?;

        let mut lab_count = 0;
        {
            let mut insert_patient = tx.prepare(
                "INSERT INTO Patients (PatientID, PatientGender, PatientDateOfBirth, PatientRace)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_lab = tx.prepare(
                "INSERT INTO Labs (PatientID, LabName, LabValue, LabUnits, LabDateTime)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for patient in &patients {
                insert_patient.execute(params![
                    patient.patient_id(),
                    patient.gender(),
                    format_timestamp(&patient.date_of_birth()),
                    patient.race(),
                ])?;

                for observation in patient.labs().values().flatten() {
                    insert_lab.execute(params![
                        observation.patient_id(),
                        observation.test_name(),
                        observation.value(),
                        observation.units(),
                        observation.collected_at(),
                    ])?;
                    lab_count += 1;
                }
            }
        }
        tx.commit()?;

        info!("Saved {} patients and {} labs", patients.len(), lab_count);
        Ok(lab_count)
    }

    /// Number of stored patients.
    pub fn patient_count(&self) -> LoaderResult<usize> {
        self.count("SELECT COUNT(*) FROM Patients")
    }

    /// Number of stored lab rows.
    pub fn lab_count(&self) -> LoaderResult<usize> {
        self.count("SELECT COUNT(*) FROM Labs")
    }

    fn count(&self, sql: &str) -> LoaderResult<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl PatientRepository for SqliteStore {
    fn patient_ids(&self) -> LoaderResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT PatientID FROM Patients ORDER BY PatientID")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn load_patient(&self, patient_id: &str) -> LoaderResult<Option<Cow<'_, Patient>>> {
        let row = self
            .conn
            .query_row(
                "SELECT PatientID, PatientGender, PatientDateOfBirth, PatientRace
                 FROM Patients WHERE PatientID = ?1",
                params![patient_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, gender, date_of_birth, race)) = row else {
            return Ok(None);
        };

        let mut patient = Patient::new(id, gender, &date_of_birth, race)?;
        for observation in self.load_observations(patient_id)? {
            patient.add_labs(observation)?;
        }
        Ok(Some(Cow::Owned(patient)))
    }

    fn load_observations(&self, patient_id: &str) -> LoaderResult<Vec<Observation>> {
        let mut stmt = self.conn.prepare(
            "SELECT PatientID, LabName, LabValue, LabUnits, LabDateTime
             FROM Labs WHERE PatientID = ?1 ORDER BY LabName, LabID",
        )?;
        let observations = stmt
            .query_map(params![patient_id], |row| {
                Ok(Observation::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(observations)
    }
}
