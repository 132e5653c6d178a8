//! SQLite persistence for saved scenarios.
//!
//! Only this module talks to the database. Inputs and results are stored as
//! JSON text and come back bit-identical.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{SimulationInput, SimulationOutput, SimulationResult};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub scenario_name: String,
    pub inputs: SimulationInput,
    pub results: SimulationResult,
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    /// Fresh scenario with a random id, stamped now. `created_at` is truncated
    /// to the precision the store keeps.
    pub fn new(scenario_name: &str, output: &SimulationOutput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scenario_name: scenario_name.to_string(),
            inputs: output.inputs,
            results: output.results,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            id: self.id.clone(),
            scenario_name: self.scenario_name.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub scenario_name: String,
    pub created_at: DateTime<Utc>,
}

pub trait ScenarioStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateKey`] if the id is taken.
    fn insert(&self, scenario: &Scenario) -> StoreResult<String>;

    /// Newest first.
    fn list_all(&self) -> StoreResult<Vec<ScenarioSummary>>;

    fn get_by_id(&self, id: &str) -> StoreResult<Scenario>;

    fn delete_by_id(&self, id: &str) -> StoreResult<()>;
}

pub struct SqliteScenarioStore {
    conn: Mutex<Connection>,
    path: Option<String>,
}

impl SqliteScenarioStore {
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // :memory: ignores WAL.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_string()),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Private in-memory database, used in tests.
    pub fn in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn migrate(&self) -> StoreResult<()> {
        self.conn()?
            .execute_batch(include_str!("../../migrations/001_scenarios.sql"))?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

struct ScenarioRow {
    id: String,
    scenario_name: String,
    inputs: String,
    results: String,
    created_at: i64,
}

impl ScenarioRow {
    fn into_scenario(self) -> StoreResult<Scenario> {
        let created_at = timestamp_from_micros(&self.id, self.created_at)?;
        Ok(Scenario {
            inputs: serde_json::from_str(&self.inputs)?,
            results: serde_json::from_str(&self.results)?,
            id: self.id,
            scenario_name: self.scenario_name,
            created_at,
        })
    }
}

fn timestamp_from_micros(id: &str, micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StoreError::Timestamp {
        id: id.to_string(),
        micros,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl ScenarioStore for SqliteScenarioStore {
    fn insert(&self, scenario: &Scenario) -> StoreResult<String> {
        let inputs = serde_json::to_string(&scenario.inputs)?;
        let results = serde_json::to_string(&scenario.results)?;
        let inserted = self.conn()?.execute(
            "INSERT INTO scenario (id, scenario_name, inputs, results, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &scenario.id,
                &scenario.scenario_name,
                inputs,
                results,
                scenario.created_at.timestamp_micros(),
            ],
        );
        match inserted {
            Ok(_) => {
                log::debug!("Inserted scenario {}", scenario.id);
                Ok(scenario.id.clone())
            }
            Err(e) if is_constraint_violation(&e) => Err(StoreError::DuplicateKey {
                id: scenario.id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self) -> StoreResult<Vec<ScenarioSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, scenario_name, created_at
             FROM scenario
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, scenario_name, micros)| {
                let created_at = timestamp_from_micros(&id, micros)?;
                Ok(ScenarioSummary {
                    id,
                    scenario_name,
                    created_at,
                })
            })
            .collect()
    }

    fn get_by_id(&self, id: &str) -> StoreResult<Scenario> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, scenario_name, inputs, results, created_at
                 FROM scenario WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ScenarioRow {
                        id: row.get(0)?,
                        scenario_name: row.get(1)?,
                        inputs: row.get(2)?,
                        results: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        match row {
            Some(row) => row.into_scenario(),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM scenario WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        log::debug!("Deleted scenario {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RawSimulationInput, SimulationConstants, simulate};
    use chrono::TimeDelta;
    use serde_json::json;

    fn sample_output() -> SimulationOutput {
        let raw: RawSimulationInput = serde_json::from_value(json!({
            "monthly_invoice_volume": 1234.5,
            "num_ap_staff": 2,
            "avg_hours_per_invoice": 0.1,
            "hourly_wage": 27.35,
            "error_rate_manual": 3.3,
            "error_cost": 45.5,
            "time_horizon_months": 18,
            "one_time_implementation_cost": 0
        }))
        .expect("raw input");
        simulate(&raw, &SimulationConstants::default())
    }

    #[test]
    fn insert_then_get_round_trips_exactly() {
        let store = SqliteScenarioStore::in_memory().expect("store");
        let output = sample_output();
        let scenario = Scenario::new("Q3 pilot", &output);

        let id = store.insert(&scenario).expect("insert");
        assert_eq!(id, scenario.id);

        let loaded = store.get_by_id(&id).expect("get");
        assert_eq!(loaded, scenario);
        assert_eq!(loaded.results.roi_percentage, None);
        assert_eq!(
            loaded.results.monthly_savings.to_bits(),
            output.results.monthly_savings.to_bits()
        );
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = SqliteScenarioStore::in_memory().expect("store");
        let scenario = Scenario::new("dup", &sample_output());
        store.insert(&scenario).expect("first insert");

        let err = store.insert(&scenario).expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateKey { ref id } if *id == scenario.id));
        assert_eq!(store.list_all().expect("list").len(), 1);
    }

    #[test]
    fn list_is_newest_first() {
        let store = SqliteScenarioStore::in_memory().expect("store");
        let output = sample_output();
        let mut older = Scenario::new("older", &output);
        older.created_at -= TimeDelta::hours(2);
        let newer = Scenario::new("newer", &output);
        let mut oldest = Scenario::new("oldest", &output);
        oldest.created_at -= TimeDelta::days(3);

        store.insert(&older).expect("insert");
        store.insert(&newer).expect("insert");
        store.insert(&oldest).expect("insert");

        let names: Vec<_> = store
            .list_all()
            .expect("list")
            .into_iter()
            .map(|s| s.scenario_name)
            .collect();
        assert_eq!(names, ["newer", "older", "oldest"]);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = SqliteScenarioStore::in_memory().expect("store");
        assert!(matches!(
            store.get_by_id("nope"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_by_id("nope"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_only_the_target() {
        let store = SqliteScenarioStore::in_memory().expect("store");
        let keep = Scenario::new("keep", &sample_output());
        let gone = Scenario::new("gone", &sample_output());
        store.insert(&keep).expect("insert");
        store.insert(&gone).expect("insert");

        store.delete_by_id(&gone.id).expect("delete");
        assert!(matches!(
            store.get_by_id(&gone.id),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete_by_id(&gone.id),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.list_all().expect("list"), vec![keep.summary()]);
    }
}
