use invoice_roi::core::{RawSimulationInput, SimulationConstants, simulate};
use invoice_roi::error::StoreError;
use invoice_roi::store::{Scenario, ScenarioStore, SqliteScenarioStore};
use serde_json::json;
use tempfile::TempDir;

fn raw(value: serde_json::Value) -> RawSimulationInput {
    serde_json::from_value(value).expect("raw input")
}

fn open(dir: &TempDir) -> SqliteScenarioStore {
    let path = dir.path().join("scenarios.db");
    SqliteScenarioStore::open(path.to_str().expect("utf8 path")).expect("open store")
}

#[test]
fn scenarios_survive_reopening_the_database() {
    let dir = TempDir::new().expect("tempdir");
    let output = simulate(
        &raw(json!({
            "monthly_invoice_volume": 4321.5,
            "num_ap_staff": 2.5,
            "avg_hours_per_invoice": 0.123456789,
            "hourly_wage": 31.17,
            "error_rate_manual": 1.9,
            "error_cost": 77.7,
            "time_horizon_months": 24,
            "one_time_implementation_cost": 65_432.1
        })),
        &SimulationConstants::default(),
    );
    let scenario = Scenario::new("Persisted", &output);

    {
        let store = open(&dir);
        store.insert(&scenario).expect("insert");
    }

    let store = open(&dir);
    let loaded = store.get_by_id(&scenario.id).expect("get");
    assert_eq!(loaded, scenario);
    assert_eq!(loaded.inputs, output.inputs);
    assert_eq!(loaded.results, output.results);
    assert_eq!(
        loaded.inputs.avg_hours_per_invoice.to_bits(),
        output.inputs.avg_hours_per_invoice.to_bits()
    );
    assert_eq!(store.list_all().expect("list"), vec![scenario.summary()]);
}

#[test]
fn delete_is_persistent_and_second_delete_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    let output = simulate(&RawSimulationInput::default(), &SimulationConstants::default());
    let scenario = Scenario::new("Short lived", &output);

    let store = open(&dir);
    store.insert(&scenario).expect("insert");
    store.delete_by_id(&scenario.id).expect("delete");
    drop(store);

    let store = open(&dir);
    assert!(store.list_all().expect("list").is_empty());
    assert!(matches!(
        store.delete_by_id(&scenario.id),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn generated_ids_are_unique() {
    let store = SqliteScenarioStore::in_memory().expect("store");
    let output = simulate(&RawSimulationInput::default(), &SimulationConstants::default());
    for i in 0..200 {
        store
            .insert(&Scenario::new(&format!("s{i}"), &output))
            .expect("insert");
    }
    assert_eq!(store.list_all().expect("list").len(), 200);
}
