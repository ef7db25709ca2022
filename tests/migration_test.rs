//! Startup migration against on-disk databases written with calendar-week
//! keys

use fiscal_ledger::db::schema::{self, SCHEMA_VERSION};
use fiscal_ledger::{Collection, Config, Day, Ledger, LedgerError, Store};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Every row of the records and schema tables, exactly as stored
type Snapshot = (Vec<(String, String, String, String)>, Vec<i32>);

fn snapshot(config: &Config) -> Snapshot {
    let store = Store::open(&config.database_path(), config.wal).unwrap();
    store
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT collection, key, value, updated_at FROM records ORDER BY collection, key",
            )?;
            let rows: Vec<(String, String, String, String)> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
                .collect::<Result<_, _>>()?;
            let mut stmt = conn.prepare("SELECT version FROM schema_version")?;
            let versions = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i32>, _>>()?;
            Ok((rows, versions))
        })
        .unwrap()
}

fn avs(day: &str, person: &str, gm: f64) -> Value {
    json!({"day": day, "person": person, "serviceId": "svc", "sold": 1, "price": 100, "gm": gm})
}

fn repair(day: &str, person: &str) -> Value {
    json!({"day": day, "person": person, "completed": 1})
}

/// A version 1 database holding legacy keys, some of them colliding
fn seed_legacy(temp: &TempDir) -> Config {
    let config = Config::with_storage_dir(temp.path());
    let store = Store::open(&config.database_path(), config.wal).unwrap();
    store
        .with_conn(|conn| schema::set_schema_version(conn, 1))
        .unwrap();

    // 2024-20 lands on 2024/2025-02, which already holds data
    store
        .put(Collection::AvsAssignments, "2024/2025-02", &json!([avs("Monday", "AA", 300.0)]))
        .unwrap();
    store
        .put(Collection::AvsAssignments, "2024-20", &json!([avs("Tuesday", "BB", 500.0)]))
        .unwrap();

    // two spellings of the same legacy week
    store
        .put(Collection::RepairTickets, "2025-01", &json!([repair("Monday", "AA")]))
        .unwrap();
    store
        .put(
            Collection::RepairTickets,
            "2025-1",
            &json!([repair("Tuesday", "BB"), repair("Friday", "CC")]),
        )
        .unwrap();

    store
        .put(Collection::WeekDates, "2024-20", &json!({"Monday": "13.05"}))
        .unwrap();
    store
        .put(Collection::People, "list", &json!([{"code": "AA", "firstName": "A", "lastName": "A"}]))
        .unwrap();
    config
}

fn item_count(store: &Store, collection: Collection) -> usize {
    store
        .list_keys(collection)
        .unwrap()
        .iter()
        .map(|k| {
            let v: Value = store.get(collection, k).unwrap().unwrap();
            v.as_array().map_or(0, Vec::len)
        })
        .sum()
}

#[test]
fn test_legacy_database_is_upgraded_on_open() {
    let temp = TempDir::new().unwrap();
    let config = seed_legacy(&temp);

    let ledger = Ledger::open(&config).unwrap();
    let report = ledger.migration();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, SCHEMA_VERSION);
    assert_eq!(report.rewritten, 4);
    assert_eq!(report.merged, 2);

    let store = ledger.store();
    assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    assert_eq!(store.list_keys(Collection::AvsAssignments).unwrap(), vec!["2024/2025-02"]);
    assert_eq!(store.list_keys(Collection::RepairTickets).unwrap(), vec!["2024/2025-35"]);
    assert_eq!(store.list_keys(Collection::WeekDates).unwrap(), vec!["2024/2025-02"]);
    assert_eq!(store.list_keys(Collection::People).unwrap(), vec!["list"]);

    assert_eq!(
        ledger.available_weeks().unwrap(),
        vec!["2024/2025-35", "2024/2025-02"]
    );

    // existing items first, then the upgraded ones
    let week = ledger.week("2024/2025-02").unwrap();
    let people: Vec<&str> = week
        .week()
        .avs_assignments
        .iter()
        .map(|a| a.person.as_str())
        .collect();
    assert_eq!(people, vec!["AA", "BB"]);
    assert_eq!(week.week().week_dates.get(&Day::Monday).map(String::as_str), Some("13.05"));
}

#[test]
fn test_colliding_keys_conserve_line_items() {
    let temp = TempDir::new().unwrap();
    let config = seed_legacy(&temp);

    let before = {
        let store = Store::open(&config.database_path(), config.wal).unwrap();
        (
            item_count(&store, Collection::AvsAssignments),
            item_count(&store, Collection::RepairTickets),
        )
    };

    let ledger = Ledger::open(&config).unwrap();
    let after = (
        item_count(ledger.store(), Collection::AvsAssignments),
        item_count(ledger.store(), Collection::RepairTickets),
    );
    assert_eq!(before, (2, 3));
    assert_eq!(after, before);
}

#[test]
fn test_second_run_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let config = seed_legacy(&temp);

    drop(Ledger::open(&config).unwrap());
    let first = snapshot(&config);

    let ledger = Ledger::open(&config).unwrap();
    assert!(ledger.migration().is_noop());
    drop(ledger);
    assert_eq!(snapshot(&config), first);
}

#[test]
fn test_bad_legacy_key_rolls_back_everything() {
    let temp = TempDir::new().unwrap();
    let config = seed_legacy(&temp);
    {
        let store = Store::open(&config.database_path(), config.wal).unwrap();
        store
            .put(Collection::QualityInspections, "2024-00", &json!([]))
            .unwrap();
    }
    let before = snapshot(&config);

    let err = Ledger::open(&config).err().unwrap();
    assert!(matches!(err, LedgerError::MigrationFailed(_)));
    assert_eq!(snapshot(&config), before);
}

#[test]
fn test_unreadable_record_rolls_back_everything() {
    let temp = TempDir::new().unwrap();
    let config = seed_legacy(&temp);
    {
        let store = Store::open(&config.database_path(), config.wal).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO records (collection, key, value) VALUES ('repairTickets', '2024-21', '{not json')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
    }
    let before = snapshot(&config);

    assert!(matches!(
        Ledger::open(&config),
        Err(LedgerError::MigrationFailed(_))
    ));
    assert_eq!(snapshot(&config), before);
    assert_eq!(before.1, vec![1]);
}

#[test]
fn test_newer_database_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let config = Config::with_storage_dir(temp.path());
    {
        let store = Store::open(&config.database_path(), config.wal).unwrap();
        store
            .with_conn(|conn| schema::set_schema_version(conn, SCHEMA_VERSION + 1))
            .unwrap();
        store
            .put(Collection::RepairTickets, "2024-20", &json!([repair("Monday", "AA")]))
            .unwrap();
    }
    let before = snapshot(&config);

    let ledger = Ledger::open(&config).unwrap();
    assert!(ledger.migration().is_noop());
    drop(ledger);
    assert_eq!(snapshot(&config), before);
}

#[test]
fn test_fresh_database_starts_at_current_version() {
    let temp = TempDir::new().unwrap();
    let config = Config::with_storage_dir(temp.path().join("fresh"));
    let ledger = Ledger::open(&config).unwrap();
    assert_eq!(ledger.migration().from_version, 0);
    assert_eq!(ledger.store().schema_version().unwrap(), SCHEMA_VERSION);
}
