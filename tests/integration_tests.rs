use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use enviro_web::{
    sensors::{reading::keys, simulated},
    EnviroConfig, PersistSchedule, PersistenceStore, QueryEngine, RangeSelector, Reading,
    ReadingSnapshot, Scheduler, SensorArray, Shutdown,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

fn sample(time: NaiveDateTime, temp: f64) -> Reading {
    Reading::new(time)
        .with(keys::TEMPERATURE, Some(temp))
        .with(keys::HUMIDITY, Some(40.0))
        .with(keys::PRESSURE, None)
}

fn store() -> (TempDir, PersistenceStore) {
    let dir = TempDir::new().expect("Should create temp dir");
    let store = PersistenceStore::new(dir.path());
    (dir, store)
}

async fn append(store: &PersistenceStore, reading: &Reading) {
    assert_ok!(store.append(reading.time().date(), reading).await);
}

#[tokio::test]
async fn test_two_saves_then_day_query() {
    let (_dir, store) = store();
    let first = sample(at(2024, 1, 1, 0, 0), 20.0);
    let second = sample(at(2024, 1, 1, 0, 15), 20.5);
    append(&store, &first).await;
    append(&store, &second).await;

    let engine = QueryEngine::new(store);
    let readings = assert_ok!(
        engine
            .query_at(RangeSelector::Day, at(2024, 1, 1, 0, 16))
            .await
    );
    assert_eq!(readings, vec![first, second]);
}

#[tokio::test]
async fn test_saved_file_layout() {
    let (_dir, store) = store();
    let reading = sample(at(2024, 1, 1, 0, 0), 20.0);
    append(&store, &reading).await;

    let path = store.log_path(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert!(path.ends_with("2024-01-01.json"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "[\n    {\n        \"time\": \"Mon Jan 01 00:00:00 2024\",\n        \"temp\": 20.0,\n        \"humi\": 40.0,\n        \"pres\": null\n    }\n]"
    );
}

/// Test every appended reading comes back in order
#[tokio::test]
async fn test_append_round_trip() {
    let (_dir, store) = store();
    let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    let written: Vec<Reading> = (0..96)
        .map(|i| sample(date.and_hms_opt(0, 0, 0).unwrap() + ChronoDuration::minutes(15 * i), i as f64))
        .collect();
    for reading in &written {
        append(&store, reading).await;
    }

    let loaded = assert_ok!(store.load_day(date).await);
    assert_eq!(loaded, written);
}

/// Test appending leaves earlier entries byte-for-byte intact
#[tokio::test]
async fn test_existing_entries_preserved() {
    let (_dir, store) = store();
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    std::fs::write(
        store.log_path(date),
        r#"[{"time": "Mon Jan  1 00:00:00 2024", "pres": 1001.5, "temp": 19.0, "extra": "kept"}]"#,
    )
    .unwrap();

    append(&store, &sample(at(2024, 1, 1, 0, 15), 21.0)).await;

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.log_path(date)).unwrap()).unwrap();
    let first = raw[0].as_object().unwrap();
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    assert_eq!(keys, ["time", "pres", "temp", "extra"]);
    assert_eq!(first["extra"], "kept");
    assert_eq!(raw.as_array().unwrap().len(), 2);
}

/// Test a corrupt day file is reset on the next append
#[tokio::test]
async fn test_corrupt_file_recovery() {
    let (_dir, store) = store();
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    std::fs::write(store.log_path(date), "[{\"time\": \"Mon Jan 01 00:00:00 2024\", \"te").unwrap();

    // unreadable days are skipped by queries
    let loaded = assert_ok!(store.load_day(date).await);
    assert!(loaded.is_empty());

    let reading = sample(at(2024, 1, 1, 0, 15), 21.0);
    append(&store, &reading).await;
    let loaded = assert_ok!(store.load_day(date).await);
    assert_eq!(loaded, vec![reading]);
}

/// Test the day query spans midnight and excludes older readings
#[tokio::test]
async fn test_day_query_across_midnight() {
    let (_dir, store) = store();
    let too_old = sample(at(2024, 1, 1, 9, 45), 18.0);
    let boundary = sample(at(2024, 1, 1, 10, 0), 18.5);
    let evening = sample(at(2024, 1, 1, 23, 45), 19.0);
    let morning = sample(at(2024, 1, 2, 9, 30), 20.0);
    for reading in [&morning, &too_old, &evening, &boundary] {
        append(&store, reading).await;
    }

    let engine = QueryEngine::new(store);
    let readings = assert_ok!(
        engine
            .query_at(RangeSelector::Day, at(2024, 1, 2, 10, 0))
            .await
    );
    assert_eq!(readings, vec![boundary, evening, morning]);
}

/// Test a year of quarter-hour saves is capped and ordered
#[tokio::test]
async fn test_long_range_downsampled() {
    let (_dir, store) = store();
    let now = at(2024, 1, 31, 23, 59);
    let start = at(2024, 1, 1, 0, 0);
    let mut time = start;
    let mut total = 0;
    while time <= now {
        append(&store, &sample(time, 20.0)).await;
        time += ChronoDuration::minutes(15);
        total += 1;
    }

    let engine = QueryEngine::new(store);
    let month = assert_ok!(engine.query_at(RangeSelector::Month, now).await);
    assert!(month.len() <= 192);
    assert!(month.len() > 96, "{} of {}", month.len(), total);
    assert!(month.windows(2).all(|w| w[0].time() < w[1].time()));

    let day = assert_ok!(engine.query_at(RangeSelector::Day, now).await);
    assert_eq!(day.len(), 96);
}

/// Test a week query without intervening writes returns the same series twice
#[tokio::test]
async fn test_week_query_is_idempotent() {
    let (_dir, store) = store();
    for day in [3, 1, 6, 2, 5, 4] {
        for minute in [45, 0, 30, 15] {
            append(&store, &sample(at(2024, 2, day, 12, minute), f64::from(day))).await;
        }
    }

    let engine = QueryEngine::new(store);
    let now = at(2024, 2, 6, 23, 0);
    let first = assert_ok!(engine.query_at(RangeSelector::Week, now).await);
    let second = assert_ok!(engine.query_at(RangeSelector::Week, now).await);
    assert_eq!(first.len(), 24);
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0].time() < w[1].time()));
}

/// Test a day log that cannot be read does not hide the other days
#[tokio::test]
async fn test_unreadable_day_is_skipped_by_queries() {
    let (_dir, store) = store();
    std::fs::create_dir(store.log_path(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())).unwrap();
    let kept = sample(at(2024, 1, 2, 9, 0), 20.0);
    append(&store, &kept).await;

    let engine = QueryEngine::new(store);
    let readings = assert_ok!(engine.query_at(RangeSelector::Week, at(2024, 1, 2, 12, 0)).await);
    assert_eq!(readings, vec![kept]);
}

#[tokio::test]
async fn test_unknown_range_token_is_empty() {
    let (_dir, store) = store();
    append(&store, &sample(Local::now().naive_local(), 20.0)).await;
    let engine = QueryEngine::new(store);
    assert!(assert_ok!(engine.query_token("fortnight").await).is_empty());
    assert_eq!(assert_ok!(engine.query_token("").await).len(), 1);
}

/// Test the scheduler publishes samples and persists on a due slot
#[tokio::test(start_paused = true)]
async fn test_scheduler_end_to_end() {
    let (_dir, store) = store();
    let config = EnviroConfig::default();
    let shutdown = Shutdown::new();
    let mut sensors = SensorArray::from_config(&config, simulated::drivers(), None);
    let initial = assert_ok!(sensors.sample(&shutdown).await);
    assert_eq!(initial.len(), 14);
    let snapshot = Arc::new(ReadingSnapshot::new(initial));

    let due_now = Local::now().naive_local() - ChronoDuration::seconds(1);
    let handle = Scheduler::new(
        sensors,
        Arc::clone(&snapshot),
        store.clone(),
        config.sampling.idle_time(),
        config.sampling.save_interval_minutes,
    )
    .with_schedule(PersistSchedule::with_next(due_now, 15))
    .spawn(shutdown);

    let mut updates = snapshot.subscribe();
    for _ in 0..3 {
        assert_ok!(updates.changed().await);
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_ok!(handle.shutdown(None).await);

    let today = Local::now().date_naive();
    let saved = assert_ok!(store.load_day(today).await);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].len(), 14);
}
