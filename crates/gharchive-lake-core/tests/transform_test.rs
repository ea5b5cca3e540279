// Integration tests for the staged transform
//
// Drive the engine through register → clean → aggregate with small
// newline-delimited JSON fixtures shaped like GH Archive events.

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::compute::concat_batches;
use arrow::datatypes::{Int64Type, TimestampMicrosecondType};
use flate2::write::GzEncoder;
use flate2::Compression;
use gharchive_lake_core::schema::{agg_schema, clean_schema, column};
use gharchive_lake_core::{RawObject, Stage, TransformEngine, TransformError};
use std::io::Write;

fn event(id: &str, kind: &str, repo_id: i64, repo: &str, created_at: &str) -> String {
    format!(
        r#"{{"id":"{id}","type":"{kind}","actor":{{"id":7,"login":"octo","display_login":"Octo"}},"repo":{{"id":{repo_id},"name":"{repo}","url":"https://api.github.com/repos/{repo}"}},"payload":{{}},"public":true,"created_at":"{created_at}"}}"#
    )
}

fn ndjson(lines: &[String]) -> Vec<u8> {
    let mut out = lines.join("\n").into_bytes();
    out.push(b'\n');
    out
}

fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn aggregate_fixture() -> Vec<String> {
    vec![
        event("1", "PushEvent", 1, "r1", "2023-01-01T10:00:00Z"),
        event("2", "PushEvent", 1, "r1", "2023-01-01T11:30:00Z"),
        event("3", "IssuesEvent", 2, "r2", "2023-01-01T12:00:00Z"),
        event("4", "PushEvent", 1, "r1", "2023-01-02T00:05:00Z"),
    ]
}

async fn collect(engine: &TransformEngine, stage: Stage) -> RecordBatch {
    let batches = engine.stage_batches(stage).await.unwrap();
    let schema = stage.schema().unwrap();
    concat_batches(&schema, &batches).unwrap()
}

#[tokio::test]
async fn test_clean_preserves_row_count() {
    let engine = TransformEngine::new();
    let raw = RawObject::new("2023-01-01-10.json.gz", gzip(&ndjson(&aggregate_fixture())));

    let registered = engine.register_raw(&[raw]).await.unwrap();
    assert_eq!(registered.rows, 4);
    assert_eq!(registered.skipped, 0);

    let cleaned = engine.clean().await.unwrap();
    assert_eq!(cleaned.rows, registered.rows);
    assert_eq!(engine.row_count(Stage::Clean).await.unwrap(), 4);

    let batch = collect(&engine, Stage::Clean).await;
    assert_eq!(batch.schema(), clean_schema());
    let user_ids = batch
        .column_by_name(column::USER_ID)
        .unwrap()
        .as_primitive::<Int64Type>();
    assert_eq!(user_ids.value(0), 7);
    let dates = batch
        .column_by_name(column::EVENT_DATE)
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();
    // 2023-01-01T10:00:00Z
    assert_eq!(dates.value(0), 1_672_567_200_000_000);
}

#[tokio::test]
async fn test_missing_nested_fields_become_null() {
    let engine = TransformEngine::new();
    let lines = vec![
        r#"{"id":"1","type":"PushEvent","created_at":"2023-01-01T00:00:00Z"}"#.to_string(),
        r#"{"id":"2","type":"WatchEvent","repo":{"id":3},"created_at":"not a date"}"#.to_string(),
    ];
    engine
        .register_raw(&[RawObject::new("a.json", ndjson(&lines))])
        .await
        .unwrap();
    engine.clean().await.unwrap();

    let batch = collect(&engine, Stage::Clean).await;
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.column_by_name(column::USER_ID).unwrap().null_count(), 2);
    assert_eq!(batch.column_by_name(column::USER_NAME).unwrap().null_count(), 2);
    assert_eq!(batch.column_by_name(column::REPO_NAME).unwrap().null_count(), 2);

    let repo_ids = batch
        .column_by_name(column::REPO_ID)
        .unwrap()
        .as_primitive::<Int64Type>();
    assert!(repo_ids.is_null(0));
    assert_eq!(repo_ids.value(1), 3);

    // unparseable timestamp converts to null instead of failing
    let dates = batch.column_by_name(column::EVENT_DATE).unwrap();
    assert!(dates.is_valid(0));
    assert!(dates.is_null(1));
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let engine = TransformEngine::new();
    let mut lines = aggregate_fixture();
    lines.insert(1, "{\"id\": \"broken\"".to_string());
    lines.insert(3, "garbage".to_string());

    let summary = engine
        .register_raw(&[RawObject::new("a.json", ndjson(&lines))])
        .await
        .unwrap();
    assert_eq!(summary.skipped, 2);
    assert!(summary.rows >= lines.len() - 2);
    assert_eq!(summary.rows, 4);
}

#[tokio::test]
async fn test_payload_drift_costs_only_the_conflicting_record() {
    let engine = TransformEngine::new();
    let base = event("1", "PushEvent", 1, "r1", "2023-01-01T10:00:00Z");
    let lines = vec![
        base.replace(r#""payload":{}"#, r#""payload":{"size":1}"#),
        base.replace(r#""payload":{}"#, r#""payload":"opaque""#),
        base.replace(r#""payload":{}"#, r#""payload":{"size":2.5}"#),
        base.replace(r#""payload":{}"#, r#""payload":{"size":"large"}"#),
        base.replace(r#""payload":{}"#, r#""payload":{"size":3}"#),
    ];

    let summary = engine
        .register_raw(&[RawObject::new("a.json", ndjson(&lines))])
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.rows, 4);
    assert_eq!(engine.clean().await.unwrap().rows, 4);
}

#[tokio::test]
async fn test_aggregate_groups_by_day() {
    let engine = TransformEngine::new();
    engine
        .register_raw(&[RawObject::new("a.json", ndjson(&aggregate_fixture()))])
        .await
        .unwrap();
    engine.clean().await.unwrap();
    let summary = engine.aggregate().await.unwrap();
    assert_eq!(summary.rows, 3);

    let batch = collect(&engine, Stage::Agg).await;
    assert_eq!(batch.schema(), agg_schema());

    let types = batch.column_by_name(column::EVENT_TYPE).unwrap().as_string::<i32>();
    let counts = batch
        .column_by_name(column::EVENT_COUNT)
        .unwrap()
        .as_primitive::<Int64Type>();
    let days = batch
        .column_by_name(column::EVENT_DATE)
        .unwrap()
        .as_primitive::<TimestampMicrosecondType>();

    // sorted by day, then event type
    let rows: Vec<(&str, i64, i64)> = (0..batch.num_rows())
        .map(|i| (types.value(i), days.value(i), counts.value(i)))
        .collect();
    let day1 = 1_672_531_200_000_000; // 2023-01-01T00:00:00Z
    let day2 = 1_672_617_600_000_000; // 2023-01-02T00:00:00Z
    assert_eq!(
        rows,
        vec![
            ("IssuesEvent", day1, 1),
            ("PushEvent", day1, 2),
            ("PushEvent", day2, 1),
        ]
    );

    let total: i64 = counts.values().iter().sum();
    assert_eq!(total as usize, engine.row_count(Stage::Clean).await.unwrap());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let engine = TransformEngine::new();
    let raw = [RawObject::new("a.json", ndjson(&aggregate_fixture()))];

    engine.register_raw(&raw).await.unwrap();
    engine.clean().await.unwrap();
    engine.aggregate().await.unwrap();
    let first_clean = collect(&engine, Stage::Clean).await;
    let first_agg = collect(&engine, Stage::Agg).await;

    engine.register_raw(&raw).await.unwrap();
    engine.clean().await.unwrap();
    engine.aggregate().await.unwrap();

    assert_eq!(collect(&engine, Stage::Clean).await, first_clean);
    assert_eq!(collect(&engine, Stage::Agg).await, first_agg);
    engine.close().unwrap();
}

#[tokio::test]
async fn test_load_clean_feeds_aggregate() {
    let producer = TransformEngine::new();
    producer
        .register_raw(&[RawObject::new("a.json", ndjson(&aggregate_fixture()))])
        .await
        .unwrap();
    producer.clean().await.unwrap();
    let exported = producer.stage_batches(Stage::Clean).await.unwrap();
    producer.close().unwrap();

    let engine = TransformEngine::new();
    let loaded = engine.load_clean(&exported).await.unwrap();
    assert_eq!(loaded.rows, 4);
    assert_eq!(engine.aggregate().await.unwrap().rows, 3);
}

#[tokio::test]
async fn test_no_input_is_an_error() {
    let engine = TransformEngine::new();
    let err = engine.register_raw(&[]).await.unwrap_err();
    assert!(matches!(err, TransformError::NoInput { stage: Stage::Raw }));

    let err = engine.load_clean(&[]).await.unwrap_err();
    assert!(matches!(err, TransformError::NoInput { stage: Stage::Clean }));
}

#[tokio::test]
async fn test_stage_order_is_enforced() {
    let engine = TransformEngine::new();
    // aggregate reads the clean table, which was never built
    let err = engine.aggregate().await.unwrap_err();
    assert!(matches!(err, TransformError::Stage { stage: Stage::Clean, .. }));
}
