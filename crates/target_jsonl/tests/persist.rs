use std::{
    io::{self, Cursor, Read},
    path::Path,
    sync::Arc,
};

use object_store::{
    local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath, ObjectStore,
};
use serde_json::json;
use target_jsonl::{
    persist_messages, CollectingDiagnostics, Diagnostic, ErrorKind, TargetConfig, TargetError,
};

const USERS_SCHEMA: &str = r#"{"type":"SCHEMA","stream":"users","schema":{"type":"object","properties":{"id":{"type":"integer"}}},"key_properties":["id"]}"#;

fn input(lines: &[&str]) -> Cursor<Vec<u8>> {
    let mut text = lines.join("\n");
    text.push('\n');
    Cursor::new(text.into_bytes())
}

fn local_config(dir: &Path) -> TargetConfig {
    TargetConfig {
        destination_path: dir.to_string_lossy().into_owned(),
        write_to_s3: false,
        do_timestamp_file: false,
        ..TargetConfig::default()
    }
}

fn s3_config(prefix: &str, compress_output: bool, dir: &Path) -> TargetConfig {
    TargetConfig {
        destination_path: dir.to_string_lossy().into_owned(),
        write_to_s3: true,
        compress_output,
        do_timestamp_file: false,
        s3_bucket: "tap-exports".to_string(),
        s3_prefix: prefix.to_string(),
        ..TargetConfig::default()
    }
}

async fn run(
    config: &TargetConfig,
    reader: impl Read,
    store: Option<Arc<dyn ObjectStore>>,
) -> (Result<Option<serde_json::Value>, TargetError>, Vec<Diagnostic>) {
    let diagnostics = CollectingDiagnostics::new();
    let result = persist_messages(config, reader, store, Box::new(diagnostics.clone())).await;
    (result, diagnostics.snapshot())
}

async fn read_object(store: &dyn ObjectStore, key: &str) -> Vec<u8> {
    store
        .get(&ObjectPath::from(key))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap()
        .to_vec()
}

/// Fails the test if the pipeline ever touches its input.
struct UntouchableInput;

impl Read for UntouchableInput {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        panic!("input must not be read");
    }
}

#[tokio::test]
async fn local_append_writes_records_and_returns_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"STATE","value":{"bookmark":1}}"#,
        ]),
        None,
    )
    .await;

    assert_eq!(result.unwrap(), Some(json!({"bookmark": 1})));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("users.jsonl")).unwrap(),
        "{\"id\": 1}\n"
    );
}

#[tokio::test]
async fn local_append_drops_a_state_followed_by_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"STATE","value":{"bookmark":1}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
        ]),
        None,
    )
    .await;

    assert_eq!(result.unwrap(), None);
}

#[tokio::test]
async fn record_without_schema_aborts_without_creating_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"orders","record":{"id":1}}"#,
        ]),
        None,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownStream);
    assert!(err.to_string().contains("orders"));
    assert!(!dir.path().join("orders.jsonl").exists());
}

#[tokio::test]
async fn missing_prefix_fails_before_reading_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = s3_config("", false, dir.path());

    let (result, diagnostics) =
        run(&config, UntouchableInput, Some(Arc::new(InMemory::new()))).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);
    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn empty_input_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out");
    let config = local_config(&target);

    let (result, diagnostics) = run(&config, input(&["", "  "]), None).await;

    assert_eq!(result.unwrap(), None);
    assert!(!target.exists());
    assert_eq!(
        diagnostics.last(),
        Some(&Diagnostic::Finalized {
            checkpoint_present: false
        })
    );
}

#[tokio::test]
async fn invalid_record_stops_the_run_but_keeps_earlier_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":"two"}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":3}}"#,
        ]),
        None,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("/id"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("users.jsonl")).unwrap(),
        "{\"id\": 1}\n"
    );
}

#[tokio::test]
async fn malformed_line_reports_its_line_number() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, diagnostics) = run(&config, input(&[USERS_SCHEMA, "{not json"]), None).await;

    match result.unwrap_err() {
        TargetError::Decode { line_number, .. } => assert_eq!(line_number, 2),
        other => panic!("expected a decode error, got {other:?}"),
    }
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::DecodeFailed { line_number: 2, raw_line: Some(raw), .. } if raw == "{not json"
    )));
}

#[tokio::test]
async fn custom_name_and_timestamp_shape_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let config = TargetConfig {
        custom_name: Some("export".to_string()),
        do_timestamp_file: true,
        ..local_config(dir.path())
    };

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
        ]),
        None,
    )
    .await;
    result.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    let name = &names[0];
    assert!(name.starts_with("export-"), "{name}");
    assert!(name.ends_with(".jsonl"), "{name}");
    // export-YYYYMMDDTHHMMSS.jsonl
    assert_eq!(name.len(), "export-".len() + 15 + ".jsonl".len());
}

#[tokio::test]
async fn buffered_put_uploads_once_and_keeps_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = s3_config("exports/", false, dir.path());
    let store = Arc::new(InMemory::new());

    let (result, diagnostics) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"STATE","value":{"bookmark":0}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":2}}"#,
        ]),
        Some(store.clone()),
    )
    .await;

    assert_eq!(result.unwrap(), Some(json!({"bookmark": 0})));
    assert_eq!(
        read_object(store.as_ref(), "exports/users.json").await,
        b"{\"id\": 1}\n{\"id\": 2}\n"
    );
    let uploads = diagnostics
        .iter()
        .filter(|d| matches!(d, Diagnostic::UploadCompleted { .. }))
        .count();
    assert_eq!(uploads, 1);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn buffered_put_upload_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bucket");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(root.join("blocker"), "a file, not a directory").unwrap();
    let store: Arc<dyn ObjectStore> =
        Arc::new(LocalFileSystem::new_with_prefix(&root).unwrap());

    let config = s3_config("blocker/", false, dir.path());
    let (result, diagnostics) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"STATE","value":{"bookmark":1}}"#,
        ]),
        Some(store),
    )
    .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::UploadFailure);
    assert!(diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UploadFailed { key, .. } if key == "blocker/users.json"
    )));
}

#[tokio::test]
async fn gzip_upload_discards_checkpoint_after_upload() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    let config = s3_config("raw/", true, &staging);
    let store = Arc::new(InMemory::new());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"STATE","value":{"bookmark":1}}"#,
        ]),
        Some(store.clone()),
    )
    .await;

    assert_eq!(result.unwrap(), None);
    let compressed = read_object(store.as_ref(), "raw/users.json.gz").await;
    let mut text = String::new();
    flate2::read::MultiGzDecoder::new(compressed.as_slice())
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "{\"id\": 1}\n");
    assert!(staging.join("users.json.gz").exists());
}

const PRICES_SCHEMA: &str = r#"{"type":"SCHEMA","stream":"prices","schema":{"type":"object","properties":{"price":{"type":"number","multipleOf":0.01},"big":{"type":"integer"},"dec":{"type":"number"}}},"key_properties":[]}"#;

#[tokio::test]
async fn cent_prices_are_accepted_and_written_with_their_digits() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            PRICES_SCHEMA,
            r#"{"type":"RECORD","stream":"prices","record":{"price":0.29}}"#,
            r#"{"type":"RECORD","stream":"prices","record":{"price":0.07}}"#,
            r#"{"type":"RECORD","stream":"prices","record":{"big":123456789012345678901234567890,"dec":0.12345678901234567890123,"price":1.10}}"#,
        ]),
        None,
    )
    .await;

    result.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("prices.jsonl")).unwrap(),
        concat!(
            "{\"price\": 0.29}\n",
            "{\"price\": 0.07}\n",
            "{\"big\": 123456789012345678901234567890, \"dec\": 0.12345678901234567890123, ",
            "\"price\": 1.10}\n",
        )
    );
}

#[tokio::test]
async fn off_grid_price_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, _) = run(
        &config,
        input(&[
            r#"{"type":"SCHEMA","stream":"prices","schema":{"type":"object","properties":{"price":{"type":"number","multipleOf":0.05}}},"key_properties":[]}"#,
            r#"{"type":"RECORD","stream":"prices","record":{"price":0.15}}"#,
            r#"{"type":"RECORD","stream":"prices","record":{"price":0.03}}"#,
        ]),
        None,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("/price"), "{err}");
    assert!(err.to_string().contains("0.03 is not a multiple of 0.05"), "{err}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("prices.jsonl")).unwrap(),
        "{\"price\": 0.15}\n"
    );
}

#[tokio::test]
async fn null_state_withdraws_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = s3_config("exports/", false, dir.path());
    let store = Arc::new(InMemory::new());

    let (result, _) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"STATE","value":{"bookmark":0}}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
            r#"{"type":"STATE","value":null}"#,
        ]),
        Some(store.clone()),
    )
    .await;

    assert_eq!(result.unwrap(), None);
    assert_eq!(
        read_object(store.as_ref(), "exports/users.json").await,
        b"{\"id\": 1}\n"
    );
}

#[tokio::test]
async fn unknown_message_types_do_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let (result, diagnostics) = run(
        &config,
        input(&[
            USERS_SCHEMA,
            r#"{"type":"ACTIVATE_VERSION","stream":"users","version":3}"#,
            r#"{"type":"RECORD","stream":"users","record":{"id":1}}"#,
        ]),
        None,
    )
    .await;

    result.unwrap();
    assert!(diagnostics.contains(&Diagnostic::UnknownMessageType {
        line_number: 2,
        message_type: "ACTIVATE_VERSION".to_string(),
    }));
    assert!(dir.path().join("users.jsonl").exists());
}
