// Configuration loading integration tests

use csv_playback::config::{
    load_config, load_config_with_env, restart_keys, ConfigLoader, IngestMode, PlaybackConfig,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.yaml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        let config = load_config(&config_path).expect("default config should load");

        assert_eq!(config.player.asset_name, "sample");
        assert_eq!(config.player.csv_filename, "sinusoid.csv");
        assert_eq!(config.player.ingest_mode, IngestMode::Burst);
        assert_eq!(config.player.burst_size, 5);
        assert_eq!(config.storage.backend, "log");
        assert_eq!(config.logging.level, "info");
    }
}

#[test]
fn test_empty_document_uses_defaults() {
    let config: PlaybackConfig = ConfigLoader::from_yaml("{}").unwrap();

    assert_eq!(config.player.asset_name, "sample");
    assert!(config.player.header_row);
    assert_eq!(config.player.timestamp_col.as_deref(), Some("ts"));
    assert_eq!(config.player.timestamp_format, "%Y-%m-%d %H:%M:%S.%f");
    assert_eq!(config.player.ingest_mode, IngestMode::Burst);
    assert_eq!(config.player.sample_rate, 100);
    assert_eq!(config.player.burst_interval, 1000);
    assert_eq!(config.player.burst_size, 1);
    assert!(!config.player.repeat_loop);
    assert_eq!(config.storage.backend, "log");
}

#[test]
fn test_camel_case_keys_are_accepted() {
    let yaml = r#"
player:
  assetName: pump-7
  csvFilename: pump.csv
  headerRow: false
  fieldNames: "ts, flow, pressure"
  readingCols:
    flow: flow_rate
  timestampFromFile: true
  timestampCol: ts
  timestampFormat: "%H:%M:%S"
  ingestMode: realtime
  sampleRate: 10
  repeatLoop: true
"#;
    let config = ConfigLoader::from_yaml(yaml).unwrap();
    let player = &config.player;

    assert_eq!(player.asset_name, "pump-7");
    assert_eq!(player.csv_filename, "pump.csv");
    assert!(!player.header_row);
    assert_eq!(player.field_names, vec!["ts", "flow", "pressure"]);
    assert_eq!(player.reading_cols.get("flow").map(String::as_str), Some("flow_rate"));
    assert_eq!(player.ingest_mode, IngestMode::Batch);
    assert_eq!(player.sample_rate, 10);
    assert!(player.repeat_loop);
    assert_eq!(player.replay_column(), Some("ts"));
    assert_eq!(player.handoff_capacity(), 1);
}

#[test]
fn test_field_names_as_list() {
    let yaml = r#"
player:
  header_row: false
  field_names: [a, b, c]
"#;
    let config = ConfigLoader::from_yaml(yaml).unwrap();
    assert_eq!(config.player.field_names, vec!["a", "b", "c"]);
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let yaml = r#"
player:
  sample_rate: 0
  burst_interval: 0
storage:
  backend: filesystem
logging:
  format: xml
"#;
    let err = ConfigLoader::from_yaml(yaml).unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("sample_rate"));
    assert!(message.contains("burst_interval"));
    assert!(message.contains("filesystem config missing"));
    assert!(message.contains("logging.format"));
}

#[test]
fn test_config_with_env_vars() {
    std::env::set_var("PLAYBACK_TEST_BUCKET", "plant-a");
    std::env::remove_var("PLAYBACK_TEST_MISSING_URL");

    let yaml = r#"
storage:
  backend: reductstore
  reductstore:
    url: ${PLAYBACK_TEST_MISSING_URL:-http://default:8383}
    bucket_name: ${PLAYBACK_TEST_BUCKET}
"#;
    let config = ConfigLoader::from_yaml(yaml).unwrap();
    let reduct = config.storage.reductstore.unwrap();

    assert_eq!(reduct.url, "http://default:8383");
    assert_eq!(reduct.bucket_name, "plant-a");
    assert_eq!(reduct.timeout_seconds, 300);
    assert_eq!(reduct.max_retries, 3);

    std::env::remove_var("PLAYBACK_TEST_BUCKET");
}

#[test]
fn test_env_overrides_after_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
player:
  asset_name: from-file
  data_dir: /srv/recordings
"#,
    );

    std::env::set_var("PLAYBACK_ASSET_NAME", "from-env");
    let config = load_config_with_env(&path).unwrap();
    std::env::remove_var("PLAYBACK_ASSET_NAME");

    assert_eq!(config.player.asset_name, "from-env");
    assert_eq!(
        config.player.csv_path(),
        PathBuf::from("/srv/recordings/sinusoid.csv")
    );
}

#[test]
fn test_missing_file_is_an_error() {
    let err = load_config("does/not/exist.yaml").unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config file"));
}

#[test]
fn test_logging_and_storage_changes_do_not_restart() {
    let old: PlaybackConfig = ConfigLoader::from_yaml("{}").unwrap();
    let new = ConfigLoader::from_yaml(
        r#"
logging:
  level: debug
storage:
  backend: log
"#,
    )
    .unwrap();

    assert!(restart_keys(&old.player, &new.player).is_empty());
}

#[test]
fn test_data_identity_changes_restart() {
    let old: PlaybackConfig = ConfigLoader::from_yaml("{}").unwrap();
    let mut new = old.clone();
    new.player.csv_filename = "other.csv".to_string();
    new.player.ingest_mode = IngestMode::Batch;

    assert_eq!(
        restart_keys(&old.player, &new.player),
        vec!["csv_filename", "ingest_mode"]
    );
}

#[test]
fn test_handoff_capacity_is_one_second_of_units() {
    let mut player = ConfigLoader::from_yaml("{}").unwrap().player;

    // Default burst feed: one burst per second
    assert_eq!(player.handoff_capacity(), 1);

    player.burst_interval = 20;
    assert_eq!(player.handoff_capacity(), 50);

    // Slower than one burst per second still hands each burst over
    player.burst_interval = 5000;
    assert_eq!(player.handoff_capacity(), 1);

    player.ingest_mode = IngestMode::Batch;
    player.sample_rate = 250;
    assert_eq!(player.handoff_capacity(), 250);

    player.timestamp_from_file = true;
    assert_eq!(player.handoff_capacity(), 1);
}
