// Sink integration tests

use csv_playback::config::{FilesystemConfig, IngestMode, PlayerSettings, StorageConfig};
use csv_playback::sink::{asset_to_entry_name, FilesystemSink};
use csv_playback::{IngestionSink, PlaybackSession, SinkFactory};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Handle;

#[tokio::test]
async fn test_filesystem_sink_receives_bursts() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(
        data.path().join("rec.csv"),
        "ts,value\n2024-01-01 00:00:00,1\n2024-01-01 00:00:01,2\n2024-01-01 00:00:02,3\n",
    )
    .unwrap();

    let sink = Arc::new(FilesystemSink::new(FilesystemConfig {
        base_path: out.path().to_string_lossy().into_owned(),
    }));
    sink.initialize().await.unwrap();

    let settings = PlayerSettings {
        asset_name: "line-4".to_string(),
        data_dir: data.path().to_path_buf(),
        csv_filename: "rec.csv".to_string(),
        ingest_mode: IngestMode::Burst,
        burst_size: 2,
        burst_interval: 10,
        ..PlayerSettings::default()
    };
    let session = PlaybackSession::start(&settings, sink, Handle::current()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), session.finished())
        .await
        .expect("playback did not finish");

    let mut documents: Vec<serde_json::Value> = fs::read_dir(out.path().join("line-4"))
        .unwrap()
        .map(|entry| serde_json::from_slice(&fs::read(entry.unwrap().path()).unwrap()).unwrap())
        .collect();
    documents.sort_by_key(|doc| doc["readings"]["data"].as_array().map(Vec::len).unwrap_or(0));

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["readings"]["data"].as_array().unwrap().len(), 1);
    assert_eq!(documents[1]["readings"]["data"][0]["value"], 1);
    assert_eq!(documents[1]["asset"], "line-4");
    assert!(documents[1]["timestamp"].as_str().unwrap().ends_with("+00:00"));
}

#[tokio::test]
async fn test_factory_builds_configured_sink() {
    let out = TempDir::new().unwrap();
    let config = StorageConfig {
        backend: "filesystem".to_string(),
        filesystem: Some(FilesystemConfig {
            base_path: out.path().to_string_lossy().into_owned(),
        }),
        reductstore: None,
    };

    let sink = SinkFactory::create(&config).unwrap();
    sink.initialize().await.unwrap();
    assert_eq!(sink.sink_type(), "filesystem");
    assert!(sink.health_check().await.unwrap());
}

#[test]
fn test_entry_names_are_sanitised() {
    assert_eq!(asset_to_entry_name("plant/line 4"), "plant_line_4");
    assert_eq!(asset_to_entry_name("pump-7_a"), "pump-7_a");
}
