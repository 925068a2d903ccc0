use presskeep_core::{
    ArtifactRecord, LogEvent, SnapshotMetadata, SqliteSnapshotStore, Stage, StoreError,
};

fn setup_store() -> SqliteSnapshotStore {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshots.sqlite");
    // Preserve directory on disk for the duration of the test runs.
    #[allow(deprecated)]
    let _persist = dir.into_path();
    let store = SqliteSnapshotStore::builder()
        .path(&path)
        .create_if_missing(true)
        .build()
        .unwrap();
    store.initialize().unwrap();
    store
}

fn metadata(queried_url: &str, failed_stage: Option<Stage>) -> SnapshotMetadata {
    let mut logs = vec![LogEvent {
        message: "page loaded".into(),
        stage: Some(Stage::PageLoad),
        exception: false,
    }];
    if let Some(stage) = failed_stage {
        logs.push(LogEvent {
            message: "step failed".into(),
            stage: Some(stage),
            exception: true,
        });
    }
    SnapshotMetadata {
        name: "site".into(),
        queried_url: queried_url.into(),
        scraped_url: Some(format!("{queried_url}/front")),
        scrape_time: "2026-08-06_09-00-00".into(),
        logs,
        folder_path: "/data/site/2026-08-06_09-00-00".into(),
        source: ArtifactRecord::present("source.html"),
        screenshot: ArtifactRecord::missing(),
        mhtml_archive: ArtifactRecord::missing(),
    }
}

#[test]
fn insert_and_fetch_round_trip() {
    let store = setup_store();
    let record = metadata("https://www.vrt.be", None);

    let id = store.insert_snapshot(&record).unwrap();
    assert!(id > 0);

    let rows = store.fetch_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
    assert_eq!(rows[0].queried_url, "https://www.vrt.be");
    assert!(!rows[0].failed);

    let parsed: SnapshotMetadata = serde_json::from_str(&rows[0].metadata).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn failed_flag_column_follows_the_log() {
    let store = setup_store();
    store
        .insert_snapshot(&metadata("https://www.vrt.be", None))
        .unwrap();
    store
        .insert_snapshot(&metadata("https://www.vrt.be", Some(Stage::PageLoad)))
        .unwrap();

    let rows = store.fetch_all().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0].failed);
    assert!(rows[1].failed);
}

#[test]
fn artifact_path_columns_are_null_unless_saved() {
    let store = setup_store();
    let record = metadata("https://www.vrt.be", None);
    store.insert_snapshot(&record).unwrap();

    let conn = rusqlite::Connection::open(store.path()).unwrap();
    let (source, screenshot): (Option<String>, Option<String>) = conn
        .query_row(
            "SELECT path_to_source, path_to_screenshot FROM snapshots",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(
        source.as_deref(),
        Some("/data/site/2026-08-06_09-00-00/source.html")
    );
    assert!(screenshot.is_none());
}

#[test]
fn builder_requires_a_path() {
    let err = SqliteSnapshotStore::builder().build().unwrap_err();
    assert!(matches!(err, StoreError::MissingPath));
}
