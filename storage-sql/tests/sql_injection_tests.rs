//! SQL injection prevention tests for the SQL storage backend.
//!
//! These tests verify that parameterized queries prevent SQL injection
//! attacks. All malicious input should be safely stored as literal text
//! without executing malicious SQL commands.

use detect_core::{
    CheckpointEvent, CoordinatorState, DetectionCoverage, Evidence, EvidenceSourceType,
    Source, StorageBackend, WorkloadDetection, WorkloadType,
};
use storage_sql::TursoStorage;
use tempfile::TempDir;

async fn create_test_storage() -> anyhow::Result<(TursoStorage, TempDir)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("test.db");

    let db = libsql::Builder::new_local(&db_path).build().await?;

    let storage = TursoStorage::from_database(db)?;
    storage.initialize_schema().await?;
    Ok((storage, dir))
}

const PAYLOADS: &[&str] = &[
    "'; DROP TABLE evidence; --",
    "' UNION SELECT * FROM evidence; --",
    "' OR '1'='1",
    "admin'--",
    "1'; UPDATE evidence SET confidence=1.0; --",
];

#[tokio::test]
async fn test_sql_injection_in_framework_name() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    for payload in PAYLOADS {
        let workload_uid = detect_core::WorkloadUid::new(format!("wl-{payload}"));
        let evidence = Evidence::new(
            workload_uid.clone(),
            Source::Process,
            (*payload).to_string(),
            EvidenceSourceType::Active,
            WorkloadType::Training,
            0.9,
        );

        storage.insert_evidence(&evidence).await.unwrap();
        let rows = storage.list_evidence(&workload_uid).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0].framework, payload, "payload should round-trip as literal text");
        assert_eq!(&rows[0].workload_uid, &workload_uid);
    }
}

#[tokio::test]
async fn test_sql_injection_in_evidence_payload_json() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    let workload_uid = detect_core::WorkloadUid::new("wl-payload");
    let mut evidence = Evidence::new(
        workload_uid.clone(),
        Source::Log,
        "pytorch".to_string(),
        EvidenceSourceType::Passive,
        WorkloadType::Training,
        0.5,
    );
    evidence.payload = serde_json::json!({
        "matched_line": "'; DROP TABLE evidence; --",
        "regex": "' OR '1'='1"
    });

    storage.insert_evidence(&evidence).await.unwrap();
    let rows = storage.list_evidence(&workload_uid).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload, evidence.payload);
}

#[tokio::test]
async fn test_sql_injection_in_coverage_error_message() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    let workload_uid = detect_core::WorkloadUid::new("wl-coverage");
    let mut coverage = DetectionCoverage::new(workload_uid.clone(), Source::Image);
    coverage.last_error = Some("'; DROP TABLE detection_coverage; --".to_string());

    storage.upsert_coverage(&coverage).await.unwrap();
    let rows = storage.list_coverage(&workload_uid).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].last_error.as_deref(),
        Some("'; DROP TABLE detection_coverage; --")
    );
}

#[tokio::test]
async fn test_sql_injection_in_coordinator_state_ext() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    let workload_uid = detect_core::WorkloadUid::new("wl-coord");
    let mut state = CoordinatorState::new(workload_uid.clone());
    state.ext = serde_json::json!({
        "note": "'; DELETE FROM coordinator_state; --"
    });

    storage.upsert_coordinator_state(&state).await.unwrap();
    let retrieved = storage
        .get_coordinator_state(&workload_uid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(retrieved.ext, state.ext);
}

#[tokio::test]
async fn test_sql_injection_in_checkpoint_path() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    let workload_uid = detect_core::WorkloadUid::new("wl-ckpt");
    let event = CheckpointEvent::start_saving(
        workload_uid.clone(),
        3,
        "'; DROP TABLE checkpoint_event; --".to_string(),
    );

    storage.upsert_checkpoint_event(&event).await.unwrap();
    let events = storage.list_checkpoint_events(&workload_uid).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].checkpoint_path.as_deref(),
        Some("'; DROP TABLE checkpoint_event; --")
    );
}

#[tokio::test]
async fn test_table_integrity_after_injection_attempts() {
    let (storage, _dir) = create_test_storage().await.unwrap();

    for (i, payload) in PAYLOADS.iter().enumerate() {
        let workload_uid = detect_core::WorkloadUid::new(format!("wl-integrity-{i}"));
        let mut detection = WorkloadDetection::pending(workload_uid.clone());
        detection.frameworks = vec![(*payload).to_string()];

        storage.upsert_detection(&detection).await.unwrap();
    }

    for i in 0..PAYLOADS.len() {
        let workload_uid = detect_core::WorkloadUid::new(format!("wl-integrity-{i}"));
        let retrieved = storage.get_detection(&workload_uid).await.unwrap();
        assert!(retrieved.is_some(), "table should still exist and be queryable");
    }
}
