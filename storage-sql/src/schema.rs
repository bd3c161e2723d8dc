//! SQL DDL for the detection pipeline's durable tables.

pub const CREATE_DETECTION_COVERAGE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS detection_coverage (
        workload_uid TEXT NOT NULL,
        source TEXT NOT NULL,
        status TEXT NOT NULL,
        evidence_count INTEGER NOT NULL DEFAULT 0,
        attempt_count INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        log_available_from INTEGER,
        log_available_to INTEGER,
        covered_from INTEGER,
        covered_to INTEGER,
        PRIMARY KEY (workload_uid, source)
    )
"#;

pub const CREATE_DETECTION_COVERAGE_STATUS_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_detection_coverage_status
    ON detection_coverage (status)
"#;

pub const CREATE_EVIDENCE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS evidence (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workload_uid TEXT NOT NULL,
        source TEXT NOT NULL,
        framework TEXT NOT NULL,
        source_type TEXT NOT NULL,
        workload_type TEXT NOT NULL,
        confidence REAL NOT NULL,
        framework_layer TEXT NOT NULL,
        wrapper_framework TEXT,
        base_framework TEXT,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (workload_uid, source, framework)
    )
"#;

pub const CREATE_EVIDENCE_WORKLOAD_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_evidence_workload
    ON evidence (workload_uid)
"#;

pub const CREATE_WORKLOAD_DETECTION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS workload_detection (
        workload_uid TEXT PRIMARY KEY,
        framework TEXT,
        frameworks TEXT NOT NULL,
        workload_type TEXT NOT NULL,
        confidence REAL NOT NULL,
        status TEXT NOT NULL,
        framework_layer TEXT NOT NULL,
        wrapper_framework TEXT,
        base_framework TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

pub const CREATE_COORDINATOR_STATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS coordinator_state (
        workload_uid TEXT PRIMARY KEY,
        coordinator_state TEXT NOT NULL,
        next_schedule_at INTEGER NOT NULL,
        attempt_count INTEGER NOT NULL DEFAULT 0,
        initialized_at INTEGER NOT NULL,
        probing_started_at INTEGER,
        probing_completed_at INTEGER,
        ext TEXT NOT NULL
    )
"#;

pub const CREATE_COORDINATOR_STATE_SCHEDULE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_coordinator_state_schedule
    ON coordinator_state (next_schedule_at)
"#;

pub const CREATE_COMPILED_PATTERN_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS compiled_pattern (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        subtype TEXT,
        regex TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        confidence REAL NOT NULL,
        framework_hint TEXT,
        enabled INTEGER NOT NULL DEFAULT 1,
        updated_at INTEGER NOT NULL
    )
"#;

pub const CREATE_COMPILED_PATTERN_KIND_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_compiled_pattern_kind_priority
    ON compiled_pattern (kind, priority DESC)
"#;

pub const CREATE_TRAINING_PERFORMANCE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS training_performance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        workload_uid TEXT NOT NULL,
        pod_uid TEXT,
        serial INTEGER NOT NULL,
        iteration INTEGER NOT NULL,
        data_source TEXT NOT NULL,
        performance TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE (workload_uid, serial, iteration)
    )
"#;

pub const CREATE_TRAINING_PERFORMANCE_LATEST_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_training_performance_latest
    ON training_performance (workload_uid, updated_at DESC)
"#;

pub const CREATE_CHECKPOINT_EVENT_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS checkpoint_event (
        workload_uid TEXT NOT NULL,
        iteration INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        checkpoint_path TEXT,
        start_time INTEGER NOT NULL,
        end_time INTEGER,
        duration_ms INTEGER,
        is_fast_ckpt INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        metadata TEXT NOT NULL,
        PRIMARY KEY (workload_uid, iteration, event_type)
    )
"#;

pub const CREATE_CHECKPOINT_EVENT_WORKLOAD_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_checkpoint_event_workload
    ON checkpoint_event (workload_uid, start_time DESC)
"#;
