//! CRUD operations backing [`crate::TursoStorage`]'s [`StorageBackend`] impl.

use detect_core::storage::ProcessInfo;
use detect_core::{
    CheckpointEvent, CheckpointEventType, CheckpointStatus, CompiledPatternRecord,
    CoordinatorState, CoordinatorStateKind, CoverageStatus, DataSource, DetectionCoverage,
    DetectionStatus, Error, Evidence, EvidenceSourceType, FrameworkLayer, PodUid, Result, Source,
    TrainingPerformance, WorkloadDetection, WorkloadUid,
};
use libsql::params;
use tracing::{debug, info};

use crate::TursoStorage;

impl TursoStorage {
    pub(crate) async fn upsert_coverage_impl(&self, coverage: &DetectionCoverage) -> Result<()> {
        debug!(
            "Upserting coverage for {} / {}",
            coverage.workload_uid, coverage.source
        );
        let conn = self.get_connection().await?;

        let sql = r#"
            INSERT INTO detection_coverage (
                workload_uid, source, status, evidence_count, attempt_count,
                last_error, log_available_from, log_available_to, covered_from, covered_to
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid, source) DO UPDATE SET
                status = excluded.status,
                evidence_count = excluded.evidence_count,
                attempt_count = excluded.attempt_count,
                last_error = excluded.last_error,
                log_available_from = excluded.log_available_from,
                log_available_to = excluded.log_available_to,
                covered_from = excluded.covered_from,
                covered_to = excluded.covered_to
        "#;

        conn.execute(
            sql,
            params![
                coverage.workload_uid.as_str(),
                coverage.source.to_string(),
                coverage.status.to_string(),
                coverage.evidence_count,
                coverage.attempt_count,
                coverage.last_error.clone(),
                coverage.log_available_from.map(|t| t.timestamp()),
                coverage.log_available_to.map(|t| t.timestamp()),
                coverage.covered_from.map(|t| t.timestamp()),
                coverage.covered_to.map(|t| t.timestamp()),
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to upsert coverage: {e}")))?;

        Ok(())
    }

    pub(crate) async fn get_coverage_impl(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<Option<DetectionCoverage>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, source, status, evidence_count, attempt_count,
                   last_error, log_available_from, log_available_to, covered_from, covered_to
            FROM detection_coverage WHERE workload_uid = ? AND source = ?
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str(), source.to_string()])
            .await
            .map_err(|e| Error::transient(format!("failed to query coverage: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch coverage row: {e}")))?
        {
            Ok(Some(row_to_coverage(&row)?))
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn list_coverage_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Vec<DetectionCoverage>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, source, status, evidence_count, attempt_count,
                   last_error, log_available_from, log_available_to, covered_from, covered_to
            FROM detection_coverage WHERE workload_uid = ?
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query coverage: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch coverage row: {e}")))?
        {
            out.push(row_to_coverage(&row)?);
        }
        Ok(out)
    }

    pub(crate) async fn insert_evidence_impl(&self, evidence: &Evidence) -> Result<()> {
        debug!(
            "Inserting evidence for {} / {} / {}",
            evidence.workload_uid, evidence.source, evidence.framework
        );
        let conn = self.get_connection().await?;

        let payload_json =
            serde_json::to_string(&evidence.payload).map_err(Error::Serialization)?;

        let sql = r#"
            INSERT INTO evidence (
                workload_uid, source, framework, source_type, workload_type, confidence,
                framework_layer, wrapper_framework, base_framework, payload, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid, source, framework) DO UPDATE SET
                source_type = excluded.source_type,
                workload_type = excluded.workload_type,
                confidence = excluded.confidence,
                framework_layer = excluded.framework_layer,
                wrapper_framework = excluded.wrapper_framework,
                base_framework = excluded.base_framework,
                payload = excluded.payload,
                updated_at = excluded.updated_at
        "#;

        conn.execute(
            sql,
            params![
                evidence.workload_uid.as_str(),
                evidence.source.to_string(),
                evidence.framework.clone(),
                evidence.source_type.to_string(),
                evidence.workload_type.to_string(),
                evidence.confidence,
                evidence.framework_layer.to_string(),
                evidence.wrapper_framework.clone(),
                evidence.base_framework.clone(),
                payload_json,
                evidence.created_at.timestamp(),
                evidence.updated_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to insert evidence: {e}")))?;

        Ok(())
    }

    pub(crate) async fn list_evidence_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Vec<Evidence>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, source, framework, source_type, workload_type, confidence,
                   framework_layer, wrapper_framework, base_framework, payload, created_at, updated_at
            FROM evidence WHERE workload_uid = ?
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query evidence: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch evidence row: {e}")))?
        {
            out.push(row_to_evidence(&row)?);
        }
        Ok(out)
    }

    pub(crate) async fn upsert_detection_impl(&self, detection: &WorkloadDetection) -> Result<()> {
        info!("Upserting detection for {}", detection.workload_uid);
        let conn = self.get_connection().await?;

        let frameworks_json =
            serde_json::to_string(&detection.frameworks).map_err(Error::Serialization)?;

        let sql = r#"
            INSERT INTO workload_detection (
                workload_uid, framework, frameworks, workload_type, confidence, status,
                framework_layer, wrapper_framework, base_framework, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid) DO UPDATE SET
                framework = excluded.framework,
                frameworks = excluded.frameworks,
                workload_type = excluded.workload_type,
                confidence = excluded.confidence,
                status = excluded.status,
                framework_layer = excluded.framework_layer,
                wrapper_framework = excluded.wrapper_framework,
                base_framework = excluded.base_framework,
                updated_at = excluded.updated_at
        "#;

        conn.execute(
            sql,
            params![
                detection.workload_uid.as_str(),
                detection.framework.clone(),
                frameworks_json,
                detection.workload_type.to_string(),
                detection.confidence,
                detection.status.to_string(),
                detection.framework_layer.to_string(),
                detection.wrapper_framework.clone(),
                detection.base_framework.clone(),
                detection.created_at.timestamp(),
                detection.updated_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to upsert detection: {e}")))?;

        Ok(())
    }

    pub(crate) async fn get_detection_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<WorkloadDetection>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, framework, frameworks, workload_type, confidence, status,
                   framework_layer, wrapper_framework, base_framework, created_at, updated_at
            FROM workload_detection WHERE workload_uid = ?
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query detection: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch detection row: {e}")))?
        {
            Ok(Some(row_to_detection(&row)?))
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn upsert_coordinator_state_impl(&self, state: &CoordinatorState) -> Result<()> {
        debug!("Upserting coordinator state for {}", state.workload_uid);
        let conn = self.get_connection().await?;

        let ext_json = serde_json::to_string(&state.ext).map_err(Error::Serialization)?;

        let sql = r#"
            INSERT INTO coordinator_state (
                workload_uid, coordinator_state, next_schedule_at, attempt_count,
                initialized_at, probing_started_at, probing_completed_at, ext
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid) DO UPDATE SET
                coordinator_state = excluded.coordinator_state,
                next_schedule_at = excluded.next_schedule_at,
                attempt_count = excluded.attempt_count,
                probing_started_at = excluded.probing_started_at,
                probing_completed_at = excluded.probing_completed_at,
                ext = excluded.ext
        "#;

        conn.execute(
            sql,
            params![
                state.workload_uid.as_str(),
                state.coordinator_state.to_string(),
                state.next_schedule_at.timestamp(),
                state.attempt_count,
                state.initialized_at.timestamp(),
                state.probing_started_at.map(|t| t.timestamp()),
                state.probing_completed_at.map(|t| t.timestamp()),
                ext_json,
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to upsert coordinator state: {e}")))?;

        Ok(())
    }

    pub(crate) async fn get_coordinator_state_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<CoordinatorState>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, coordinator_state, next_schedule_at, attempt_count,
                   initialized_at, probing_started_at, probing_completed_at, ext
            FROM coordinator_state WHERE workload_uid = ?
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query coordinator state: {e}")))?;

        if let Some(row) = rows.next().await.map_err(|e| {
            Error::transient(format!("failed to fetch coordinator state row: {e}"))
        })? {
            Ok(Some(row_to_coordinator_state(&row)?))
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn list_due_coordinator_states_impl(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CoordinatorState>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, coordinator_state, next_schedule_at, attempt_count,
                   initialized_at, probing_started_at, probing_completed_at, ext
            FROM coordinator_state
            WHERE next_schedule_at <= ? AND coordinator_state != 'COMPLETED'
            ORDER BY next_schedule_at ASC
        "#;

        let mut rows = conn
            .query(sql, params![now.timestamp()])
            .await
            .map_err(|e| Error::transient(format!("failed to query due coordinator states: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| {
            Error::transient(format!("failed to fetch coordinator state row: {e}"))
        })? {
            out.push(row_to_coordinator_state(&row)?);
        }
        Ok(out)
    }

    pub(crate) async fn list_patterns_impl(&self) -> Result<Vec<CompiledPatternRecord>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT id, kind, subtype, regex, priority, confidence, framework_hint, enabled, updated_at
            FROM compiled_pattern
            WHERE enabled = 1
            ORDER BY kind ASC, priority DESC
        "#;

        let mut rows = conn
            .query(sql, ())
            .await
            .map_err(|e| Error::transient(format!("failed to query patterns: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch pattern row: {e}")))?
        {
            out.push(row_to_pattern(&row)?);
        }
        Ok(out)
    }

    pub(crate) async fn upsert_training_performance_impl(
        &self,
        row: &TrainingPerformance,
    ) -> Result<()> {
        debug!(
            "Upserting training performance for {} step {}",
            row.workload_uid, row.iteration
        );
        let conn = self.get_connection().await?;

        let performance_json =
            serde_json::to_string(&row.performance).map_err(Error::Serialization)?;

        let sql = r#"
            INSERT INTO training_performance (
                workload_uid, pod_uid, serial, iteration, data_source, performance,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid, serial, iteration) DO UPDATE SET
                pod_uid = excluded.pod_uid,
                data_source = excluded.data_source,
                performance = excluded.performance,
                updated_at = excluded.updated_at
        "#;

        conn.execute(
            sql,
            params![
                row.workload_uid.as_str(),
                row.pod_uid.as_ref().map(PodUid::as_str),
                row.serial,
                row.iteration,
                row.data_source.to_string(),
                performance_json,
                row.created_at.timestamp(),
                row.updated_at.timestamp(),
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to upsert training performance: {e}")))?;

        Ok(())
    }

    pub(crate) async fn latest_training_performance_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<TrainingPerformance>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT id, workload_uid, pod_uid, serial, iteration, data_source, performance,
                   created_at, updated_at
            FROM training_performance
            WHERE workload_uid = ?
            ORDER BY updated_at DESC
            LIMIT 1
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query training performance: {e}")))?;

        if let Some(row) = rows.next().await.map_err(|e| {
            Error::transient(format!("failed to fetch training performance row: {e}"))
        })? {
            Ok(Some(row_to_training_performance(&row)?))
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn upsert_checkpoint_event_impl(&self, event: &CheckpointEvent) -> Result<()> {
        debug!(
            "Upserting checkpoint event for {} iteration {}",
            event.workload_uid, event.iteration
        );
        let conn = self.get_connection().await?;

        let metadata_json = serde_json::to_string(&event.metadata).map_err(Error::Serialization)?;

        let sql = r#"
            INSERT INTO checkpoint_event (
                workload_uid, iteration, event_type, checkpoint_path, start_time, end_time,
                duration_ms, is_fast_ckpt, status, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (workload_uid, iteration, event_type) DO UPDATE SET
                checkpoint_path = excluded.checkpoint_path,
                end_time = excluded.end_time,
                duration_ms = excluded.duration_ms,
                is_fast_ckpt = excluded.is_fast_ckpt,
                status = excluded.status,
                metadata = excluded.metadata
        "#;

        conn.execute(
            sql,
            params![
                event.workload_uid.as_str(),
                event.iteration,
                event.event_type.to_string(),
                event.checkpoint_path.clone(),
                event.start_time.timestamp(),
                event.end_time.map(|t| t.timestamp()),
                event.duration_ms.map(|d| d as i64),
                event.is_fast_ckpt,
                event.status.to_string(),
                metadata_json,
            ],
        )
        .await
        .map_err(|e| Error::transient(format!("failed to upsert checkpoint event: {e}")))?;

        Ok(())
    }

    pub(crate) async fn list_checkpoint_events_impl(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Vec<CheckpointEvent>> {
        let conn = self.get_connection().await?;
        let sql = r#"
            SELECT workload_uid, iteration, event_type, checkpoint_path, start_time, end_time,
                   duration_ms, is_fast_ckpt, status, metadata
            FROM checkpoint_event
            WHERE workload_uid = ?
            ORDER BY start_time DESC
        "#;

        let mut rows = conn
            .query(sql, params![workload_uid.as_str()])
            .await
            .map_err(|e| Error::transient(format!("failed to query checkpoint events: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch checkpoint event row: {e}")))?
        {
            out.push(row_to_checkpoint_event(&row)?);
        }
        Ok(out)
    }
}

fn get_str(row: &libsql::Row, idx: i32, field: &str) -> Result<String> {
    row.get(idx)
        .map_err(|e| Error::transient(format!("failed to get {field}: {e}")))
}

fn get_opt_str(row: &libsql::Row, idx: i32, field: &str) -> Result<Option<String>> {
    row.get(idx)
        .map_err(|e| Error::transient(format!("failed to get {field}: {e}")))
}

fn get_i64(row: &libsql::Row, idx: i32, field: &str) -> Result<i64> {
    row.get(idx)
        .map_err(|e| Error::transient(format!("failed to get {field}: {e}")))
}

fn get_opt_i64(row: &libsql::Row, idx: i32, field: &str) -> Result<Option<i64>> {
    row.get(idx)
        .map_err(|e| Error::transient(format!("failed to get {field}: {e}")))
}

fn get_f64(row: &libsql::Row, idx: i32, field: &str) -> Result<f64> {
    row.get(idx)
        .map_err(|e| Error::transient(format!("failed to get {field}: {e}")))
}

fn timestamp(secs: i64, field: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::data_inconsistency(format!("invalid timestamp in {field}")))
}

fn opt_timestamp(secs: Option<i64>, field: &str) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    secs.map(|s| timestamp(s, field)).transpose()
}

fn parse_source(s: &str) -> Result<Source> {
    s.parse()
        .map_err(|_| Error::data_inconsistency(format!("unknown source: {s}")))
}

fn parse_coverage_status(s: &str) -> Result<CoverageStatus> {
    match s {
        "pending" => Ok(CoverageStatus::Pending),
        "collecting" => Ok(CoverageStatus::Collecting),
        "collected" => Ok(CoverageStatus::Collected),
        "failed" => Ok(CoverageStatus::Failed),
        other => Err(Error::data_inconsistency(format!("unknown coverage status: {other}"))),
    }
}

fn parse_source_type(s: &str) -> Result<EvidenceSourceType> {
    match s {
        "active" => Ok(EvidenceSourceType::Active),
        "passive" => Ok(EvidenceSourceType::Passive),
        other => Err(Error::data_inconsistency(format!("unknown evidence source type: {other}"))),
    }
}

fn parse_workload_type(s: &str) -> Result<detect_core::WorkloadType> {
    match s {
        "training" => Ok(detect_core::WorkloadType::Training),
        "inference" => Ok(detect_core::WorkloadType::Inference),
        "unknown" => Ok(detect_core::WorkloadType::Unknown),
        other => Err(Error::data_inconsistency(format!("unknown workload type: {other}"))),
    }
}

fn parse_framework_layer(s: &str) -> Result<FrameworkLayer> {
    match s {
        "wrapper" => Ok(FrameworkLayer::Wrapper),
        "base" => Ok(FrameworkLayer::Base),
        "runtime" => Ok(FrameworkLayer::Runtime),
        other => Err(Error::data_inconsistency(format!("unknown framework layer: {other}"))),
    }
}

fn parse_detection_status(s: &str) -> Result<DetectionStatus> {
    match s {
        "pending" => Ok(DetectionStatus::Pending),
        "confirmed" => Ok(DetectionStatus::Confirmed),
        "failed" => Ok(DetectionStatus::Failed),
        other => Err(Error::data_inconsistency(format!("unknown detection status: {other}"))),
    }
}

fn parse_coordinator_state_kind(s: &str) -> Result<CoordinatorStateKind> {
    match s {
        "INIT" => Ok(CoordinatorStateKind::Init),
        "WAITING" => Ok(CoordinatorStateKind::Waiting),
        "PROBING" => Ok(CoordinatorStateKind::Probing),
        "ANALYZING" => Ok(CoordinatorStateKind::Analyzing),
        "CONFIRMED" => Ok(CoordinatorStateKind::Confirmed),
        "COMPLETED" => Ok(CoordinatorStateKind::Completed),
        other => Err(Error::data_inconsistency(format!("unknown coordinator state: {other}"))),
    }
}

fn parse_pattern_kind(s: &str) -> Result<detect_core::types::PatternKind> {
    use detect_core::types::PatternKind;
    match s {
        "performance" => Ok(PatternKind::Performance),
        "blacklist" => Ok(PatternKind::Blacklist),
        "training_event" => Ok(PatternKind::TrainingEvent),
        "checkpoint_event" => Ok(PatternKind::CheckpointEvent),
        "identify" => Ok(PatternKind::Identify),
        other => Err(Error::data_inconsistency(format!("unknown pattern kind: {other}"))),
    }
}

fn parse_checkpoint_event_type(s: &str) -> Result<CheckpointEventType> {
    match s {
        "start_saving" => Ok(CheckpointEventType::StartSaving),
        "end_saving" => Ok(CheckpointEventType::EndSaving),
        "loading" => Ok(CheckpointEventType::Loading),
        other => Err(Error::data_inconsistency(format!("unknown checkpoint event type: {other}"))),
    }
}

fn parse_checkpoint_status(s: &str) -> Result<CheckpointStatus> {
    match s {
        "in_progress" => Ok(CheckpointStatus::InProgress),
        "success" => Ok(CheckpointStatus::Success),
        "failed" => Ok(CheckpointStatus::Failed),
        other => Err(Error::data_inconsistency(format!("unknown checkpoint status: {other}"))),
    }
}

fn row_to_coverage(row: &libsql::Row) -> Result<DetectionCoverage> {
    Ok(DetectionCoverage {
        workload_uid: WorkloadUid::new(get_str(row, 0, "workload_uid")?),
        source: parse_source(&get_str(row, 1, "source")?)?,
        status: parse_coverage_status(&get_str(row, 2, "status")?)?,
        evidence_count: get_i64(row, 3, "evidence_count")? as u32,
        attempt_count: get_i64(row, 4, "attempt_count")? as u32,
        last_error: get_opt_str(row, 5, "last_error")?,
        log_available_from: opt_timestamp(get_opt_i64(row, 6, "log_available_from")?, "log_available_from")?,
        log_available_to: opt_timestamp(get_opt_i64(row, 7, "log_available_to")?, "log_available_to")?,
        covered_from: opt_timestamp(get_opt_i64(row, 8, "covered_from")?, "covered_from")?,
        covered_to: opt_timestamp(get_opt_i64(row, 9, "covered_to")?, "covered_to")?,
    })
}

fn row_to_evidence(row: &libsql::Row) -> Result<Evidence> {
    let payload_json = get_str(row, 9, "payload")?;
    Ok(Evidence {
        workload_uid: WorkloadUid::new(get_str(row, 0, "workload_uid")?),
        source: parse_source(&get_str(row, 1, "source")?)?,
        framework: get_str(row, 2, "framework")?,
        source_type: parse_source_type(&get_str(row, 3, "source_type")?)?,
        workload_type: parse_workload_type(&get_str(row, 4, "workload_type")?)?,
        confidence: get_f64(row, 5, "confidence")?,
        framework_layer: parse_framework_layer(&get_str(row, 6, "framework_layer")?)?,
        wrapper_framework: get_opt_str(row, 7, "wrapper_framework")?,
        base_framework: get_opt_str(row, 8, "base_framework")?,
        payload: serde_json::from_str(&payload_json).map_err(Error::Serialization)?,
        created_at: timestamp(get_i64(row, 10, "created_at")?, "created_at")?,
        updated_at: timestamp(get_i64(row, 11, "updated_at")?, "updated_at")?,
    })
}

fn row_to_detection(row: &libsql::Row) -> Result<WorkloadDetection> {
    let frameworks_json = get_str(row, 2, "frameworks")?;
    Ok(WorkloadDetection {
        workload_uid: WorkloadUid::new(get_str(row, 0, "workload_uid")?),
        framework: get_opt_str(row, 1, "framework")?,
        frameworks: serde_json::from_str(&frameworks_json).map_err(Error::Serialization)?,
        workload_type: parse_workload_type(&get_str(row, 3, "workload_type")?)?,
        confidence: get_f64(row, 4, "confidence")?,
        status: parse_detection_status(&get_str(row, 5, "status")?)?,
        framework_layer: parse_framework_layer(&get_str(row, 6, "framework_layer")?)?,
        wrapper_framework: get_opt_str(row, 7, "wrapper_framework")?,
        base_framework: get_opt_str(row, 8, "base_framework")?,
        created_at: timestamp(get_i64(row, 9, "created_at")?, "created_at")?,
        updated_at: timestamp(get_i64(row, 10, "updated_at")?, "updated_at")?,
    })
}

fn row_to_coordinator_state(row: &libsql::Row) -> Result<CoordinatorState> {
    let ext_json = get_str(row, 7, "ext")?;
    Ok(CoordinatorState {
        workload_uid: WorkloadUid::new(get_str(row, 0, "workload_uid")?),
        coordinator_state: parse_coordinator_state_kind(&get_str(row, 1, "coordinator_state")?)?,
        next_schedule_at: timestamp(get_i64(row, 2, "next_schedule_at")?, "next_schedule_at")?,
        attempt_count: get_i64(row, 3, "attempt_count")? as u32,
        initialized_at: timestamp(get_i64(row, 4, "initialized_at")?, "initialized_at")?,
        probing_started_at: opt_timestamp(get_opt_i64(row, 5, "probing_started_at")?, "probing_started_at")?,
        probing_completed_at: opt_timestamp(get_opt_i64(row, 6, "probing_completed_at")?, "probing_completed_at")?,
        ext: serde_json::from_str(&ext_json).map_err(Error::Serialization)?,
    })
}

fn row_to_pattern(row: &libsql::Row) -> Result<CompiledPatternRecord> {
    Ok(CompiledPatternRecord {
        id: get_i64(row, 0, "id")?,
        kind: parse_pattern_kind(&get_str(row, 1, "kind")?)?,
        subtype: get_opt_str(row, 2, "subtype")?,
        regex: get_str(row, 3, "regex")?,
        priority: get_i64(row, 4, "priority")? as i32,
        confidence: get_f64(row, 5, "confidence")?,
        framework_hint: get_opt_str(row, 6, "framework_hint")?,
        enabled: row
            .get::<bool>(7)
            .map_err(|e| Error::transient(format!("failed to get enabled: {e}")))?,
        updated_at: timestamp(get_i64(row, 8, "updated_at")?, "updated_at")?,
    })
}

fn row_to_training_performance(row: &libsql::Row) -> Result<TrainingPerformance> {
    let performance_json = get_str(row, 6, "performance")?;
    Ok(TrainingPerformance {
        id: Some(get_i64(row, 0, "id")?),
        workload_uid: WorkloadUid::new(get_str(row, 1, "workload_uid")?),
        pod_uid: get_opt_str(row, 2, "pod_uid")?.map(PodUid::new),
        serial: get_i64(row, 3, "serial")? as u32,
        iteration: get_i64(row, 4, "iteration")? as u64,
        data_source: get_str(row, 5, "data_source")?
            .parse::<DataSource>()
            .expect("DataSource::from_str is infallible"),
        performance: serde_json::from_str(&performance_json).map_err(Error::Serialization)?,
        created_at: timestamp(get_i64(row, 7, "created_at")?, "created_at")?,
        updated_at: timestamp(get_i64(row, 8, "updated_at")?, "updated_at")?,
    })
}

fn row_to_checkpoint_event(row: &libsql::Row) -> Result<CheckpointEvent> {
    let metadata_json = get_str(row, 9, "metadata")?;
    Ok(CheckpointEvent {
        workload_uid: WorkloadUid::new(get_str(row, 0, "workload_uid")?),
        iteration: get_i64(row, 1, "iteration")? as u64,
        event_type: parse_checkpoint_event_type(&get_str(row, 2, "event_type")?)?,
        checkpoint_path: get_opt_str(row, 3, "checkpoint_path")?,
        start_time: timestamp(get_i64(row, 4, "start_time")?, "start_time")?,
        end_time: opt_timestamp(get_opt_i64(row, 5, "end_time")?, "end_time")?,
        duration_ms: get_opt_i64(row, 6, "duration_ms")?.map(|d| d as u64),
        is_fast_ckpt: row
            .get::<bool>(7)
            .map_err(|e| Error::transient(format!("failed to get is_fast_ckpt: {e}")))?,
        status: parse_checkpoint_status(&get_str(row, 8, "status")?)?,
        metadata: serde_json::from_str(&metadata_json).map_err(Error::Serialization)?,
    })
}

/// Unused placeholder kept for symmetry with [`ProcessInfo`]'s import; the
/// node-agent collaborator has no SQL-backed storage counterpart.
#[allow(dead_code)]
fn _unused(_: ProcessInfo) {}
