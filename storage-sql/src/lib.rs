#![allow(clippy::expect_used)]

//! # Storage SQL
//!
//! Turso/libSQL storage backend for durable persistence of detection
//! coverage, evidence, aggregated detections, coordinator state, compiled
//! patterns, training performance, and checkpoint events.
//!
//! This crate provides:
//! - Connection management for Turso databases
//! - SQL schema creation and migration
//! - CRUD operations backing [`detect_core::StorageBackend`]
//! - Retry logic and circuit breaker pattern for resilience
//!
//! ## Example
//!
//! ```no_run
//! use storage_sql::TursoStorage;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = TursoStorage::new("libsql://localhost:8080", "token").await?;
//! storage.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use detect_core::{
    CheckpointEvent, CompiledPatternRecord, CoordinatorState, DetectionCoverage, Error, Evidence,
    PodUid, Result, Source, StorageBackend, TrainingPerformance, WorkloadDetection, WorkloadUid,
};
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod pool;
mod resilient;
mod schema;
pub mod storage;

pub use pool::{ConnectionPool, PoolConfig, PoolStatistics};
pub use resilient::ResilientStorage;

/// Turso storage backend for durable persistence
pub struct TursoStorage {
    db: Arc<Database>,
    pool: Option<Arc<ConnectionPool>>,
    config: TursoConfig,
}

/// Configuration for Turso storage
#[derive(Debug, Clone)]
pub struct TursoConfig {
    /// Maximum retry attempts for failed operations
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub retry_base_delay_ms: u64,
    /// Maximum delay for exponential backoff (milliseconds)
    pub retry_max_delay_ms: u64,
    /// Enable connection pooling
    pub enable_pooling: bool,
}

impl Default for TursoConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5000,
            enable_pooling: true,
        }
    }
}

impl TursoStorage {
    /// Create a new Turso storage instance
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (only `libsql://`, `file:`, or `:memory:` protocols allowed)
    /// * `token` - Authentication token (required for `libsql://`, empty for local files)
    pub async fn new(url: &str, token: &str) -> Result<Self> {
        Self::with_config(url, token, TursoConfig::default()).await
    }

    /// Create a Turso storage instance from an existing Database
    ///
    /// This is useful for testing with local file-based databases.
    pub fn from_database(db: libsql::Database) -> Result<Self> {
        Ok(Self {
            db: Arc::new(db),
            pool: None,
            config: TursoConfig::default(),
        })
    }

    /// Create a new Turso storage instance with custom configuration.
    ///
    /// Only `libsql://`, `file:`, and `:memory:` protocols are accepted;
    /// remote connections require a non-empty authentication token.
    pub async fn with_config(url: &str, token: &str, config: TursoConfig) -> Result<Self> {
        info!("Connecting to Turso database at {}", url);

        if !url.starts_with("libsql://")
            && !url.starts_with("file:")
            && !url.starts_with(":memory:")
        {
            return Err(Error::validation(format!(
                "unsupported database URL: {url}. Only libsql://, file:, or :memory: protocols are allowed"
            )));
        }

        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::validation(
                "authentication token required for remote Turso connections",
            ));
        }

        let db = Self::connect(url, token).await?;
        let db = Arc::new(db);

        let pool = if config.enable_pooling {
            let pool_config = PoolConfig::default();
            let max_conn = pool_config.max_connections;
            let pool = ConnectionPool::new(Arc::clone(&db), pool_config).await?;
            info!("Connection pool enabled with {} max connections", max_conn);
            Some(Arc::new(pool))
        } else {
            info!("Connection pooling disabled");
            None
        };

        info!("Successfully connected to Turso database");

        Ok(Self { db, pool, config })
    }

    /// Create a new Turso storage instance with custom pool configuration
    pub async fn new_with_pool_config(
        url: &str,
        token: &str,
        config: TursoConfig,
        pool_config: PoolConfig,
    ) -> Result<Self> {
        info!("Connecting to Turso database at {}", url);

        if !url.starts_with("libsql://")
            && !url.starts_with("file:")
            && !url.starts_with(":memory:")
        {
            return Err(Error::validation(format!(
                "unsupported database URL: {url}. Only libsql://, file:, or :memory: protocols are allowed"
            )));
        }

        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::validation(
                "authentication token required for remote Turso connections",
            ));
        }

        let db = Self::connect(url, token).await?;
        let db = Arc::new(db);

        let pool = ConnectionPool::new(Arc::clone(&db), pool_config.clone()).await?;
        info!(
            "Connection pool enabled with {} max connections",
            pool_config.max_connections
        );

        info!("Successfully connected to Turso database");

        Ok(Self {
            db,
            pool: Some(Arc::new(pool)),
            config,
        })
    }

    async fn connect(url: &str, token: &str) -> Result<Database> {
        if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::transient(format!("failed to connect to Turso: {e}")))
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| Error::transient(format!("failed to connect to Turso: {e}")))
        }
    }

    /// Initialize the database schema
    ///
    /// Creates tables and indexes if they don't exist. Safe to call multiple times.
    pub async fn initialize_schema(&self) -> Result<()> {
        info!("Initializing Turso database schema");
        let conn = self.get_connection().await?;

        self.execute_with_retry(&conn, schema::CREATE_DETECTION_COVERAGE_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_DETECTION_COVERAGE_STATUS_INDEX)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_EVIDENCE_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_EVIDENCE_WORKLOAD_INDEX)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_WORKLOAD_DETECTION_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_COORDINATOR_STATE_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_COORDINATOR_STATE_SCHEDULE_INDEX)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_COMPILED_PATTERN_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_COMPILED_PATTERN_KIND_INDEX)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_TRAINING_PERFORMANCE_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_TRAINING_PERFORMANCE_LATEST_INDEX)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_CHECKPOINT_EVENT_TABLE)
            .await?;
        self.execute_with_retry(&conn, schema::CREATE_CHECKPOINT_EVENT_WORKLOAD_INDEX)
            .await?;

        info!("Schema initialization complete");
        Ok(())
    }

    /// Get a database connection
    ///
    /// If connection pooling is enabled, this will use a pooled connection.
    /// Otherwise, it creates a new connection each time.
    pub(crate) async fn get_connection(&self) -> Result<Connection> {
        if let Some(ref pool) = self.pool {
            let pooled_conn = pool.get().await?;
            pooled_conn.into_inner()
        } else {
            self.db
                .connect()
                .map_err(|e| Error::transient(format!("failed to get connection: {e}")))
        }
    }

    /// Get pool statistics if pooling is enabled
    pub async fn pool_statistics(&self) -> Option<PoolStatistics> {
        if let Some(ref pool) = self.pool {
            Some(pool.statistics().await)
        } else {
            None
        }
    }

    /// Get pool utilization if pooling is enabled
    pub async fn pool_utilization(&self) -> Option<f32> {
        if let Some(ref pool) = self.pool {
            Some(pool.utilization().await)
        } else {
            None
        }
    }

    /// Execute a SQL statement with retry logic
    async fn execute_with_retry(&self, conn: &Connection, sql: &str) -> Result<()> {
        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);

        loop {
            match conn.execute(sql, ()).await {
                Ok(_) => {
                    if attempts > 0 {
                        debug!("SQL succeeded after {} retries", attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        error!("SQL failed after {} attempts: {}", attempts, e);
                        return Err(Error::transient(format!(
                            "SQL execution failed after {attempts} retries: {e}"
                        )));
                    }

                    warn!("SQL attempt {} failed: {}, retrying...", attempts, e);
                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        delay * 2,
                        Duration::from_millis(self.config.retry_max_delay_ms),
                    );
                }
            }
        }
    }

    /// Health check - verify database connectivity
    pub async fn health_check(&self) -> Result<bool> {
        let conn = self.get_connection().await?;
        match conn.query("SELECT 1", ()).await {
            Ok(_) => Ok(true),
            Err(e) => {
                error!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Get database statistics
    pub async fn get_statistics(&self) -> Result<StorageStatistics> {
        let conn = self.get_connection().await?;

        Ok(StorageStatistics {
            coverage_count: self.get_count(&conn, "detection_coverage").await?,
            evidence_count: self.get_count(&conn, "evidence").await?,
            detection_count: self.get_count(&conn, "workload_detection").await?,
            coordinator_state_count: self.get_count(&conn, "coordinator_state").await?,
            pattern_count: self.get_count(&conn, "compiled_pattern").await?,
            training_performance_count: self.get_count(&conn, "training_performance").await?,
            checkpoint_event_count: self.get_count(&conn, "checkpoint_event").await?,
        })
    }

    /// Get count of records in a table
    async fn get_count(&self, conn: &Connection, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) as count FROM {table}");
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| Error::transient(format!("failed to count {table}: {e}")))?;

        if let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::transient(format!("failed to fetch count for {table}: {e}")))?
        {
            let count: i64 = row
                .get(0)
                .map_err(|e| Error::transient(format!("failed to parse count: {e}")))?;
            Ok(count as usize)
        } else {
            Ok(0)
        }
    }
}

/// Storage statistics across all detection-domain tables
#[derive(Debug, Clone)]
pub struct StorageStatistics {
    pub coverage_count: usize,
    pub evidence_count: usize,
    pub detection_count: usize,
    pub coordinator_state_count: usize,
    pub pattern_count: usize,
    pub training_performance_count: usize,
    pub checkpoint_event_count: usize,
}

#[async_trait]
impl StorageBackend for TursoStorage {
    async fn upsert_coverage(&self, coverage: &DetectionCoverage) -> Result<()> {
        self.upsert_coverage_impl(coverage).await
    }

    async fn get_coverage(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<Option<DetectionCoverage>> {
        self.get_coverage_impl(workload_uid, source).await
    }

    async fn list_coverage(&self, workload_uid: &WorkloadUid) -> Result<Vec<DetectionCoverage>> {
        self.list_coverage_impl(workload_uid).await
    }

    async fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
        self.insert_evidence_impl(evidence).await
    }

    async fn list_evidence(&self, workload_uid: &WorkloadUid) -> Result<Vec<Evidence>> {
        self.list_evidence_impl(workload_uid).await
    }

    async fn upsert_detection(&self, detection: &WorkloadDetection) -> Result<()> {
        self.upsert_detection_impl(detection).await
    }

    async fn get_detection(&self, workload_uid: &WorkloadUid) -> Result<Option<WorkloadDetection>> {
        self.get_detection_impl(workload_uid).await
    }

    async fn upsert_coordinator_state(&self, state: &CoordinatorState) -> Result<()> {
        self.upsert_coordinator_state_impl(state).await
    }

    async fn get_coordinator_state(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<CoordinatorState>> {
        self.get_coordinator_state_impl(workload_uid).await
    }

    async fn list_due_coordinator_states(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CoordinatorState>> {
        self.list_due_coordinator_states_impl(now).await
    }

    async fn list_patterns(&self) -> Result<Vec<CompiledPatternRecord>> {
        self.list_patterns_impl().await
    }

    async fn upsert_training_performance(&self, row: &TrainingPerformance) -> Result<()> {
        self.upsert_training_performance_impl(row).await
    }

    async fn latest_training_performance(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<TrainingPerformance>> {
        self.latest_training_performance_impl(workload_uid).await
    }

    async fn upsert_checkpoint_event(&self, event: &CheckpointEvent) -> Result<()> {
        self.upsert_checkpoint_event_impl(event).await
    }

    async fn list_checkpoint_events(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Vec<CheckpointEvent>> {
        self.list_checkpoint_events_impl(workload_uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use detect_core::{
        CheckpointEventType, CoordinatorStateKind, CoverageStatus, DataSource, DetectionStatus,
        EvidenceSourceType, WorkloadType,
    };
    use tempfile::TempDir;

    async fn create_test_storage() -> Result<(TursoStorage, TempDir)> {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");

        let db = libsql::Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| Error::transient(format!("failed to create test database: {e}")))?;

        let storage = TursoStorage {
            db: Arc::new(db),
            pool: None,
            config: TursoConfig::default(),
        };

        storage.initialize_schema().await?;
        Ok((storage, dir))
    }

    #[tokio::test]
    async fn test_storage_creation() {
        let result = create_test_storage().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        assert!(storage.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_statistics_start_empty() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let stats = storage.get_statistics().await.unwrap();
        assert_eq!(stats.coverage_count, 0);
        assert_eq!(stats.evidence_count, 0);
        assert_eq!(stats.detection_count, 0);
    }

    #[tokio::test]
    async fn test_coverage_roundtrip() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-1");

        let mut coverage = DetectionCoverage::new(workload_uid.clone(), Source::Process);
        coverage.status = CoverageStatus::Collected;
        coverage.evidence_count = 2;

        storage.upsert_coverage(&coverage).await.unwrap();

        let fetched = storage
            .get_coverage(&workload_uid, Source::Process)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, CoverageStatus::Collected);
        assert_eq!(fetched.evidence_count, 2);

        let listed = storage.list_coverage(&workload_uid).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_evidence_insert_and_list() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-evidence");

        let evidence = Evidence::new(
            workload_uid.clone(),
            Source::Process,
            "pytorch".to_string(),
            EvidenceSourceType::Active,
            WorkloadType::Training,
            0.9,
        );

        storage.insert_evidence(&evidence).await.unwrap();

        let listed = storage.list_evidence(&workload_uid).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].framework, "pytorch");
    }

    #[tokio::test]
    async fn test_detection_roundtrip() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-detection");

        let mut detection = WorkloadDetection::pending(workload_uid.clone());
        detection.framework = Some("pytorch".to_string());
        detection.status = DetectionStatus::Confirmed;

        storage.upsert_detection(&detection).await.unwrap();

        let fetched = storage.get_detection(&workload_uid).await.unwrap().unwrap();
        assert_eq!(fetched.framework.as_deref(), Some("pytorch"));
        assert_eq!(fetched.status, DetectionStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_coordinator_state_roundtrip_and_due_listing() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-coordinator");

        let mut state = CoordinatorState::new(workload_uid.clone());
        state.coordinator_state = CoordinatorStateKind::Waiting;
        state.next_schedule_at = Utc::now() - chrono::Duration::seconds(1);

        storage.upsert_coordinator_state(&state).await.unwrap();

        let fetched = storage
            .get_coordinator_state(&workload_uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.coordinator_state, CoordinatorStateKind::Waiting);

        let due = storage.list_due_coordinator_states(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
    }

    #[tokio::test]
    async fn test_training_performance_latest() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-perf");

        let mut earlier = TrainingPerformance::new(
            workload_uid.clone(),
            None,
            1,
            10,
            DataSource::Log,
            serde_json::json!({"loss": 1.0}),
        );
        earlier.updated_at = Utc::now() - chrono::Duration::seconds(10);
        storage.upsert_training_performance(&earlier).await.unwrap();

        let mut later = TrainingPerformance::new(
            workload_uid.clone(),
            None,
            1,
            20,
            DataSource::Log,
            serde_json::json!({"loss": 0.5}),
        );
        later.updated_at = Utc::now();
        storage.upsert_training_performance(&later).await.unwrap();

        let latest = storage
            .latest_training_performance(&workload_uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.iteration, 20);
    }

    #[tokio::test]
    async fn test_checkpoint_event_roundtrip() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-checkpoint");

        let event = CheckpointEvent::start_saving(workload_uid.clone(), 5, "/ckpt/5".to_string());
        storage.upsert_checkpoint_event(&event).await.unwrap();

        let listed = storage.list_checkpoint_events(&workload_uid).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_type, CheckpointEventType::StartSaving);
    }

    #[tokio::test]
    async fn test_list_patterns_empty_by_default() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let patterns = storage.list_patterns().await.unwrap();
        assert!(patterns.is_empty());
    }

    #[tokio::test]
    async fn test_pod_uid_roundtrip_on_training_performance() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let workload_uid = WorkloadUid::new("wl-pod");

        let row = TrainingPerformance::new(
            workload_uid.clone(),
            Some(PodUid::new("pod-1")),
            1,
            1,
            DataSource::Push,
            serde_json::json!({}),
        );
        storage.upsert_training_performance(&row).await.unwrap();

        let latest = storage
            .latest_training_performance(&workload_uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.pod_uid.as_ref().map(PodUid::as_str), Some("pod-1"));
    }
}
