//! # Resilient Storage with Circuit Breaker
//!
//! Wraps TursoStorage with circuit breaker protection for production resilience.
//!
//! ## Example
//!
//! ```no_run
//! use storage_sql::{TursoStorage, ResilientStorage};
//! use detect_core::storage::circuit_breaker::CircuitBreakerConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let turso = TursoStorage::new("libsql://localhost:8080", "token").await?;
//!
//! // Wrap with circuit breaker
//! let resilient = ResilientStorage::new(turso, CircuitBreakerConfig::default());
//!
//! // All operations are now protected by circuit breaker
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use detect_core::storage::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use detect_core::{
    CheckpointEvent, CompiledPatternRecord, CoordinatorState, DetectionCoverage, Evidence, Result,
    Source, StorageBackend, TrainingPerformance, WorkloadDetection, WorkloadUid,
};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(test)]
use detect_core::Error;

use crate::TursoStorage;

/// Resilient storage wrapper with circuit breaker protection
///
/// Wraps TursoStorage operations with circuit breaker pattern to provide:
/// - Fast failure when service is down
/// - Automatic recovery attempts
/// - Failure statistics and monitoring
pub struct ResilientStorage {
    /// Underlying Turso storage
    storage: Arc<TursoStorage>,
    /// Circuit breaker for resilience
    circuit_breaker: Arc<CircuitBreaker>,
}

impl ResilientStorage {
    /// Create a new resilient storage wrapper
    pub fn new(storage: TursoStorage, config: CircuitBreakerConfig) -> Self {
        info!("Creating resilient storage with circuit breaker protection");

        Self {
            storage: Arc::new(storage),
            circuit_breaker: Arc::new(CircuitBreaker::new(config)),
        }
    }

    /// Get the current circuit breaker state
    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state().await
    }

    /// Get circuit breaker statistics
    pub async fn circuit_stats(&self) -> detect_core::storage::circuit_breaker::CircuitBreakerStats {
        self.circuit_breaker.stats().await
    }

    /// Reset the circuit breaker
    pub async fn reset_circuit(&self) {
        self.circuit_breaker.reset().await;
    }

    /// Health check with circuit breaker awareness
    ///
    /// Returns true if both the storage is healthy AND the circuit is closed.
    pub async fn health_check(&self) -> Result<bool> {
        let circuit_state = self.circuit_state().await;

        if circuit_state != CircuitState::Closed {
            warn!("Health check: circuit breaker is {:?}", circuit_state);
            return Ok(false);
        }

        self.circuit_breaker
            .call(|| async { self.storage.health_check().await })
            .await
    }
}

#[async_trait]
impl StorageBackend for ResilientStorage {
    async fn upsert_coverage(&self, coverage: &DetectionCoverage) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let coverage = coverage.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let coverage = coverage.clone();
                async move { storage.upsert_coverage(&coverage).await }
            })
            .await
    }

    async fn get_coverage(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<Option<DetectionCoverage>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.get_coverage(&workload_uid, source).await }
            })
            .await
    }

    async fn list_coverage(&self, workload_uid: &WorkloadUid) -> Result<Vec<DetectionCoverage>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.list_coverage(&workload_uid).await }
            })
            .await
    }

    async fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let evidence = evidence.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let evidence = evidence.clone();
                async move { storage.insert_evidence(&evidence).await }
            })
            .await
    }

    async fn list_evidence(&self, workload_uid: &WorkloadUid) -> Result<Vec<Evidence>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.list_evidence(&workload_uid).await }
            })
            .await
    }

    async fn upsert_detection(&self, detection: &WorkloadDetection) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let detection = detection.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let detection = detection.clone();
                async move { storage.upsert_detection(&detection).await }
            })
            .await
    }

    async fn get_detection(&self, workload_uid: &WorkloadUid) -> Result<Option<WorkloadDetection>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.get_detection(&workload_uid).await }
            })
            .await
    }

    async fn upsert_coordinator_state(&self, state: &CoordinatorState) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let state = state.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let state = state.clone();
                async move { storage.upsert_coordinator_state(&state).await }
            })
            .await
    }

    async fn get_coordinator_state(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<CoordinatorState>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.get_coordinator_state(&workload_uid).await }
            })
            .await
    }

    async fn list_due_coordinator_states(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CoordinatorState>> {
        let storage = Arc::clone(&self.storage);

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                async move { storage.list_due_coordinator_states(now).await }
            })
            .await
    }

    async fn list_patterns(&self) -> Result<Vec<CompiledPatternRecord>> {
        let storage = Arc::clone(&self.storage);

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                async move { storage.list_patterns().await }
            })
            .await
    }

    async fn upsert_training_performance(&self, row: &TrainingPerformance) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let row = row.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let row = row.clone();
                async move { storage.upsert_training_performance(&row).await }
            })
            .await
    }

    async fn latest_training_performance(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<TrainingPerformance>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.latest_training_performance(&workload_uid).await }
            })
            .await
    }

    async fn upsert_checkpoint_event(&self, event: &CheckpointEvent) -> Result<()> {
        let storage = Arc::clone(&self.storage);
        let event = event.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let event = event.clone();
                async move { storage.upsert_checkpoint_event(&event).await }
            })
            .await
    }

    async fn list_checkpoint_events(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Vec<CheckpointEvent>> {
        let storage = Arc::clone(&self.storage);
        let workload_uid = workload_uid.clone();

        self.circuit_breaker
            .call(move || {
                let storage = Arc::clone(&storage);
                let workload_uid = workload_uid.clone();
                async move { storage.list_checkpoint_events(&workload_uid).await }
            })
            .await
    }
}
