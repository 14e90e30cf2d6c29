//! Bounded Engine Invocation

use std::sync::Arc;
use std::time::{Duration, Instant};

use tabular::{ColumnRoles, FeatureTable, Table};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::{EngineOptions, EngineRequest, FeatureEngine};
use crate::presets::ExtractionDirectives;
use crate::ExtractionError;

/// Runs a feature engine off the async runtime with a time bound
///
/// The engine always runs single-threaded with progress reporting off, so
/// one request never occupies more than one blocking worker.
#[derive(Clone)]
pub struct ExtractionInvoker {
    engine: Arc<dyn FeatureEngine>,
    timeout: Duration,
}

impl ExtractionInvoker {
    pub fn new(engine: Arc<dyn FeatureEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Extract features from `table`, consuming it
    pub async fn invoke(
        &self,
        table: Table,
        roles: ColumnRoles,
        directives: ExtractionDirectives,
    ) -> Result<FeatureTable, ExtractionError> {
        let engine = Arc::clone(&self.engine);
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            engine.extract(&EngineRequest {
                table: &table,
                roles: &roles,
                directives: &directives,
                options: EngineOptions::sequential(),
            })
        });

        let result = match timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                warn!("Feature engine task failed: {}", join_error);
                return Err(ExtractionError::Engine(join_error.to_string()));
            }
            Err(_) => {
                warn!("Feature extraction exceeded {:?}", self.timeout);
                return Err(ExtractionError::Timeout(self.timeout.as_millis() as u64));
            }
        };

        let features = result.map_err(|e| ExtractionError::Engine(e.to_string()))?;
        debug!(
            "Extracted {} features for {} entities in {:?}",
            features.num_features(),
            features.num_rows(),
            started.elapsed()
        );
        Ok(features)
    }
}

impl std::fmt::Debug for ExtractionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionInvoker")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
