/// Dispatcher - Per-Request Orchestration
///
/// Composes registry resolution, workspace staging, execution, and result
/// collection for one request, and guarantees the workspace is torn down
/// exactly once no matter which stage failed.
///
/// **Ordering Invariants:**
/// - The model is resolved before anything touches the filesystem: an
///   unknown model allocates nothing under the work root
/// - The admission permit is acquired before the workspace exists, so the
///   concurrency cap bounds disk usage as well as container launches
/// - Teardown runs after the outcome is decided and never overrides it
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::Config;
use crate::error::DispatchError;
use crate::executor::Executor;
use crate::job::{Job, JobIsolator, JobStatus};
use crate::registry::ModelRegistry;

pub use crate::collect::InferenceResult;

pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
    executor: Arc<dyn Executor>,
    isolator: JobIsolator,
    /// Bounds concurrent workload launches; waiters queue rather than shed
    admission: Semaphore,
    default_timeout_ms: u64,
    max_timeout_ms: u64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ModelRegistry>,
        executor: Arc<dyn Executor>,
        isolator: JobIsolator,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            executor,
            isolator,
            admission: Semaphore::new(config.max_concurrent_jobs),
            default_timeout_ms: config.default_timeout_ms,
            max_timeout_ms: config.max_timeout_ms,
        }
    }

    /// Handle one inference request end to end
    pub async fn handle(
        &self,
        model_id: &str,
        original_filename: &str,
        file_bytes: &[u8],
    ) -> Result<InferenceResult, DispatchError> {
        // Resolve first - an unknown model must not allocate a workspace
        let model = self.registry.resolve(model_id)?.clone();

        let _permit = self.admission.acquire().await.map_err(|_| {
            DispatchError::ExecutorUnavailable("admission queue closed".to_string())
        })?;

        let mut job = self
            .isolator
            .create_job(&model, original_filename, file_bytes)
            .await?;

        info!(job_id = %job.id, model = %model.id, "job staged");

        let result = self.execute_and_collect(&mut job).await;

        // Teardown on every path; its failures are logged inside and never
        // mask the primary outcome
        self.isolator.teardown(&job).await;

        match &result {
            Ok(r) => info!(
                job_id = %job.id,
                model = %model.id,
                volume = r.volume,
                confidence = r.confidence,
                "job succeeded"
            ),
            Err(e) => info!(
                job_id = %job.id,
                model = %model.id,
                kind = e.kind(),
                error = %e,
                "job failed"
            ),
        }

        result
    }

    async fn execute_and_collect(
        &self,
        job: &mut Job,
    ) -> Result<InferenceResult, DispatchError> {
        let timeout_ms = job
            .model
            .timeout_ms
            .unwrap_or(self.default_timeout_ms)
            .min(self.max_timeout_ms);

        job.status = JobStatus::Running;
        let outcome = match self.executor.run(job, timeout_ms).await {
            Ok(outcome) => outcome,
            Err(e) => {
                job.status = JobStatus::Failed;
                return Err(e);
            }
        };
        job.exit_code = Some(outcome.exit_code);

        match crate::collect::collect(job, &outcome).await {
            Ok(result) => {
                job.status = JobStatus::Succeeded;
                Ok(result)
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                Err(e)
            }
        }
    }
}
