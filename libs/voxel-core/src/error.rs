use thiserror::Error;

/// Dispatch failure taxonomy
/// Every failure a request can hit maps to exactly one of these kinds.
/// All are terminal for the request - nothing here is retried automatically
/// (re-running a non-idempotent inference workload behind the caller's back
/// is unsafe).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The requested model id is not in the registry
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Staging the upload into the job workspace failed (disk full,
    /// permissions, bad filename)
    #[error("failed to stage job input: {0}")]
    StagingFailure(String),

    /// The execution substrate could not be reached or could not provide
    /// the workload image
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),

    /// The workload did not terminate within the configured timeout.
    /// The executor has already killed it by the time this surfaces.
    #[error("execution timed out after {timeout_ms}ms")]
    ExecutionTimeout { timeout_ms: u64 },

    /// The workload terminated with a non-zero exit code
    #[error("workload exited with code {exit_code}: {stderr_tail}")]
    NonZeroExit { exit_code: i64, stderr_tail: String },

    /// The workload exited 0 but the contractual output artifact is absent
    #[error("missing output artifact: {0}")]
    MissingOutput(String),

    /// The output artifact exists but does not satisfy its contract
    #[error("malformed output: {0}")]
    MalformedOutput(String),
}

impl DispatchError {
    /// Stable kind label - used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownModel(_) => "unknown_model",
            DispatchError::StagingFailure(_) => "staging_failure",
            DispatchError::ExecutorUnavailable(_) => "executor_unavailable",
            DispatchError::ExecutionTimeout { .. } => "execution_timeout",
            DispatchError::NonZeroExit { .. } => "non_zero_exit",
            DispatchError::MissingOutput(_) => "missing_output",
            DispatchError::MalformedOutput(_) => "malformed_output",
        }
    }
}
