/// Executor Adapter - Abstraction over Workload Execution
///
/// **Core Responsibility:**
/// Run one job's workload to completion in an isolated environment with the
/// job's input directory bound read-only and its output directory bound
/// read-write, then report the exit status.
///
/// **Critical Architectural Boundary:**
/// - The executor knows HOW to run the workload (Docker, local sandbox, ...)
/// - The executor does NOT interpret results or read output artifacts
/// - The executor returns a raw outcome for the Result Collector to judge
///
/// **Why This Exists:**
/// Any substrate that can run an isolated process with two directory
/// bindings, synchronously, with a kill-on-timeout guarantee satisfies the
/// interface. Production binds Docker; tests bind a local subprocess.
use async_trait::async_trait;
use std::process::Stdio;
use tracing::debug;

use crate::error::DispatchError;
use crate::job::Job;

/// Raw execution outcome for one job
/// Produced by an Executor, consumed by the Result Collector. Carries no
/// verdict: a zero exit code here is not yet a success.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exit_code: i64,
    pub stderr_tail: String,
}

/// Executor trait
///
/// Any implementation must guarantee:
/// 1. The job's input directory is visible to the workload read-only
/// 2. The job's output directory is visible read-write
/// 3. The call blocks (asynchronously) until the workload terminates
/// 4. A workload still running at `timeout_ms` is forcibly killed and its
///    environment reclaimed - never left running
/// 5. An unreachable substrate surfaces as ExecutorUnavailable
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, job: &Job, timeout_ms: u64) -> Result<ExecutionOutcome, DispatchError>;
}

/// Render a descriptor's command template into a concrete argv.
/// Placeholders are substituted per element with plain string replacement -
/// the result goes straight to the process-start call, never through a
/// shell, so upload filenames cannot inject.
pub fn render_argv(
    template: &[String],
    input_mount: &str,
    output_mount: &str,
    filename: &str,
) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{input}", input_mount)
                .replace("{output}", output_mount)
                .replace("{filename}", filename)
        })
        .collect()
}

/// Keep the last `max_lines` lines of stderr, capped at `max_bytes`.
/// Enough for diagnostics without shipping a training log to the caller.
pub fn stderr_tail(stderr: &str, max_lines: usize, max_bytes: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let tail = lines[start..].join("\n");
    if tail.len() <= max_bytes {
        return tail;
    }
    // Cut at a char boundary from the end
    let cut = tail.len() - max_bytes;
    let boundary = (cut..tail.len())
        .find(|&i| tail.is_char_boundary(i))
        .unwrap_or(tail.len());
    tail[boundary..].to_string()
}

pub(crate) const STDERR_TAIL_LINES: usize = 40;
pub(crate) const STDERR_TAIL_BYTES: usize = 4096;

/// Local subprocess executor
///
/// Runs a fixed entrypoint program directly on the host with the rendered
/// argv. `{input}` and `{output}` render to the job's host directories -
/// there is no mount namespace here, so isolation is advisory. Useful for
/// tests and for development hosts without a Docker daemon.
pub struct LocalExecutor {
    entrypoint: String,
}

impl LocalExecutor {
    pub fn new<S: Into<String>>(entrypoint: S) -> Self {
        Self {
            entrypoint: entrypoint.into(),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, job: &Job, timeout_ms: u64) -> Result<ExecutionOutcome, DispatchError> {
        let argv = render_argv(
            &job.model.command,
            &job.input_dir().to_string_lossy(),
            &job.output_dir.to_string_lossy(),
            job.input_filename(),
        );

        debug!(job_id = %job.id, entrypoint = %self.entrypoint, ?argv, "spawning local workload");

        let child = tokio::process::Command::new(&self.entrypoint)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // If the timeout drops the wait future below, the child is
            // killed rather than orphaned
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DispatchError::ExecutorUnavailable(format!(
                    "failed to spawn {}: {}",
                    self.entrypoint, e
                ))
            })?;

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            child.wait_with_output(),
        )
        .await;

        match waited {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().map(i64::from).unwrap_or(-1);
                let stderr = String::from_utf8_lossy(&output.stderr);
                Ok(ExecutionOutcome {
                    exit_code,
                    stderr_tail: stderr_tail(&stderr, STDERR_TAIL_LINES, STDERR_TAIL_BYTES),
                })
            }
            Ok(Err(e)) => Err(DispatchError::ExecutorUnavailable(format!(
                "failed to wait on workload: {}",
                e
            ))),
            Err(_) => Err(DispatchError::ExecutionTimeout { timeout_ms }),
        }
    }
}
