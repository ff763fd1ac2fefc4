use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::registry::ModelDescriptor;

/// Job State Machine
/// Explicitly models the lifecycle of one dispatched request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Job (one request's isolated unit of work)
/// Exclusively owned by the Dispatcher for its lifetime. Never shared
/// across workers, so no locking is needed - isolation comes from each
/// job owning a unique workspace, not from synchronization.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub model: ModelDescriptor,
    /// Staged upload inside the workspace: {work_root}/{id}/in/{filename}
    pub input_path: PathBuf,
    /// Private output directory: {work_root}/{id}/out
    pub output_dir: PathBuf,
    pub status: JobStatus,
    pub exit_code: Option<i64>,
    workspace: PathBuf,
}

impl Job {
    /// The workspace root this job owns ({work_root}/{id})
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The staged upload's basename (what `{filename}` renders to)
    pub fn input_filename(&self) -> &str {
        self.input_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Host directory the executor binds read-only
    pub fn input_dir(&self) -> PathBuf {
        self.workspace.join("in")
    }
}

/// Job Isolator
/// Allocates a fresh, collision-free workspace per request and stages the
/// upload into it. The workspace layout is:
///
/// ```text
/// {work_root}/{job_id}/in/{original_filename}   staged upload (bound ro)
/// {work_root}/{job_id}/out/                     workload writes here (bound rw)
/// ```
///
/// The job id is a random 128-bit UUID, so paths never collide across
/// concurrent jobs, process restarts, or host reboots.
#[derive(Debug, Clone)]
pub struct JobIsolator {
    work_root: PathBuf,
}

impl JobIsolator {
    pub fn new<P: Into<PathBuf>>(work_root: P) -> Self {
        Self {
            work_root: work_root.into(),
        }
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Create a workspace for one request and stage the upload into it.
    /// Returns a Pending job. Fails with StagingFailure on any filesystem
    /// error; a partially created workspace is removed before returning.
    pub async fn create_job(
        &self,
        model: &ModelDescriptor,
        original_filename: &str,
        file_bytes: &[u8],
    ) -> Result<Job, DispatchError> {
        let filename = sanitize_filename(original_filename)?;

        let job_id = Uuid::new_v4();
        let workspace = self.work_root.join(job_id.to_string());
        let input_dir = workspace.join("in");
        let output_dir = workspace.join("out");

        if let Err(e) = self.stage(&input_dir, &output_dir, &filename, file_bytes).await {
            // Don't leave a half-built workspace behind
            let _ = tokio::fs::remove_dir_all(&workspace).await;
            return Err(DispatchError::StagingFailure(e.to_string()));
        }

        Ok(Job {
            id: job_id,
            model: model.clone(),
            input_path: input_dir.join(&filename),
            output_dir,
            status: JobStatus::Pending,
            exit_code: None,
            workspace,
        })
    }

    async fn stage(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        filename: &str,
        file_bytes: &[u8],
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(input_dir).await?;
        tokio::fs::create_dir_all(output_dir).await?;
        tokio::fs::write(input_dir.join(filename), file_bytes).await?;
        Ok(())
    }

    /// Recursively remove the job's working tree. Runs on every exit path,
    /// success or failure. A failed removal is logged and swallowed - it
    /// must never mask the primary outcome of the request.
    pub async fn teardown(&self, job: &Job) {
        if let Err(e) = tokio::fs::remove_dir_all(job.workspace()).await {
            warn!(
                job_id = %job.id,
                workspace = %job.workspace().display(),
                error = %e,
                "failed to tear down job workspace"
            );
        }
    }
}

/// Reduce a client-supplied filename to a safe basename.
/// Path separators and parent references in an upload name must never
/// escape the workspace.
fn sanitize_filename(original: &str) -> Result<String, DispatchError> {
    let basename = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if basename.is_empty() || basename == "." || basename == ".." {
        return Err(DispatchError::StagingFailure(format!(
            "unusable upload filename: {:?}",
            original
        )));
    }

    Ok(basename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelDescriptor;

    fn model() -> ModelDescriptor {
        ModelDescriptor {
            id: "unet_t1c".to_string(),
            image: "mailabhaske/glioma_unet:latest".to_string(),
            command: vec!["--input".to_string(), "{input}/{filename}".to_string()],
            output_filename: "output_image.png".to_string(),
            metrics_filename: "metrics.json".to_string(),
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn test_create_job_stages_upload() {
        let root = tempfile::tempdir().unwrap();
        let isolator = JobIsolator::new(root.path());

        let job = isolator
            .create_job(&model(), "scan_t1c.nii.gz", b"fake mri bytes")
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.input_filename(), "scan_t1c.nii.gz");
        assert!(job.output_dir.is_dir());
        let staged = std::fs::read(&job.input_path).unwrap();
        assert_eq!(staged, b"fake mri bytes");
    }

    #[tokio::test]
    async fn test_concurrent_jobs_have_distinct_output_dirs() {
        let root = tempfile::tempdir().unwrap();
        let isolator = JobIsolator::new(root.path());
        let model = model();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let isolator = isolator.clone();
            let model = model.clone();
            handles.push(tokio::spawn(async move {
                isolator
                    .create_job(&model, "scan.nii.gz", b"bytes")
                    .await
                    .unwrap()
                    .output_dir
            }));
        }

        let mut dirs = Vec::new();
        for handle in handles {
            dirs.push(handle.await.unwrap());
        }

        for i in 0..dirs.len() {
            for j in (i + 1)..dirs.len() {
                assert_ne!(dirs[i], dirs[j]);
            }
        }
    }

    #[tokio::test]
    async fn test_teardown_removes_workspace() {
        let root = tempfile::tempdir().unwrap();
        let isolator = JobIsolator::new(root.path());

        let job = isolator
            .create_job(&model(), "scan.nii.gz", b"bytes")
            .await
            .unwrap();
        assert!(job.workspace().exists());

        isolator.teardown(&job).await;
        assert!(!job.workspace().exists());
    }

    #[tokio::test]
    async fn test_teardown_of_missing_workspace_does_not_panic() {
        let root = tempfile::tempdir().unwrap();
        let isolator = JobIsolator::new(root.path());
        let job = isolator
            .create_job(&model(), "scan.nii.gz", b"bytes")
            .await
            .unwrap();

        isolator.teardown(&job).await;
        // Second teardown hits a missing directory; logged, not fatal
        isolator.teardown(&job).await;
    }

    #[test]
    fn test_sanitize_strips_path_components() {
        assert_eq!(
            sanitize_filename("/etc/passwd").unwrap(),
            "passwd"
        );
        assert_eq!(
            sanitize_filename("../../escape.nii").unwrap(),
            "escape.nii"
        );
        assert_eq!(
            sanitize_filename("C:\\uploads\\scan.nii").unwrap(),
            "scan.nii"
        );
        assert_eq!(sanitize_filename("scan.nii").unwrap(), "scan.nii");
    }

    #[test]
    fn test_sanitize_rejects_unusable_names() {
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("uploads/").is_err());
    }
}
