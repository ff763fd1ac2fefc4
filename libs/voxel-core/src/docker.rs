/// Docker-backed Executor
///
/// Runs a job's workload as a one-shot container:
/// 1. Ensures the model image is present (inspect, pull on miss)
/// 2. Creates the container with the job's input directory bound read-only
///    at /app/input and its output directory bound read-write at /app/output
/// 3. Network disabled, memory/CPU limits enforced
/// 4. Waits for termination with a kill-on-timeout guarantee
/// 5. Captures a stderr tail from the container logs for diagnostics
/// 6. Force-removes the container on every path
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::{debug, warn};

use crate::config::Config as AppConfig;
use crate::error::DispatchError;
use crate::executor::{
    render_argv, stderr_tail, ExecutionOutcome, Executor, STDERR_TAIL_BYTES, STDERR_TAIL_LINES,
};
use crate::job::Job;

/// Mount points inside the workload container. Models are built against
/// these paths; the registry command templates reference them via
/// {input}/{output}.
const INPUT_MOUNT: &str = "/app/input";
const OUTPUT_MOUNT: &str = "/app/output";

pub struct DockerExecutor {
    docker: Docker,
    memory_limit_mb: u32,
    cpu_limit: f64,
}

impl DockerExecutor {
    /// Connect to the local Docker daemon. An unreachable daemon is an
    /// ExecutorUnavailable at construction time, not a panic at dispatch.
    pub fn connect(config: &AppConfig) -> Result<Self, DispatchError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            DispatchError::ExecutorUnavailable(format!("failed to connect to Docker daemon: {}", e))
        })?;

        Ok(Self {
            docker,
            memory_limit_mb: config.memory_limit_mb,
            cpu_limit: config.cpu_limit,
        })
    }

    /// Ensure the model image is available locally (pull if needed)
    async fn ensure_image(&self, image: &str) -> Result<(), DispatchError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        debug!(image, "model image not present locally, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                DispatchError::ExecutorUnavailable(format!("failed to pull image {}: {}", image, e))
            })?;
        }

        Ok(())
    }

    /// Wait for the container to stop and return its exit code.
    /// Bollard reports a non-zero exit as an error variant of the wait
    /// stream; that is still a completed execution, not an executor fault.
    async fn wait_for_exit(&self, container_id: &str) -> Result<i64, DispatchError> {
        let options = Some(WaitContainerOptions {
            condition: "not-running",
        });

        let mut stream = self.docker.wait_container(container_id, options);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(DispatchError::ExecutorUnavailable(format!(
                "failed to wait on container: {}",
                e
            ))),
            None => Err(DispatchError::ExecutorUnavailable(
                "container wait stream ended without a status".to_string(),
            )),
        }
    }

    /// Fetch the stderr tail from the stopped container's logs
    async fn collect_stderr_tail(&self, container_id: &str) -> String {
        let options = Some(LogsOptions::<String> {
            stderr: true,
            tail: STDERR_TAIL_LINES.to_string(),
            ..Default::default()
        });

        let mut stderr = String::new();
        let mut stream = self.docker.logs(container_id, options);
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdErr { message }) => {
                    stderr.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(container_id, error = %e, "failed to read container logs");
                    break;
                }
            }
        }

        stderr_tail(&stderr, STDERR_TAIL_LINES, STDERR_TAIL_BYTES)
    }

    async fn force_remove(&self, container_id: &str) {
        let options = Some(RemoveContainerOptions {
            force: true,
            ..Default::default()
        });
        if let Err(e) = self.docker.remove_container(container_id, options).await {
            warn!(container_id, error = %e, "failed to remove container");
        }
    }
}

#[async_trait]
impl Executor for DockerExecutor {
    async fn run(&self, job: &Job, timeout_ms: u64) -> Result<ExecutionOutcome, DispatchError> {
        self.ensure_image(&job.model.image).await?;

        let argv = render_argv(
            &job.model.command,
            INPUT_MOUNT,
            OUTPUT_MOUNT,
            job.input_filename(),
        );

        let binds = vec![
            format!("{}:{}:ro", job.input_dir().display(), INPUT_MOUNT),
            format!("{}:{}:rw", job.output_dir.display(), OUTPUT_MOUNT),
        ];

        let config = Config {
            image: Some(job.model.image.clone()),
            cmd: Some(argv),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                binds: Some(binds),
                memory: Some(i64::from(self.memory_limit_mb) * 1024 * 1024),
                nano_cpus: Some((self.cpu_limit * 1_000_000_000.0) as i64),
                ..Default::default()
            }),
            ..Default::default()
        };

        // Named after the job so a stuck workload is findable in docker ps
        let container_name = format!("vox-{}", job.id);
        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| {
                DispatchError::ExecutorUnavailable(format!("failed to create container: {}", e))
            })?;
        let container_id = container.id;

        debug!(job_id = %job.id, container_id = %container_id, "starting workload container");

        if let Err(e) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            self.force_remove(&container_id).await;
            return Err(DispatchError::ExecutorUnavailable(format!(
                "failed to start container: {}",
                e
            )));
        }

        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.wait_for_exit(&container_id),
        )
        .await;

        let exit_code = match waited {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                self.force_remove(&container_id).await;
                return Err(e);
            }
            Err(_) => {
                // Kill before remove so the workload cannot keep writing
                // into the workspace while teardown runs
                let _ = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await;
                self.force_remove(&container_id).await;
                return Err(DispatchError::ExecutionTimeout { timeout_ms });
            }
        };

        let stderr_tail = self.collect_stderr_tail(&container_id).await;
        self.force_remove(&container_id).await;

        Ok(ExecutionOutcome {
            exit_code,
            stderr_tail,
        })
    }
}
