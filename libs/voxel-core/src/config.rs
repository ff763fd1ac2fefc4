use std::env;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub work_root: String,
    pub model_config_path: String,
    pub executor: String,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub max_concurrent_jobs: usize,
    pub max_upload_bytes: usize,
    pub memory_limit_mb: u32,
    pub cpu_limit: f64,
    pub local_entrypoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            work_root: env::var("WORK_ROOT")
                .unwrap_or_else(|_| "/var/lib/voxel/jobs".to_string()),
            model_config_path: env::var("MODEL_CONFIG_PATH")
                .unwrap_or_else(|_| "config/models.json".to_string()),
            executor: env::var("EXECUTOR").unwrap_or_else(|_| "docker".to_string()),
            default_timeout_ms: env::var("DEFAULT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300_000),
            max_timeout_ms: env::var("MAX_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1_800_000),
            max_concurrent_jobs: env::var("MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512 * 1024 * 1024),
            memory_limit_mb: env::var("MEMORY_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8192),
            cpu_limit: env::var("CPU_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4.0),
            local_entrypoint: env::var("LOCAL_ENTRYPOINT").ok(),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }

    /// Effective timeout for a model: per-model override if present,
    /// otherwise the default, always clamped to the configured maximum.
    pub fn effective_timeout_ms(&self, model_override: Option<u64>) -> u64 {
        model_override
            .unwrap_or(self.default_timeout_ms)
            .min(self.max_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
