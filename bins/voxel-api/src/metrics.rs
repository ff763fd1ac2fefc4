// Prometheus metrics for the voxel gateway

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Jobs submitted total (counter with model label)
    pub static ref JOBS_SUBMITTED: CounterVec = CounterVec::new(
        Opts::new("voxel_jobs_submitted_total", "Total number of jobs submitted"),
        &["model"]
    )
    .expect("metric can be created");

    // Jobs completed total (counter with model and outcome labels)
    pub static ref JOBS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("voxel_jobs_completed_total", "Total number of jobs completed"),
        &["model", "outcome"]
    )
    .expect("metric can be created");

    // Job execution time histogram (in milliseconds)
    pub static ref JOB_EXECUTION_TIME: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "voxel_job_execution_time_ms",
            "Job dispatch-to-result time in milliseconds"
        )
        .buckets(vec![
            1000.0, 5000.0, 15000.0, 60000.0, 300000.0, 900000.0, 1800000.0
        ]),
        &["model"]
    )
    .expect("metric can be created");

    // Jobs rejected counter (malformed requests)
    pub static ref JOBS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("voxel_jobs_rejected_total", "Total jobs rejected before dispatch"),
        &["reason"]
    )
    .expect("metric can be created");

    // In-flight gauge (requests between admission and response)
    pub static ref JOBS_INFLIGHT: IntGauge = IntGauge::new(
        "voxel_jobs_inflight",
        "Jobs currently being dispatched"
    )
    .expect("metric can be created");
}

/// Initialize metrics registry
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(JOBS_SUBMITTED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(JOBS_COMPLETED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(JOB_EXECUTION_TIME.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(JOBS_REJECTED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(JOBS_INFLIGHT.clone()))
        .expect("collector can be registered");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record job submission
pub fn record_job_submitted(model: &str) {
    JOBS_SUBMITTED.with_label_values(&[model]).inc();
}

/// Record job rejection before dispatch
pub fn record_job_rejected(reason: &str) {
    JOBS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record job completion (outcome is "succeeded" or an error kind)
pub fn record_job_completed(model: &str, outcome: &str, execution_time_ms: f64) {
    JOBS_COMPLETED.with_label_values(&[model, outcome]).inc();
    JOB_EXECUTION_TIME
        .with_label_values(&[model])
        .observe(execution_time_ms);
}
