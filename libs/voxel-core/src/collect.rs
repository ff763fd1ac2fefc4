/// Result Collector - Output Contract Enforcement
///
/// After the executor reports completion, this module decides whether the
/// job actually produced a usable result:
/// - The exit code is authoritative. A non-zero exit fails the job even if
///   an output file happens to exist.
/// - The workload is contractually required to leave two artifacts in the
///   job's output directory: the output image and a metrics sidecar.
///   Metrics always come from the sidecar - this service never invents them.
use serde::Deserialize;
use std::path::Path;

use crate::error::DispatchError;
use crate::executor::ExecutionOutcome;
use crate::job::Job;

/// The one result a successful job produces. Returned to the caller and
/// discarded - nothing here is persisted.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub image_bytes: Vec<u8>,
    pub volume: f64,
    pub confidence: f64,
}

/// Metrics sidecar schema
/// `{"volume": <cm³, >= 0>, "confidence": <0..=1>}`
#[derive(Debug, Deserialize)]
struct MetricsSidecar {
    volume: f64,
    confidence: f64,
}

/// Judge a completed execution against the model's output contract
pub async fn collect(
    job: &Job,
    outcome: &ExecutionOutcome,
) -> Result<InferenceResult, DispatchError> {
    if outcome.exit_code != 0 {
        return Err(DispatchError::NonZeroExit {
            exit_code: outcome.exit_code,
            stderr_tail: outcome.stderr_tail.clone(),
        });
    }

    let image_path = job.output_dir.join(&job.model.output_filename);
    let image_bytes = read_artifact(&image_path).await?;
    validate_png(&image_bytes)
        .map_err(|e| DispatchError::MalformedOutput(format!("{}: {}", job.model.output_filename, e)))?;

    let metrics_path = job.output_dir.join(&job.model.metrics_filename);
    let metrics_bytes = read_artifact(&metrics_path).await?;
    let metrics = parse_metrics(&metrics_bytes)
        .map_err(|e| DispatchError::MalformedOutput(format!("{}: {}", job.model.metrics_filename, e)))?;

    Ok(InferenceResult {
        image_bytes,
        volume: metrics.volume,
        confidence: metrics.confidence,
    })
}

async fn read_artifact(path: &Path) -> Result<Vec<u8>, DispatchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DispatchError::MissingOutput(
            path.display().to_string(),
        )),
        Err(e) => Err(DispatchError::MalformedOutput(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Shallow PNG validation: signature plus a parsable IHDR chunk with
/// nonzero dimensions. The service relays the image, it does not render
/// it, so a pixel-level decode is the consumer's concern.
fn validate_png(bytes: &[u8]) -> Result<(), String> {
    // 8 signature + 4 length + 4 type + 13 IHDR fields
    if bytes.len() < 29 {
        return Err("file too short to be a PNG".to_string());
    }
    if bytes[..8] != PNG_SIGNATURE {
        return Err("bad PNG signature".to_string());
    }

    let ihdr_len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if &bytes[12..16] != b"IHDR" || ihdr_len != 13 {
        return Err("first chunk is not a valid IHDR".to_string());
    }

    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        return Err(format!("degenerate dimensions {}x{}", width, height));
    }

    Ok(())
}

fn parse_metrics(bytes: &[u8]) -> Result<MetricsSidecar, String> {
    let metrics: MetricsSidecar =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid metrics JSON: {}", e))?;

    if !metrics.volume.is_finite() || metrics.volume < 0.0 {
        return Err(format!("volume out of range: {}", metrics.volume));
    }
    if !metrics.confidence.is_finite() || !(0.0..=1.0).contains(&metrics.confidence) {
        return Err(format!("confidence out of range: {}", metrics.confidence));
    }

    Ok(metrics)
}

/// A minimal well-formed PNG prefix (10x10, grayscale) for tests and the
/// local stub workloads; only signature and IHDR are meaningful.
#[cfg(test)]
pub(crate) fn tiny_png() -> Vec<u8> {
    let mut png = PNG_SIGNATURE.to_vec();
    png.extend_from_slice(&13u32.to_be_bytes());
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&10u32.to_be_bytes()); // width
    png.extend_from_slice(&10u32.to_be_bytes()); // height
    png.extend_from_slice(&[8, 0, 0, 0, 0]); // depth, color, compression, filter, interlace
    png.extend_from_slice(&[0, 0, 0, 0]); // CRC (not validated here)
    png
}
